//! Remote-triggered firmware update workflow.
//!
//! [`UpdateOrchestrator`] does two independent jobs once the link is up:
//! it applies `ota_update_url` changes arriving over the command channel,
//! and it runs the one update attempt this boot cycle gets. A successful
//! update restarts the device into the new image; anything else ends the
//! cycle in a timed deep sleep, and the retry is the next boot cycle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::config::{ConfigStore, NvsPartition, OTA_UPDATE_URL_CAPACITY};
use crate::network::mqtt::OTA_UPDATE_URL_TOPIC;
use crate::system::SystemPower;

/// How long the device sleeps between update cycles.
pub const DEFAULT_CYCLE_SLEEP: Duration = Duration::from_secs(10 * 60);

/// Terminal result of one boot cycle's update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    Failed,
    NotAttempted,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    #[error("firmware download failed")]
    FetchFailed,
    #[error("firmware image rejected")]
    ApplyFailed,
}

/// Fetch-and-flash collaborator (the `esp_https_ota` seam).
///
/// On success the running image has been replaced on disk and the device
/// must restart to boot it.
pub trait FirmwareTransport {
    fn fetch_and_apply(&mut self, url: &str, cert_pem: Option<&str>) -> Result<(), UpdateError>;
}

pub struct UpdateOrchestrator<P, T, S>
where
    P: NvsPartition,
    T: FirmwareTransport,
    S: SystemPower,
{
    config: Arc<Mutex<ConfigStore<P>>>,
    transport: T,
    power: S,
    sleep_interval: Duration,
    cert_pem: Option<String>,
    outcome: Option<UpdateOutcome>,
}

impl<P, T, S> UpdateOrchestrator<P, T, S>
where
    P: NvsPartition,
    T: FirmwareTransport,
    S: SystemPower,
{
    pub fn new(config: Arc<Mutex<ConfigStore<P>>>, transport: T, power: S) -> Self {
        Self {
            config,
            transport,
            power,
            sleep_interval: DEFAULT_CYCLE_SLEEP,
            cert_pem: None,
            outcome: None,
        }
    }

    pub fn with_sleep_interval(mut self, interval: Duration) -> Self {
        self.sleep_interval = interval;
        self
    }

    /// Trust material for the firmware fetch. None means plain transport,
    /// as the original deployment ran.
    pub fn with_cert_pem(mut self, cert_pem: String) -> Self {
        self.cert_pem = Some(cert_pem);
        self
    }

    /// Command-channel dispatch target. Messages on any topic other than
    /// the update-URL topic are ignored.
    pub fn handle_command(&self, topic: &str, payload: &[u8]) {
        if topic == OTA_UPDATE_URL_TOPIC {
            self.on_update_url_message(payload);
        }
    }

    /// Accepts a new firmware source URL from the network.
    ///
    /// The payload is checked against the entry's capacity before anything is
    /// mutated, then persisted; the in-memory URL changes only if the save
    /// succeeded. A rejected payload leaves both untouched.
    pub fn on_update_url_message(&self, payload: &[u8]) {
        if payload.len() > OTA_UPDATE_URL_CAPACITY {
            log::error!(
                "Rejecting OTA URL payload: {} bytes exceeds capacity {OTA_UPDATE_URL_CAPACITY}",
                payload.len()
            );
            return;
        }
        let url = match core::str::from_utf8(payload) {
            Ok(url) => url,
            Err(_) => {
                log::error!("Rejecting OTA URL payload: not valid UTF-8");
                return;
            }
        };

        let mut config = self.config.lock().unwrap();
        match config.set_ota_update_url(url) {
            Ok(()) => log::info!("Updated OTA URL: {url}"),
            Err(err) => log::error!("Failed to persist new OTA URL ({err}), keeping previous"),
        }
    }

    /// Runs this boot cycle's single update attempt against the currently
    /// configured source.
    ///
    /// Success restarts the device immediately; the cycle does not continue.
    /// Failure is logged and falls through to the sleep step — there is no
    /// in-cycle retry. Calling this again in the same cycle just returns the
    /// recorded outcome.
    pub fn run_update_cycle(&mut self) -> UpdateOutcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }

        let url = self.config.lock().unwrap().ota_update_url().to_string();
        log::info!("Starting OTA update from {url}");

        let outcome = match self.transport.fetch_and_apply(&url, self.cert_pem.as_deref()) {
            Ok(()) => {
                log::info!("OTA update successful. Restarting...");
                self.power.restart();
                UpdateOutcome::Applied
            }
            Err(err) => {
                log::error!("OTA update failed: {err}");
                UpdateOutcome::Failed
            }
        };
        self.outcome = Some(outcome);
        outcome
    }

    /// `NotAttempted` until [`run_update_cycle`](Self::run_update_cycle) ran.
    pub fn outcome(&self) -> UpdateOutcome {
        self.outcome.unwrap_or(UpdateOutcome::NotAttempted)
    }

    /// Suspends the whole process until the next cycle's wake timer.
    pub fn schedule_next_cycle(&mut self) {
        log::info!("Entering deep sleep for {:?}...", self.sleep_interval);
        self.power.deep_sleep(self.sleep_interval);
    }

    /// Terminal step of the boot cycle: restart already happened inside a
    /// successful attempt, every other outcome sleeps until the next cycle.
    pub fn finish_cycle(&mut self) {
        match self.outcome() {
            UpdateOutcome::Applied => {}
            UpdateOutcome::Failed | UpdateOutcome::NotAttempted => self.schedule_next_cycle(),
        }
    }
}
