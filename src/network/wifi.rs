//! Wireless link lifecycle.
//!
//! [`ConnectivityManager`] drives the station through a
//! connect/disconnect/retry loop and surfaces a single readiness signal.
//! Disconnects are never terminal: every one is answered with exactly one new
//! connect attempt, indefinitely. Failed attempts are not reported to callers;
//! the driver raises another disconnect event and the loop goes around again.

use std::net::Ipv4Addr;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

/// Events raised by the radio driver on its own execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiEvent {
    /// The station interface finished starting.
    StaStarted,
    /// The link dropped: auth failure, association loss, out of range.
    Disconnected { reason: String },
    /// DHCP completed; the link is usable.
    GotIp { ip: Ipv4Addr },
}

/// Radio driver collaborator.
///
/// Only `set_station_config` and `start` may fail fatally; `connect` failures
/// are absorbed because the driver follows them with a disconnect event.
pub trait WifiDriver: Send {
    fn set_station_config(&mut self, ssid: &str, passphrase: &str) -> Result<()>;
    fn start(&mut self) -> Result<()>;
    fn connect(&mut self) -> Result<()>;
}

/// Owns the connection state machine:
/// `Idle -> Connecting -> Connected -> (disconnect) -> Connecting -> ...`
///
/// Driver events arrive via [`handle_event`](Self::handle_event) on whatever
/// thread the driver uses; the main sequence blocks in
/// [`wait_until_connected`](Self::wait_until_connected). The readiness signal
/// is level-triggered and cleared when a waiter consumes it, so a later
/// drop-and-reconnect can be awaited again.
pub struct ConnectivityManager<D: WifiDriver> {
    driver: Mutex<D>,
    state: Mutex<ConnectionState>,
    ready: Mutex<bool>,
    ready_cv: Condvar,
}

impl<D: WifiDriver> ConnectivityManager<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver: Mutex::new(driver),
            state: Mutex::new(ConnectionState::Idle),
            ready: Mutex::new(false),
            ready_cv: Condvar::new(),
        }
    }

    /// Applies station credentials and starts the link. Returns immediately;
    /// the driver reports progress through [`handle_event`](Self::handle_event).
    ///
    /// This is the only fatal path in the module: if the radio cannot be
    /// configured or started at all, the process cannot proceed.
    pub fn initialize(&self, ssid: &str, passphrase: &str) -> Result<()> {
        if ssid.is_empty() {
            bail!("WiFi SSID cannot be empty");
        }

        let mut driver = self.driver.lock().unwrap();
        driver
            .set_station_config(ssid, passphrase)
            .context("failed to apply station configuration")?;
        driver.start().context("failed to start WiFi station")?;

        log::info!("WiFi station initialized and connecting to '{ssid}'");
        Ok(())
    }

    /// Blocks until the connected signal is observed or `timeout` elapses.
    /// `None` blocks forever (the field-device default). Consuming the signal
    /// clears it.
    pub fn wait_until_connected(&self, timeout: Option<Duration>) -> bool {
        let mut ready = self.ready.lock().unwrap();
        match timeout {
            None => {
                while !*ready {
                    ready = self.ready_cv.wait(ready).unwrap();
                }
            }
            Some(limit) => {
                let (guard, _timed_out) = self
                    .ready_cv
                    .wait_timeout_while(ready, limit, |signalled| !*signalled)
                    .unwrap();
                ready = guard;
                if !*ready {
                    return false;
                }
            }
        }
        *ready = false;
        true
    }

    /// Driver event intake. Runs on the driver's context, concurrently with
    /// the main startup sequence.
    pub fn handle_event(&self, event: WifiEvent) {
        match event {
            WifiEvent::StaStarted => {
                self.set_state(ConnectionState::Connecting);
                self.attempt_connect();
            }
            WifiEvent::Disconnected { reason } => {
                log::warn!("Disconnected from WiFi ({reason}). Attempting to reconnect...");
                self.set_state(ConnectionState::Disconnected);
                self.set_state(ConnectionState::Connecting);
                self.attempt_connect();
            }
            WifiEvent::GotIp { ip } => {
                log::info!("Got IP: {ip}");
                self.set_state(ConnectionState::Connected);
                let mut ready = self.ready.lock().unwrap();
                *ready = true;
                self.ready_cv.notify_all();
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.lock().unwrap() = next;
    }

    // One attempt per event. A failed attempt surfaces as a later
    // Disconnected event from the driver, which triggers the next one.
    fn attempt_connect(&self) {
        if let Err(err) = self.driver.lock().unwrap().connect() {
            log::warn!("Connect attempt failed: {err:#}");
        }
    }
}
