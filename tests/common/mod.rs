//! In-memory stand-ins for the device collaborators, shared by the
//! integration scenarios.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use uplink_core::{
    FirmwareTransport, MqttClient, MqttError, NvsHandle, NvsPartition, OpenMode, StorageError,
    SystemPower, UpdateError, WifiDriver,
};

/// NVS partition backed by a shared map. Clones share the backing store, so
/// a "rebooted" store can be built over the same data.
#[derive(Clone, Default)]
pub struct MemNvs {
    pub values: Arc<Mutex<HashMap<String, String>>>,
    pub fail_open: bool,
    pub fail_commit: bool,
}

impl MemNvs {
    pub fn with_entry(key: &str, value: &str) -> Self {
        let nvs = Self::default();
        nvs.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        nvs
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

pub struct MemNvsHandle {
    values: Arc<Mutex<HashMap<String, String>>>,
    mode: OpenMode,
    fail_commit: bool,
}

impl NvsPartition for MemNvs {
    type Handle = MemNvsHandle;

    fn open(&self, _namespace: &str, mode: OpenMode) -> Result<MemNvsHandle, StorageError> {
        if self.fail_open {
            return Err(StorageError::OpenFailed);
        }
        Ok(MemNvsHandle {
            values: self.values.clone(),
            mode,
            fail_commit: self.fail_commit,
        })
    }
}

impl NvsHandle for MemNvsHandle {
    fn get_str(&mut self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let values = self.values.lock().unwrap();
        let value = values.get(key).ok_or(StorageError::NotFound)?;
        if value.len() > buf.len() {
            return Err(StorageError::ValueTooLarge);
        }
        buf[..value.len()].copy_from_slice(value.as_bytes());
        Ok(value.len())
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.mode != OpenMode::ReadWrite {
            return Err(StorageError::WriteFailed);
        }
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if self.fail_commit {
            return Err(StorageError::CommitFailed);
        }
        Ok(())
    }
}

/// Radio driver that records calls; tests feed events to the manager.
#[derive(Clone, Default)]
pub struct RecordingDriver {
    pub configured: Arc<Mutex<Option<(String, String)>>>,
    pub starts: Arc<AtomicUsize>,
    pub connects: Arc<AtomicUsize>,
    pub fail_start: bool,
}

impl RecordingDriver {
    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl WifiDriver for RecordingDriver {
    fn set_station_config(&mut self, ssid: &str, passphrase: &str) -> Result<()> {
        *self.configured.lock().unwrap() = Some((ssid.into(), passphrase.into()));
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.fail_start {
            bail!("radio hardware failed to initialize");
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemMqtt {
    pub connected_to: Arc<Mutex<Option<String>>>,
    pub subscriptions: Arc<Mutex<Vec<String>>>,
}

impl MqttClient for MemMqtt {
    fn connect(&mut self, broker_url: &str) -> Result<(), MqttError> {
        *self.connected_to.lock().unwrap() = Some(broker_url.to_string());
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.subscriptions.lock().unwrap().push(topic.to_string());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeFirmware {
    pub fetched: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

impl FirmwareTransport for FakeFirmware {
    fn fetch_and_apply(&mut self, url: &str, _cert_pem: Option<&str>) -> Result<(), UpdateError> {
        self.fetched.lock().unwrap().push(url.to_string());
        if self.fail {
            Err(UpdateError::FetchFailed)
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Default)]
pub struct FakePower {
    pub restarts: Arc<Mutex<u32>>,
    pub sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl SystemPower for FakePower {
    fn restart(&mut self) {
        *self.restarts.lock().unwrap() += 1;
    }

    fn deep_sleep(&mut self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
