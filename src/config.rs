//! Persisted device configuration.
//!
//! Two URLs are kept in the `"storage"` NVS namespace: the control/telemetry
//! endpoint (`server_url`) and the firmware image source (`ota_update_url`).
//! Each key has a fixed capacity and a compiled-in default; a missing,
//! unreadable, or oversized stored value falls back to the default and the
//! device keeps running. Oversized values are rejected wholesale, never
//! truncated.

use heapless::String;
use thiserror::Error;

pub const NVS_NAMESPACE: &str = "storage";

pub const SERVER_URL_KEY: &str = "server_url";
pub const OTA_UPDATE_URL_KEY: &str = "ota_update_url";

pub const SERVER_URL_CAPACITY: usize = 128;
pub const OTA_UPDATE_URL_CAPACITY: usize = 256;

pub const DEFAULT_SERVER_URL: &str = "mqtt://iot.example.com:1883";
pub const DEFAULT_OTA_UPDATE_URL: &str = "https://iot.example.com/firmware/latest.bin";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("failed to open NVS namespace")]
    OpenFailed,
    #[error("key not found")]
    NotFound,
    #[error("stored value exceeds key capacity")]
    ValueTooLarge,
    #[error("stored value is empty or not valid UTF-8")]
    InvalidData,
    #[error("NVS write failed")]
    WriteFailed,
    #[error("NVS commit failed")]
    CommitFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Non-volatile key-value partition collaborator.
///
/// A handle is a scoped acquisition: it is closed when dropped, on every
/// path, so repeated boot cycles cannot leak storage handles.
pub trait NvsPartition {
    type Handle: NvsHandle;

    fn open(&self, namespace: &str, mode: OpenMode) -> Result<Self::Handle, StorageError>;
}

pub trait NvsHandle {
    /// Reads the string stored under `key` into `buf`, returning its length.
    ///
    /// Returns `NotFound` if the key is absent and `ValueTooLarge` if the
    /// stored value does not fit `buf` (the value is not partially copied).
    fn get_str(&mut self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Flushes pending writes. Must be called after `set_str` for the write
    /// to survive power loss.
    fn commit(&mut self) -> Result<(), StorageError>;
}

/// One configuration key with its compiled-in default and fixed capacity.
///
/// The visible value is never empty: it is the stored string when one was
/// accepted, and the default otherwise.
#[derive(Debug, Clone)]
pub struct ConfigEntry<const CAP: usize> {
    key: &'static str,
    default: &'static str,
    stored: Option<String<CAP>>,
}

impl<const CAP: usize> ConfigEntry<CAP> {
    const fn new(key: &'static str, default: &'static str) -> Self {
        Self {
            key,
            default,
            stored: None,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn default_value(&self) -> &'static str {
        self.default
    }

    pub fn capacity(&self) -> usize {
        CAP
    }

    pub fn value(&self) -> &str {
        self.stored.as_deref().unwrap_or(self.default)
    }
}

/// Durable configuration store over an [`NvsPartition`].
///
/// `load()` runs once at startup, before the network comes up. Writes go to
/// NVS first and update the in-memory value only after the commit succeeds,
/// so a failed write leaves the previous value in effect.
pub struct ConfigStore<P: NvsPartition> {
    partition: P,
    server_url: ConfigEntry<SERVER_URL_CAPACITY>,
    ota_update_url: ConfigEntry<OTA_UPDATE_URL_CAPACITY>,
}

impl<P: NvsPartition> ConfigStore<P> {
    pub fn new(partition: P) -> Self {
        Self {
            partition,
            server_url: ConfigEntry::new(SERVER_URL_KEY, DEFAULT_SERVER_URL),
            ota_update_url: ConfigEntry::new(OTA_UPDATE_URL_KEY, DEFAULT_OTA_UPDATE_URL),
        }
    }

    pub fn server_url(&self) -> &str {
        self.server_url.value()
    }

    pub fn ota_update_url(&self) -> &str {
        self.ota_update_url.value()
    }

    /// Loads both URLs from NVS, falling back to the compiled-in defaults.
    ///
    /// Every miss is non-fatal: an unopenable partition, an absent key, an
    /// oversized or malformed value all leave the default in place. There is
    /// no retry; the next boot cycle reads again.
    pub fn load(&mut self) {
        let mut handle = match self.partition.open(NVS_NAMESPACE, OpenMode::ReadOnly) {
            Ok(handle) => handle,
            Err(err) => {
                log::warn!("NVS open failed ({err}), using default URLs");
                return;
            }
        };

        match read_value::<_, SERVER_URL_CAPACITY>(&mut handle, SERVER_URL_KEY) {
            Ok(value) => {
                log::info!("Loaded server URL from NVS: {value}");
                self.server_url.stored = Some(value);
            }
            Err(err) => log::warn!(
                "Failed to load server URL from NVS ({err}), using default: {}",
                self.server_url.value()
            ),
        }

        match read_value::<_, OTA_UPDATE_URL_CAPACITY>(&mut handle, OTA_UPDATE_URL_KEY) {
            Ok(value) => {
                log::info!("Loaded OTA update URL from NVS: {value}");
                self.ota_update_url.stored = Some(value);
            }
            Err(err) => log::warn!(
                "Failed to load OTA update URL from NVS ({err}), using default: {}",
                self.ota_update_url.value()
            ),
        }
    }

    /// Writes and commits one key. The in-memory entries are untouched;
    /// callers update them only after this returns `Ok`.
    pub fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut handle = self
            .partition
            .open(NVS_NAMESPACE, OpenMode::ReadWrite)
            .map_err(|err| {
                log::error!("Failed to open NVS for writing: {err}");
                err
            })?;

        handle.set_str(key, value).map_err(|err| {
            log::error!("Failed to save {key} to NVS: {err}");
            err
        })?;
        handle.commit().map_err(|err| {
            log::error!("Failed to commit {key} to NVS: {err}");
            err
        })?;

        log::info!("{key} saved to NVS: {value}");
        Ok(())
    }

    /// Accepts a new control endpoint: capacity check, persist, then memory.
    pub fn set_server_url(&mut self, value: &str) -> Result<(), StorageError> {
        let accepted: String<SERVER_URL_CAPACITY> = accept(value)?;
        self.save(SERVER_URL_KEY, value)?;
        self.server_url.stored = Some(accepted);
        Ok(())
    }

    /// Accepts a new firmware source: capacity check, persist, then memory.
    ///
    /// Oversized values are rejected before anything is written, so neither
    /// the persisted nor the in-memory URL can end up truncated.
    pub fn set_ota_update_url(&mut self, value: &str) -> Result<(), StorageError> {
        let accepted: String<OTA_UPDATE_URL_CAPACITY> = accept(value)?;
        self.save(OTA_UPDATE_URL_KEY, value)?;
        self.ota_update_url.stored = Some(accepted);
        Ok(())
    }
}

fn accept<const CAP: usize>(value: &str) -> Result<String<CAP>, StorageError> {
    if value.is_empty() {
        return Err(StorageError::InvalidData);
    }
    String::try_from(value).map_err(|_| {
        log::error!(
            "Rejecting value of {} bytes: exceeds capacity {CAP}",
            value.len()
        );
        StorageError::ValueTooLarge
    })
}

fn read_value<H: NvsHandle, const CAP: usize>(
    handle: &mut H,
    key: &str,
) -> Result<String<CAP>, StorageError> {
    let mut buf = [0u8; CAP];
    let len = handle.get_str(key, &mut buf)?;
    let text = core::str::from_utf8(&buf[..len]).map_err(|_| StorageError::InvalidData)?;
    if text.is_empty() {
        return Err(StorageError::InvalidData);
    }
    String::try_from(text).map_err(|_| StorageError::ValueTooLarge)
}
