//! Connectivity-and-update orchestration core for a battery-sensitive IoT
//! device.
//!
//! One boot cycle looks like this:
//!
//! 1. [`ConfigStore::load`] reads `server_url` and `ota_update_url` from NVS,
//!    falling back to compiled-in defaults.
//! 2. [`ConnectivityManager::initialize`] starts the station;
//!    [`ConnectivityManager::wait_until_connected`] blocks until the link is
//!    up (driver events keep retrying indefinitely underneath).
//! 3. [`CommandChannel::connect`] subscribes to the broker at `server_url`
//!    and feeds inbound messages to
//!    [`UpdateOrchestrator::handle_command`], which persists new update URLs.
//! 4. [`UpdateOrchestrator::run_update_cycle`] makes this cycle's single
//!    update attempt: success restarts into the new image,
//!    [`UpdateOrchestrator::finish_cycle`] otherwise deep-sleeps until the
//!    next cycle re-enters the sequence from the top.
//!
//! The radio, NVS partition, MQTT client, firmware fetch, and restart/sleep
//! primitives are collaborator traits ([`WifiDriver`], [`NvsPartition`],
//! [`MqttClient`], [`FirmwareTransport`], [`SystemPower`]); hosts bind them
//! to the platform, tests to in-memory fakes.

pub mod config;
pub mod network;
pub mod ota;
pub mod system;

pub use config::{
    ConfigEntry, ConfigStore, NvsHandle, NvsPartition, OpenMode, StorageError,
    DEFAULT_OTA_UPDATE_URL, DEFAULT_SERVER_URL, NVS_NAMESPACE, OTA_UPDATE_URL_CAPACITY,
    OTA_UPDATE_URL_KEY, SERVER_URL_CAPACITY, SERVER_URL_KEY,
};
pub use network::mqtt::{CommandChannel, MqttClient, MqttError, OTA_UPDATE_URL_TOPIC};
pub use network::wifi::{ConnectionState, ConnectivityManager, WifiDriver, WifiEvent};
pub use ota::{
    FirmwareTransport, UpdateError, UpdateOrchestrator, UpdateOutcome, DEFAULT_CYCLE_SLEEP,
};
pub use system::SystemPower;
