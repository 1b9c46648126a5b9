//! Inbound command delivery over MQTT.
//!
//! Subscribe-only: the device never publishes. Messages are handed to a
//! single dispatch callback in arrival order, one at a time. Payloads are
//! length-delimited byte slices, not NUL-terminated strings, and the slice is
//! only valid for the duration of the callback; anything worth keeping must
//! be copied out before it returns. Lost messages are not retried here.

use thiserror::Error;

/// The one topic this device acts on: a replacement firmware source URL.
pub const OTA_UPDATE_URL_TOPIC: &str = "ota_update_url";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MqttError {
    #[error("failed to connect to MQTT broker")]
    ConnectFailed,
    #[error("failed to subscribe to topic")]
    SubscribeFailed,
}

/// Publish/subscribe client collaborator.
pub trait MqttClient {
    fn connect(&mut self, broker_url: &str) -> Result<(), MqttError>;
    fn subscribe(&mut self, topic: &str) -> Result<(), MqttError>;
}

/// Routes inbound messages from the transport to one dispatch callback.
///
/// `connect` must only be called once the connectivity manager reports the
/// link as up; the broker URL comes from the config store's `server_url`.
pub struct CommandChannel<C: MqttClient> {
    client: C,
    dispatch: Box<dyn FnMut(&str, &[u8]) + Send>,
}

impl<C: MqttClient> CommandChannel<C> {
    pub fn new(client: C, dispatch: impl FnMut(&str, &[u8]) + Send + 'static) -> Self {
        Self {
            client,
            dispatch: Box::new(dispatch),
        }
    }

    /// Opens the subscribe session and subscribes to the update-URL topic.
    pub fn connect(&mut self, broker_url: &str) -> Result<(), MqttError> {
        self.client.connect(broker_url)?;
        self.client.subscribe(OTA_UPDATE_URL_TOPIC)?;
        log::info!("MQTT command channel connected to {broker_url}");
        Ok(())
    }

    /// Transport-context entry point, invoked once per inbound message.
    /// The dispatch callback must not block for long.
    pub fn on_message(&mut self, topic: &str, payload: &[u8]) {
        log::debug!("MQTT data on '{topic}' ({} bytes)", payload.len());
        (self.dispatch)(topic, payload);
    }
}
