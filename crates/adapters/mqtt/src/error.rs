//! MQTT adapter error types.

use relaysync_domain::error::RelaySyncError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The connection settings would be refused by the client.
    #[error("invalid MQTT configuration: {0}")]
    InvalidConfig(&'static str),

    /// The rumqttc client rejected the request.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// An inbound topic or payload is not valid UTF-8.
    #[error("non UTF-8 {part} on inbound message")]
    InvalidUtf8 {
        part: &'static str,
        #[source]
        source: std::str::Utf8Error,
    },
}

impl MqttError {
    /// Convert into a [`RelaySyncError::Bus`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> RelaySyncError {
        RelaySyncError::Bus(Box::new(self))
    }
}

impl From<MqttError> for RelaySyncError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}
