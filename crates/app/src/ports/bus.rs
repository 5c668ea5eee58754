//! Message-bus port — topic publish/subscribe towards the operator.

use std::future::Future;

use relaysync_domain::error::RelaySyncError;

/// Publishes payloads on bus topics.
pub trait BusPublisher {
    /// Publish `payload` on `topic`, optionally retained by the broker.
    fn publish(
        &self,
        topic: &str,
        payload: &str,
        retained: bool,
    ) -> impl Future<Output = Result<(), RelaySyncError>> + Send;

    /// Whether the bus connection is currently up.
    fn is_connected(&self) -> bool;
}

impl<T: BusPublisher + Send + Sync> BusPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        topic: &str,
        payload: &str,
        retained: bool,
    ) -> impl Future<Output = Result<(), RelaySyncError>> + Send {
        (**self).publish(topic, payload, retained)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// An inbound message on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Everything the bus adapter reports to the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Connected,
    Disconnected,
    Message(BusMessage),
}
