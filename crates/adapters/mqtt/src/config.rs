//! Operator bus settings: where the broker lives and which topic tree
//! carries relay schedules, commands and telemetry.

use serde::Deserialize;

/// How the daemon reaches the operator's broker.
///
/// Every topic the bridge publishes or subscribes to sits under
/// [`base_topic`](Self::base_topic), e.g. `relaysync/relay/2/schedule/set`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    /// Must be unique on the broker, a second daemon with the same id
    /// kicks the first one off.
    pub client_id: String,
    /// Root of the relay topic tree, without a trailing `/`.
    pub base_topic: String,
    pub keep_alive_secs: u16,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "relaysync".to_string(),
            base_topic: "relaysync".to_string(),
            keep_alive_secs: 30,
        }
    }
}
