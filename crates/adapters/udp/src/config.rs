//! UDP radio configuration.

use serde::Deserialize;

/// Configuration for the UDP radio transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UdpRadioConfig {
    /// Local socket address to listen on.
    pub bind: String,
    /// Destination for frames addressed to peers with no learned route.
    pub broadcast: String,
    /// Hardware address the hub stamps on outgoing datagrams.
    pub hub_address: String,
}

impl Default for UdpRadioConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:4210".to_string(),
            broadcast: "255.255.255.255:4210".to_string(),
            hub_address: "02:00:00:00:00:01".to_string(),
        }
    }
}
