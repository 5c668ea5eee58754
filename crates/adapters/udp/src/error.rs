//! UDP radio error types.

use relaysync_domain::error::{DeliveryError, RelaySyncError, ValidationError};
use relaysync_domain::peer::PeerAddress;

/// Errors specific to the UDP radio adapter.
#[derive(Debug, thiserror::Error)]
pub enum UdpRadioError {
    /// The local socket could not be opened.
    #[error("failed to bind UDP socket on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A configured socket address does not parse.
    #[error("invalid {field} address {value:?}")]
    Address { field: &'static str, value: String },

    /// The configured hub hardware address does not parse.
    #[error("invalid hub address")]
    HubAddress(#[from] ValidationError),

    /// A datagram could not be sent.
    #[error("failed to send to {peer}")]
    Send {
        peer: PeerAddress,
        #[source]
        source: std::io::Error,
    },
}

impl UdpRadioError {
    /// Convert into a [`RelaySyncError`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> RelaySyncError {
        match self {
            Self::HubAddress(err) => err.into(),
            Self::Send { peer, source } => DeliveryError::SendFailed {
                peer: peer.to_string(),
                reason: source.to_string(),
            }
            .into(),
            other => DeliveryError::SendFailed {
                peer: PeerAddress::BROADCAST.to_string(),
                reason: other.to_string(),
            }
            .into(),
        }
    }
}

impl From<UdpRadioError> for RelaySyncError {
    fn from(err: UdpRadioError) -> Self {
        err.into_domain()
    }
}
