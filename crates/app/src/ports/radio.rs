//! Radio port — best-effort delivery of frames to a hardware address.

use std::future::Future;

use relaysync_domain::error::RelaySyncError;
use relaysync_domain::peer::PeerAddress;

/// Sends raw frames to a single peer over the local wireless link.
///
/// The transport's own initialisation and channel handling are the
/// adapter's business; the core only needs `send`.
pub trait RadioTransport {
    /// Send `frame` to `to`. Success means the transport accepted the frame,
    /// not that the peer received it.
    fn send(
        &self,
        to: PeerAddress,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), RelaySyncError>> + Send;
}

impl<T: RadioTransport + Send + Sync> RadioTransport for std::sync::Arc<T> {
    fn send(
        &self,
        to: PeerAddress,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), RelaySyncError>> + Send {
        (**self).send(to, frame)
    }
}

/// A raw frame handed from the receive path to the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub from: PeerAddress,
    pub bytes: Vec<u8>,
}
