//! Datagram transport and receive loop.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::net::UdpSocket;

use relaysync_app::mailbox::RadioInbox;
use relaysync_app::ports::RadioTransport;
use relaysync_domain::error::RelaySyncError;
use relaysync_domain::peer::{MAX_PEERS, PeerAddress};

use crate::config::UdpRadioConfig;
use crate::error::UdpRadioError;

const HEADER_LEN: usize = 6;
const MAX_DATAGRAM: usize = 512;
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

type Routes = Arc<Mutex<HashMap<PeerAddress, SocketAddr>>>;

/// Sending half of the UDP radio.
#[derive(Clone)]
pub struct UdpRadio {
    socket: Arc<UdpSocket>,
    hub: PeerAddress,
    broadcast: SocketAddr,
    routes: Routes,
}

impl UdpRadio {
    /// Open the socket described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`UdpRadioError`] if an address does not parse or the socket
    /// cannot be bound.
    pub async fn bind(config: &UdpRadioConfig) -> Result<(Self, UdpReceiver), UdpRadioError> {
        let hub: PeerAddress = config.hub_address.parse()?;
        let broadcast: SocketAddr =
            config
                .broadcast
                .parse()
                .map_err(|_| UdpRadioError::Address {
                    field: "broadcast",
                    value: config.broadcast.clone(),
                })?;
        let socket = UdpSocket::bind(&config.bind)
            .await
            .map_err(|source| UdpRadioError::Bind {
                addr: config.bind.clone(),
                source,
            })?;
        socket
            .set_broadcast(true)
            .map_err(|source| UdpRadioError::Bind {
                addr: config.bind.clone(),
                source,
            })?;
        tracing::info!(bind = %config.bind, hub = %hub, "UDP radio ready");

        let socket = Arc::new(socket);
        let routes = Routes::default();
        let radio = Self {
            socket: Arc::clone(&socket),
            hub,
            broadcast,
            routes: Arc::clone(&routes),
        };
        let receiver = UdpReceiver {
            socket,
            hub,
            routes,
        };
        Ok((radio, receiver))
    }

    /// Address the socket is actually bound to.
    ///
    /// # Errors
    ///
    /// Propagates the OS error.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn route(&self, to: PeerAddress) -> SocketAddr {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&to)
            .copied()
            .unwrap_or(self.broadcast)
    }
}

impl RadioTransport for UdpRadio {
    fn send(
        &self,
        to: PeerAddress,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), RelaySyncError>> + Send {
        let target = self.route(to);
        let mut datagram = Vec::with_capacity(HEADER_LEN + frame.len());
        datagram.extend_from_slice(&self.hub.octets());
        datagram.extend_from_slice(frame);
        let socket = Arc::clone(&self.socket);
        async move {
            socket
                .send_to(&datagram, target)
                .await
                .map_err(|source| UdpRadioError::Send { peer: to, source })?;
            tracing::debug!(peer = %to, %target, len = frame_len(&datagram), "datagram sent");
            Ok(())
        }
    }
}

fn frame_len(datagram: &[u8]) -> usize {
    datagram.len().saturating_sub(HEADER_LEN)
}

/// Receiving half of the UDP radio.
pub struct UdpReceiver {
    socket: Arc<UdpSocket>,
    hub: PeerAddress,
    routes: Routes,
}

impl UdpReceiver {
    /// Receive datagrams forever, learning routes and feeding `inbox`.
    pub async fn run(self, inbox: RadioInbox) {
        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, from)) => self.on_datagram(&buf[..len], from, &inbox),
                Err(err) => {
                    tracing::warn!(%err, "UDP receive failed");
                    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                }
            }
        }
    }

    fn on_datagram(&self, datagram: &[u8], from: SocketAddr, inbox: &RadioInbox) {
        let Some((header, frame)) = datagram.split_first_chunk::<HEADER_LEN>() else {
            tracing::debug!(%from, len = datagram.len(), "ignoring runt datagram");
            return;
        };
        let peer = PeerAddress::new(*header);
        if peer == self.hub {
            return;
        }
        if frame.is_empty() {
            tracing::debug!(%from, peer = %peer, "ignoring empty frame");
            return;
        }
        self.learn_route(peer, from);
        inbox.receive(peer, frame);
    }

    /// Remember where `peer` answers from; at most [`MAX_PEERS`] routes are kept.
    fn learn_route(&self, peer: PeerAddress, from: SocketAddr) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        if routes.len() >= MAX_PEERS && !routes.contains_key(&peer) {
            tracing::debug!(peer = %peer, %from, "route table full, not learning");
            return;
        }
        routes.insert(peer, from);
    }
}
