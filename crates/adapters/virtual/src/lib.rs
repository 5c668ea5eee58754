//! # relaysync-adapter-virtual
//!
//! In-memory radio with a simulated relay node behind it, for demos and
//! tests.
//!
//! ## Simulated node
//!
//! | Inbound frame | Behaviour |
//! |---------------|-----------|
//! | `ScheduleRules` | Stores the schedule and, with auto-ack on, answers `ScheduleAck` |
//! | `Command` | Switches the addressed relays and answers one `Executed` per relay |
//! | `TimeSync` | Remembers the time, used to stamp `Executed` reports |
//!
//! Every frame the hub sends is recorded, addressed to the node or not.
//!
//! ## Dependency rule
//!
//! Depends on `relaysync-app` (port traits) and `relaysync-domain` only.

mod node;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use relaysync_app::mailbox::RadioInbox;
use relaysync_app::ports::RadioTransport;
use relaysync_domain::channel::RelayChannel;
use relaysync_domain::error::RelaySyncError;
use relaysync_domain::peer::PeerAddress;
use relaysync_domain::schedule::{RelaySchedule, SwitchState};
use relaysync_domain::wire::{Frame, HelloPacket};

use node::SimulatedNode;

/// Hardware address of the default simulated node.
pub const DEFAULT_NODE: PeerAddress = PeerAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x10]);

/// Radio transport backed by a [`SimulatedNode`].
#[derive(Clone)]
pub struct VirtualRadio {
    inner: Arc<Inner>,
}

struct Inner {
    node_address: PeerAddress,
    node: Mutex<SimulatedNode>,
    sent: Mutex<Vec<(PeerAddress, Frame)>>,
    inbox: Mutex<Option<RadioInbox>>,
}

impl VirtualRadio {
    /// Create a radio whose node answers schedule pushes iff `auto_ack`.
    #[must_use]
    pub fn new(node_address: PeerAddress, auto_ack: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                node_address,
                node: Mutex::new(SimulatedNode::new(auto_ack)),
                sent: Mutex::new(Vec::new()),
                inbox: Mutex::new(None),
            }),
        }
    }

    /// Route the node's replies into `inbox`.
    pub fn attach(&self, inbox: RadioInbox) {
        *lock(&self.inner.inbox) = Some(inbox);
    }

    #[must_use]
    pub fn node_address(&self) -> PeerAddress {
        self.inner.node_address
    }

    /// Make the node announce itself.
    pub fn announce(&self, ms: u32) {
        self.inject(&Frame::Hello(HelloPacket { channel: 0, ms }).encode());
    }

    /// Make the node broadcast a telemetry reading.
    pub fn emit_telemetry(&self, ms: u32) {
        let packet = lock(&self.inner.node).telemetry(ms);
        self.inject(&Frame::Telemetry(packet).encode());
    }

    /// Deliver raw bytes to the hub as if the node had sent them.
    pub fn inject(&self, bytes: &[u8]) {
        match lock(&self.inner.inbox).as_ref() {
            Some(inbox) => {
                inbox.receive(self.inner.node_address, bytes);
            }
            None => tracing::debug!("virtual radio not attached, dropping node frame"),
        }
    }

    /// Every frame the hub has sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<(PeerAddress, Frame)> {
        lock(&self.inner.sent).clone()
    }

    /// Schedule the node is currently enforcing on `channel`.
    #[must_use]
    pub fn node_schedule(&self, channel: RelayChannel) -> RelaySchedule {
        lock(&self.inner.node).schedule(channel).clone()
    }

    #[must_use]
    pub fn node_relay(&self, channel: RelayChannel) -> SwitchState {
        lock(&self.inner.node).relay(channel)
    }

    /// Announce once, then emit telemetry every `period`, forever.
    pub async fn run(self, period: Duration) {
        let started = tokio::time::Instant::now();
        self.announce(0);
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let ms = u32::try_from(started.elapsed().as_millis()).unwrap_or(u32::MAX);
            self.emit_telemetry(ms);
        }
    }
}

impl RadioTransport for VirtualRadio {
    fn send(
        &self,
        to: PeerAddress,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), RelaySyncError>> + Send {
        let result = Frame::decode(frame).map_err(RelaySyncError::from);
        if let Ok(decoded) = &result {
            lock(&self.inner.sent).push((to, decoded.clone()));
            if to == self.inner.node_address || to == PeerAddress::BROADCAST {
                let replies = lock(&self.inner.node).handle(decoded);
                for reply in replies {
                    self.inject(&reply.encode());
                }
            }
        }
        async move { result.map(|_| ()) }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
