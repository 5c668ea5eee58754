//! Schedule sync engine — reliable delivery of one channel's schedule.
//!
//! The engine is a pure state machine: it decides *what* to transmit and
//! which event ends a cycle, while the [`CommandBridge`](crate::bridge::CommandBridge)
//! does the IO (fan-out, persistence, publications).
//!
//! ```text
//!            request_sync (differs from active)
//!   Idle ─────────────────────────────────────▶ AwaitingAck
//!    ▲                                             │  │
//!    │   on_ack(ok) / on_ack(!ok) / timeout        │  │ tick past deadline,
//!    └─────────────────────────────────────────────┘  │ retries left: resend
//!                                                     ◀┘
//! ```

use relaysync_domain::channel::RelayChannel;
use relaysync_domain::event::{SyncEvent, SyncFailure};
use relaysync_domain::schedule::RelaySchedule;
use relaysync_domain::time::Millis;
use relaysync_domain::wire::ScheduleRulesPacket;

/// How long to wait for an acknowledgement before resending or giving up.
pub const ACK_TIMEOUT_MS: u32 = 3_000;

/// Resends allowed after the first transmission.
pub const MAX_RETRIES: u8 = 1;

/// Per-channel synchronisation state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    AwaitingAck {
        pending: RelaySchedule,
        retries_left: u8,
        /// When the current attempt was sent; the deadline is
        /// `sent_at + ACK_TIMEOUT_MS`.
        sent_at: Millis,
    },
}

impl SyncState {
    /// Deadline of the current attempt, if one is in flight.
    #[must_use]
    pub fn deadline(&self) -> Option<Millis> {
        match self {
            Self::Idle => None,
            Self::AwaitingAck { sent_at, .. } => Some(sent_at.wrapping_add(ACK_TIMEOUT_MS)),
        }
    }
}

/// What the caller must do after [`ScheduleSyncEngine::request_sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRequest {
    /// The desired schedule is already active; echo it, send nothing.
    AlreadyActive,
    /// Broadcast this packet to every known peer.
    Transmit(ScheduleRulesPacket),
}

/// What the caller must do after [`ScheduleSyncEngine::on_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The deadline passed with a retry left; broadcast this packet again.
    Retransmit(ScheduleRulesPacket),
    /// The cycle is over.
    Finished(SyncEvent),
}

/// Reliable-delivery state machine for a single relay channel.
#[derive(Debug, Clone)]
pub struct ScheduleSyncEngine {
    channel: RelayChannel,
    active: RelaySchedule,
    state: SyncState,
}

impl ScheduleSyncEngine {
    /// Start idle with `active` as the currently enforced schedule.
    #[must_use]
    pub fn new(channel: RelayChannel, active: RelaySchedule) -> Self {
        Self {
            channel,
            active,
            state: SyncState::Idle,
        }
    }

    #[must_use]
    pub fn channel(&self) -> RelayChannel {
        self.channel
    }

    #[must_use]
    pub fn active(&self) -> &RelaySchedule {
        &self.active
    }

    #[must_use]
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self.state, SyncState::Idle)
    }

    /// Replace the active schedule without a sync cycle (used when restoring
    /// from persistence at startup).
    pub fn restore(&mut self, active: RelaySchedule) {
        self.active = active;
    }

    /// Ask for `desired` to become the active schedule.
    ///
    /// While idle, a schedule equal to the active one is a no-op. Otherwise
    /// the engine (re)arms with a full retry budget; a request arriving while
    /// another is in flight replaces it.
    pub fn request_sync(&mut self, desired: RelaySchedule, now: Millis) -> SyncRequest {
        if self.is_idle() && desired == self.active {
            return SyncRequest::AlreadyActive;
        }
        if let SyncState::AwaitingAck { pending, .. } = &self.state {
            tracing::info!(
                channel = %self.channel,
                superseded_rules = pending.len(),
                "sync request supersedes in-flight schedule"
            );
        }
        let packet = self.packet(&desired, now);
        self.state = SyncState::AwaitingAck {
            pending: desired,
            retries_left: MAX_RETRIES,
            sent_at: now,
        };
        SyncRequest::Transmit(packet)
    }

    /// Handle an acknowledgement from the node.
    ///
    /// Ignored while idle, which makes duplicate and late acks harmless.
    pub fn on_ack(&mut self, ok: bool) -> Option<SyncEvent> {
        let SyncState::AwaitingAck { pending, .. } = std::mem::take(&mut self.state) else {
            return None;
        };
        if ok {
            self.active = pending;
            Some(SyncEvent::Accepted {
                channel: self.channel,
                schedule: self.active.clone(),
            })
        } else {
            Some(SyncEvent::Failed {
                channel: self.channel,
                failure: SyncFailure::Rejected,
            })
        }
    }

    /// Advance time; resends once, then gives up.
    pub fn on_tick(&mut self, now: Millis) -> Option<TickOutcome> {
        let SyncState::AwaitingAck {
            pending,
            retries_left,
            sent_at,
        } = &mut self.state
        else {
            return None;
        };
        if !now.has_elapsed(*sent_at, ACK_TIMEOUT_MS) {
            return None;
        }
        if *retries_left > 0 {
            *retries_left -= 1;
            *sent_at = now;
            let pending = pending.clone();
            return Some(TickOutcome::Retransmit(self.packet(&pending, now)));
        }
        self.state = SyncState::Idle;
        Some(TickOutcome::Finished(SyncEvent::Failed {
            channel: self.channel,
            failure: SyncFailure::Timeout {
                attempts: MAX_RETRIES + 1,
            },
        }))
    }

    fn packet(&self, schedule: &RelaySchedule, now: Millis) -> ScheduleRulesPacket {
        ScheduleRulesPacket {
            channel: self.channel,
            schedule: schedule.clone(),
            ms: now.get(),
        }
    }
}
