//! Outcomes of a schedule synchronisation.

use std::fmt;

use crate::channel::RelayChannel;
use crate::schedule::RelaySchedule;

/// Why a sync request ended without the node accepting the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFailure {
    /// No acknowledgement within the budgeted attempts.
    Timeout { attempts: u8 },
    /// The node answered with a negative acknowledgement.
    Rejected,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { attempts } => write!(f, "timeout after {attempts} attempts"),
            Self::Rejected => f.write_str("rejected"),
        }
    }
}

/// Terminal event of one sync cycle on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The node acknowledged; `schedule` is now the active schedule.
    Accepted {
        channel: RelayChannel,
        schedule: RelaySchedule,
    },
    /// The cycle ended without acceptance; the active schedule is unchanged.
    Failed {
        channel: RelayChannel,
        failure: SyncFailure,
    },
}

impl SyncEvent {
    #[must_use]
    pub fn channel(&self) -> RelayChannel {
        match self {
            Self::Accepted { channel, .. } | Self::Failed { channel, .. } => *channel,
        }
    }
}
