//! Relay channels and the per-channel arena.
//!
//! The remote node switches exactly three relays. Everything that is tracked
//! per relay (schedules, sync state, observed state) lives in a
//! [`PerChannel`] indexed by [`RelayChannel`], so out-of-range access is
//! impossible once a channel number has been validated.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of independently switched relays.
pub const CHANNEL_COUNT: usize = 3;

/// One of the three relay outputs, numbered `1..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RelayChannel(u8);

impl RelayChannel {
    /// All channels in ascending order.
    pub const ALL: [Self; CHANNEL_COUNT] = [Self(1), Self(2), Self(3)];

    /// Validate a channel number.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ChannelOutOfRange`] unless `number` is 1, 2 or 3.
    pub fn new(number: u8) -> Result<Self, ValidationError> {
        if (1..=3).contains(&number) {
            Ok(Self(number))
        } else {
            Err(ValidationError::ChannelOutOfRange(number))
        }
    }

    /// The wire/topic number (`1..=3`).
    #[must_use]
    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based position inside a [`PerChannel`].
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// Persistence key holding this channel's active schedule.
    #[must_use]
    pub fn storage_key(self) -> String {
        format!("schedule_{}", self.0)
    }
}

impl TryFrom<u8> for RelayChannel {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RelayChannel> for u8 {
    fn from(value: RelayChannel) -> Self {
        value.0
    }
}

impl fmt::Display for RelayChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Fixed arena holding one `T` per relay channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerChannel<T>([T; CHANNEL_COUNT]);

impl<T> PerChannel<T> {
    /// Build the arena by calling `init` once per channel.
    pub fn from_fn(mut init: impl FnMut(RelayChannel) -> T) -> Self {
        Self(RelayChannel::ALL.map(&mut init))
    }

    /// Iterate `(channel, value)` pairs in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (RelayChannel, &T)> {
        RelayChannel::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<RelayChannel> for PerChannel<T> {
    type Output = T;

    fn index(&self, channel: RelayChannel) -> &T {
        &self.0[channel.index()]
    }
}

impl<T> IndexMut<RelayChannel> for PerChannel<T> {
    fn index_mut(&mut self, channel: RelayChannel) -> &mut T {
        &mut self.0[channel.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_channels_one_to_three() {
        for n in 1..=3 {
            assert_eq!(RelayChannel::new(n).unwrap().number(), n);
        }
    }

    #[test]
    fn should_reject_channel_zero_and_four() {
        assert_eq!(
            RelayChannel::new(0),
            Err(ValidationError::ChannelOutOfRange(0))
        );
        assert_eq!(
            RelayChannel::new(4),
            Err(ValidationError::ChannelOutOfRange(4))
        );
    }

    #[test]
    fn should_build_storage_key_from_number() {
        let ch = RelayChannel::new(2).unwrap();
        assert_eq!(ch.storage_key(), "schedule_2");
    }

    #[test]
    fn should_index_arena_by_channel() {
        let mut arena = PerChannel::from_fn(|ch| u32::from(ch.number()) * 10);
        let ch3 = RelayChannel::new(3).unwrap();
        assert_eq!(arena[ch3], 30);
        arena[ch3] = 7;
        assert_eq!(arena[ch3], 7);
        let values: Vec<u32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![10, 20, 7]);
    }

    #[test]
    fn should_reject_out_of_range_channel_in_serde() {
        let parsed: Result<RelayChannel, _> = serde_json::from_str("5");
        assert!(parsed.is_err());
        let ok: RelayChannel = serde_json::from_str("1").unwrap();
        assert_eq!(ok.number(), 1);
    }
}
