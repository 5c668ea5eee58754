//! Remote controller nodes reachable over the radio link.

use std::fmt;
use std::str::FromStr;

use crate::error::{CapacityError, ValidationError};
use crate::time::Millis;

/// Maximum number of peers tracked at once.
pub const MAX_PEERS: usize = 10;

/// Opaque 6-byte hardware address of a radio peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PeerAddress([u8; 6]);

impl PeerAddress {
    /// Link-layer broadcast address.
    pub const BROADCAST: Self = Self([0xFF; 6]);

    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for PeerAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for PeerAddress {
    type Err = ValidationError;

    /// Parse `"AA:BB:CC:DD:EE:FF"` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::PeerAddress(s.to_owned());
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in &mut bytes {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(bytes))
    }
}

/// Registry bookkeeping for a single peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerEntry {
    pub address: PeerAddress,
    /// Last time a frame was received from this peer. Never used for eviction.
    pub last_seen: Millis,
}

/// Fixed-capacity set of known peers.
///
/// Slots are claimed in order and never released: once all
/// [`MAX_PEERS`] slots are used, new addresses are not tracked.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    slots: [PeerEntry; MAX_PEERS],
    occupied: u16,
}

impl PeerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn is_occupied(&self, slot: usize) -> bool {
        self.occupied & (1 << slot) != 0
    }

    /// Slot index holding `address`, if tracked.
    #[must_use]
    pub fn find(&self, address: PeerAddress) -> Option<usize> {
        (0..MAX_PEERS).find(|&slot| self.is_occupied(slot) && self.slots[slot].address == address)
    }

    /// Refresh `address` or claim a free slot for it.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::PeerTableFull`] when the address is new and
    /// every slot is taken; the address is then dropped.
    pub fn touch_or_register(
        &mut self,
        address: PeerAddress,
        now: Millis,
    ) -> Result<Registration, CapacityError> {
        if let Some(slot) = self.find(address) {
            self.slots[slot].last_seen = now;
            return Ok(Registration::Refreshed);
        }
        let free = (0..MAX_PEERS)
            .find(|&slot| !self.is_occupied(slot))
            .ok_or(CapacityError::PeerTableFull { max: MAX_PEERS })?;
        self.slots[free] = PeerEntry {
            address,
            last_seen: now,
        };
        self.occupied |= 1 << free;
        Ok(Registration::Added)
    }

    /// Addresses of all tracked peers in slot order.
    pub fn all(&self) -> impl Iterator<Item = PeerAddress> + '_ {
        self.entries().map(|entry| entry.address)
    }

    /// Entries of all tracked peers in slot order.
    pub fn entries(&self) -> impl Iterator<Item = &PeerEntry> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(slot, _)| self.is_occupied(*slot))
            .map(|(_, entry)| entry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.occupied.count_ones() as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == MAX_PEERS
    }
}

/// Outcome of [`PeerRegistry::touch_or_register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The peer was already known; its last-seen time was refreshed.
    Refreshed,
    /// The peer took a free slot.
    Added,
}
