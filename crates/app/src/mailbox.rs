//! Handoff from the radio receive path to the control loop.
//!
//! The receive path runs outside the loop and must never block on it.
//! Telemetry goes through a single-slot [`TelemetryMailbox`] (last value
//! wins); every other frame is queued on a bounded channel and dropped when
//! full.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering, fence};

use tokio::sync::mpsc;

use relaysync_domain::peer::PeerAddress;
use relaysync_domain::wire::{Frame, TELEMETRY_LEN, TelemetryPacket};

use crate::ports::InboundFrame;

const ADDRESS_LEN: usize = 6;
const SLOT_WORDS: usize = 3;
const SLOT_LEN: usize = SLOT_WORDS * 8;

const _: () = assert!(ADDRESS_LEN + TELEMETRY_LEN == SLOT_LEN);

/// A telemetry reading together with its sender.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryReading {
    pub from: PeerAddress,
    pub packet: TelemetryPacket,
}

/// Single-slot, last-value-wins telemetry handoff.
///
/// A sequence lock over plain atomics: neither side takes a lock, waits or
/// allocates. A reader that catches a deposit half-written gets nothing and
/// picks the value up on its next call. A deposit racing another deposit
/// gives way.
#[derive(Debug, Default)]
pub struct TelemetryMailbox {
    /// Odd while a deposit is being written.
    seq: AtomicU32,
    /// Sequence of the last value handed out by [`take`](Self::take).
    taken: AtomicU32,
    words: [AtomicU64; SLOT_WORDS],
}

impl TelemetryMailbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot's content with `reading`.
    ///
    /// Returns `false` when another deposit was in progress and kept the slot.
    pub fn deposit(&self, reading: TelemetryReading) -> bool {
        let seq = self.seq.load(Ordering::Relaxed);
        if seq % 2 == 1
            || self
                .seq
                .compare_exchange(seq, seq.wrapping_add(1), Ordering::Acquire, Ordering::Relaxed)
                .is_err()
        {
            return false;
        }
        fence(Ordering::Release);
        for (slot, word) in self.words.iter().zip(pack(&reading)) {
            slot.store(word, Ordering::Relaxed);
        }
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
        true
    }

    /// Take the latest unread reading, if any.
    pub fn take(&self) -> Option<TelemetryReading> {
        let before = self.seq.load(Ordering::Acquire);
        if before % 2 == 1 || before == self.taken.load(Ordering::Relaxed) {
            return None;
        }
        let words = self.words.each_ref().map(|word| word.load(Ordering::Relaxed));
        fence(Ordering::Acquire);
        if self.seq.load(Ordering::Relaxed) != before {
            return None;
        }
        self.taken.store(before, Ordering::Relaxed);
        Some(unpack(words))
    }
}

fn pack(reading: &TelemetryReading) -> [u64; SLOT_WORDS] {
    let mut bytes = [0u8; SLOT_LEN];
    bytes[..ADDRESS_LEN].copy_from_slice(&reading.from.octets());
    bytes[ADDRESS_LEN..].copy_from_slice(&reading.packet.to_bytes());
    let mut words = [0u64; SLOT_WORDS];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut le = [0u8; 8];
        le.copy_from_slice(chunk);
        *word = u64::from_le_bytes(le);
    }
    words
}

fn unpack(words: [u64; SLOT_WORDS]) -> TelemetryReading {
    let mut bytes = [0u8; SLOT_LEN];
    for (chunk, word) in bytes.chunks_exact_mut(8).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    let mut address = [0u8; ADDRESS_LEN];
    address.copy_from_slice(&bytes[..ADDRESS_LEN]);
    let mut packet = [0u8; TELEMETRY_LEN];
    packet.copy_from_slice(&bytes[ADDRESS_LEN..]);
    TelemetryReading {
        from: PeerAddress::new(address),
        packet: TelemetryPacket::from_bytes(&packet),
    }
}

/// Receive-side entry point handed to radio adapters.
#[derive(Debug, Clone)]
pub struct RadioInbox {
    telemetry: Arc<TelemetryMailbox>,
    frames: mpsc::Sender<InboundFrame>,
}

impl RadioInbox {
    pub fn new(telemetry: Arc<TelemetryMailbox>, frames: mpsc::Sender<InboundFrame>) -> Self {
        Self { telemetry, frames }
    }

    /// Hand a received frame over without blocking.
    ///
    /// Returns `false` when the frame had to be dropped because the loop's
    /// queue is full or gone.
    pub fn receive(&self, from: PeerAddress, bytes: &[u8]) -> bool {
        if bytes.len() == TELEMETRY_LEN {
            if let Ok(Frame::Telemetry(packet)) = Frame::decode(bytes) {
                self.telemetry.deposit(TelemetryReading { from, packet });
                return true;
            }
        }
        let frame = InboundFrame {
            from,
            bytes: bytes.to_vec(),
        };
        match self.frames.try_send(frame) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(peer = %from, error = %err, "dropping inbound frame");
                false
            }
        }
    }
}
