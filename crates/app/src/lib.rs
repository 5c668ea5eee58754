//! # relaysync-app
//!
//! Application layer — schedule synchronisation and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RadioTransport` — best-effort frame delivery to a hardware address
//!   - `BusPublisher` — topic publications towards the operator
//!   - `KeyValueStore` — durable per-channel schedule storage
//!   - `MonotonicClock` / `WallClock` — time sources
//! - Run one **`ScheduleSyncEngine`** per relay channel (ack, retry, timeout)
//! - Bridge bus requests and radio frames through the **`CommandBridge`**
//! - Hand frames from the radio receive path to the loop (`RadioInbox`,
//!   single-slot `TelemetryMailbox`)
//! - Drive everything from one cooperative **`ControlLoop`**
//!
//! ## Dependency rule
//! Depends on `relaysync-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod bridge;
pub mod control_loop;
pub mod mailbox;
pub mod ports;
pub mod sync_engine;
pub mod topics;
