//! # relaysync-domain
//!
//! Pure domain model for the relaysync schedule hub.
//!
//! ## Responsibilities
//! - Foundational types: relay channels, monotonic milliseconds, wall time, errors
//! - Define **schedule rules** and **relay schedules** (time-of-day ON/OFF directives)
//! - Provide the strict **schedule JSON codec** used on the message bus
//! - Provide the fixed-layout **wire codec** used on the radio link
//! - Provide the bounded **peer registry** of remote controller nodes
//! - Define **sync events** (acceptance, rejection, timeout)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod time;

pub mod channel;
pub mod event;
pub mod json;
pub mod peer;
pub mod schedule;
pub mod wire;
