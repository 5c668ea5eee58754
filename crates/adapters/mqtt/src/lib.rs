//! # relaysync-adapter-mqtt
//!
//! MQTT adapter — the operator-facing message bus.
//!
//! ## Responsibilities
//! - Connect to an MQTT broker (reconnecting forever)
//! - Implement the `BusPublisher` port for schedule, ack, state and telemetry topics
//! - Subscribe to the inbound command topics on every (re)connection
//! - Forward inbound messages and connectivity changes to the control loop
//!
//! ## Dependency rule
//! Same as other adapters: depends on `relaysync-app` and `relaysync-domain`.

pub mod bus;
pub mod config;
pub mod error;

pub use bus::{MqttBus, MqttPump, connect};
pub use config::MqttConfig;
pub use error::MqttError;
