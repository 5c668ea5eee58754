//! # relaysync-adapter-udp
//!
//! Radio transport over UDP — a stand-in for the short-range wireless link.
//!
//! Every datagram is `sender hardware address (6 bytes) ++ frame`. Frames for
//! a peer whose socket address is not yet known go to the configured
//! broadcast address; routes are learned from inbound datagrams.
//!
//! ## Dependency rule
//! Same as other adapters: depends on `relaysync-app` and `relaysync-domain`.

pub mod config;
pub mod error;
pub mod radio;

pub use config::UdpRadioConfig;
pub use error::UdpRadioError;
pub use radio::{UdpRadio, UdpReceiver};
