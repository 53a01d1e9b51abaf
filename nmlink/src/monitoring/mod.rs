//! Real-time monitoring of a Wi-Fi device.
//!
//! This module turns NetworkManager and URfkill signals into [`LinkEvent`]s
//! and drives a [`WifiLink`](crate::WifiLink) with them.

pub mod events;
pub mod link;

pub use events::{EventStream, LinkEvent, link_events, strength_events};
pub use link::LinkMonitor;
