//! The Wi-Fi link model: scan results, their grouping into networks, and the
//! link state machine.

pub mod access_point;
pub mod group;
pub(crate) mod kill_switch;
pub mod link;

pub use access_point::{AccessPoint, GroupingKey};
pub use group::AccessPointGroup;
pub use link::WifiLink;
