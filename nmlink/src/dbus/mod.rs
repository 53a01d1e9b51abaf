//! D-Bus proxy interfaces for NetworkManager and URfkill.
//!
//! This module contains low-level D-Bus proxy definitions for communicating
//! with NetworkManager and URfkill over the system bus.

mod access_point;
mod active_connection;
mod device;
mod main_nm;
mod urfkill;
mod wireless;

pub(crate) use access_point::NMAccessPointProxy;
pub(crate) use active_connection::NMActiveConnectionProxy;
pub(crate) use device::NMDeviceProxy;
pub(crate) use main_nm::NMProxy;
pub(crate) use urfkill::{URfkillKillswitchProxy, URfkillProxy};
pub(crate) use wireless::NMWirelessProxy;
