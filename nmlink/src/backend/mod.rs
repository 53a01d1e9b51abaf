//! The transport a [`WifiLink`](crate::WifiLink) reads state from and sends
//! commands to.
//!
//! [`WifiBackend`] is the seam between the link model and D-Bus. The model only
//! ever talks to this trait, so it can be driven by [`NmBackend`] on a real
//! system bus or by an in-memory implementation in tests.

use async_trait::async_trait;
use zvariant::OwnedObjectPath;

use crate::api::models::{DeviceState, KillSwitchState};
use crate::Result;

pub mod nm;

pub use nm::NmBackend;

/// Raw properties of one access point, as read from the radio layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanRecord {
    /// SSID bytes; not guaranteed to be UTF-8.
    pub ssid: Vec<u8>,
    /// General capability flags.
    pub flags: u32,
    /// WPA security flags.
    pub wpa_flags: u32,
    /// RSN security flags.
    pub rsn_flags: u32,
    /// Raw Wi-Fi mode code.
    pub mode: u32,
    /// Signal strength, 0-100.
    pub strength: u8,
}

/// A saved connection profile that can be activated on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedProfile {
    /// Settings object path of the profile.
    pub path: OwnedObjectPath,
    /// SSID stored in the profile's `802-11-wireless` section, if any.
    pub ssid: Option<Vec<u8>>,
    /// Last time the profile was successfully activated (seconds since epoch).
    pub timestamp: Option<u64>,
}

/// Everything a link needs from the outside world, for one Wi-Fi device.
///
/// Every method is a single round-trip to the transport. None of them are
/// called while the link holds its internal lock.
#[async_trait]
pub trait WifiBackend: Send + Sync {
    /// Object path of the device this backend is bound to.
    fn device_path(&self) -> &OwnedObjectPath;

    /// Paths of all access points currently visible to the device.
    async fn access_point_paths(&self) -> Result<Vec<OwnedObjectPath>>;

    /// Reads the properties of one access point.
    async fn scan_record(&self, ap: &OwnedObjectPath) -> Result<ScanRecord>;

    /// Current low-level device state.
    async fn device_state(&self) -> Result<DeviceState>;

    /// Path of the device's active connection ("/" if none).
    async fn active_connection(&self) -> Result<OwnedObjectPath>;

    /// Specific object (the access point, for Wi-Fi) of an active connection.
    async fn specific_object(&self, active_connection: &OwnedObjectPath)
    -> Result<OwnedObjectPath>;

    /// Saved profiles that can be activated on the device.
    async fn saved_profiles(&self) -> Result<Vec<SavedProfile>>;

    /// Activates a saved profile against an access point.
    ///
    /// Returns the path of the new active connection.
    async fn activate_connection(
        &self,
        profile: &OwnedObjectPath,
        specific_object: &OwnedObjectPath,
    ) -> Result<OwnedObjectPath>;

    /// Creates a minimal profile for `ssid` and activates it.
    ///
    /// Returns the path of the new active connection.
    async fn add_and_activate_connection(
        &self,
        ssid: &[u8],
        specific_object: &OwnedObjectPath,
    ) -> Result<OwnedObjectPath>;

    /// Current state of the WLAN kill switch.
    async fn kill_switch_state(&self) -> Result<KillSwitchState>;

    /// Blocks or unblocks the WLAN kill switch.
    async fn set_kill_switch_blocked(&self, blocked: bool) -> Result<()>;

    /// Turns Wi-Fi on or off globally.
    async fn set_wireless_enabled(&self, enabled: bool) -> Result<()>;

    /// Allows or forbids auto-activation on the device.
    async fn set_autoconnect(&self, enabled: bool) -> Result<()>;
}
