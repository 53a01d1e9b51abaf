//! NetworkManager Access Point proxy.

use zbus::{Result, proxy};

/// Proxy for one scan result of a wireless device.
///
/// Only the properties that identify a logical network, plus the live
/// signal strength, are declared here.
#[proxy(
    interface = "org.freedesktop.NetworkManager.AccessPoint",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMAccessPoint {
    /// SSID as raw bytes (may not be valid UTF-8).
    #[zbus(property)]
    fn ssid(&self) -> Result<Vec<u8>>;

    /// Signal strength as percentage (0-100).
    ///
    /// Use `receive_strength_changed()` to follow it.
    #[zbus(property)]
    fn strength(&self) -> Result<u8>;

    /// General capability flags (bit 0 = privacy).
    #[zbus(property)]
    fn flags(&self) -> Result<u32>;

    /// WPA security flags.
    #[zbus(property)]
    fn wpa_flags(&self) -> Result<u32>;

    /// RSN security flags.
    #[zbus(property)]
    fn rsn_flags(&self) -> Result<u32>;

    /// Wi-Fi mode (1 = adhoc, 2 = infrastructure, 3 = AP).
    #[zbus(property)]
    fn mode(&self) -> Result<u32>;
}
