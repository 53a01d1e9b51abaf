//! Constants for NetworkManager and URfkill D-Bus interface values.
//!
//! These constants correspond to the numeric codes used by NetworkManager's
//! and URfkill's D-Bus APIs for device states, Wi-Fi modes, security flags
//! and kill switch states.

/// NetworkManager device type constants.
pub mod device_type {
    pub const WIFI: u32 = 2;
}

/// NetworkManager device state constants (`NMDeviceState`).
pub mod device_state {
    pub const UNKNOWN: u32 = 0;
    pub const UNMANAGED: u32 = 10;
    pub const UNAVAILABLE: u32 = 20;
    pub const DISCONNECTED: u32 = 30;
    pub const PREPARE: u32 = 40;
    pub const CONFIG: u32 = 50;
    pub const NEED_AUTH: u32 = 60;
    pub const IP_CONFIG: u32 = 70;
    pub const IP_CHECK: u32 = 80;
    pub const SECONDARIES: u32 = 90;
    pub const ACTIVATED: u32 = 100;
    pub const DEACTIVATING: u32 = 110;
    pub const FAILED: u32 = 120;
}

/// Wi-Fi mode constants (`NM80211Mode`).
pub mod wifi_mode {
    pub const ADHOC: u32 = 1;
    pub const INFRA: u32 = 2;
    pub const AP: u32 = 3;
}

/// Access point capability flags (`NM80211ApFlags`).
pub mod ap_flags {
    pub const PRIVACY: u32 = 0x1;
}

/// URfkill kill switch constants.
pub mod urfkill {
    /// Device type passed to `Block` for WLAN radios.
    pub const DEVICE_TYPE_WLAN: u32 = 1;

    pub const STATE_NOT_AVAILABLE: i32 = -1;
    pub const STATE_UNBLOCKED: i32 = 0;
    pub const STATE_SOFT_BLOCKED: i32 = 1;
    pub const STATE_HARD_BLOCKED: i32 = 2;
}

/// Object path NetworkManager uses for "no object".
pub const NULL_PATH: &str = "/";

/// Smallest group strength change that is published to observers.
pub const STRENGTH_EPSILON: f64 = 0.01;

/// Settings keys used when matching and creating Wi-Fi profiles.
pub mod settings {
    pub const WIRELESS: &str = "802-11-wireless";
    pub const SSID: &str = "ssid";
    pub const CONNECTION: &str = "connection";
    pub const TIMESTAMP: &str = "timestamp";
}
