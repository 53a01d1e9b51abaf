//! URfkill proxies for the radio kill switch.

use zbus::{Result, proxy};

/// Proxy for the URfkill daemon.
#[proxy(
    interface = "org.freedesktop.URfkill",
    default_service = "org.freedesktop.URfkill",
    default_path = "/org/freedesktop/URfkill"
)]
pub trait URfkill {
    /// Blocks or unblocks every radio of the given device type.
    ///
    /// Returns `false` if URfkill refused.
    fn block(&self, device_type: u32, block: bool) -> Result<bool>;
}

/// Proxy for the WLAN kill switch object.
#[proxy(
    interface = "org.freedesktop.URfkill.Killswitch",
    default_service = "org.freedesktop.URfkill",
    default_path = "/org/freedesktop/URfkill/WLAN"
)]
pub trait URfkillKillswitch {
    /// Kill switch state (-1 = not available, 0 = unblocked,
    /// 1 = soft blocked, 2 = hard blocked).
    #[zbus(property)]
    fn state(&self) -> Result<i32>;

    /// Emitted whenever `State` changes.
    #[zbus(signal, name = "StateChanged")]
    fn killswitch_state_changed(&self);
}
