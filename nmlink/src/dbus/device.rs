//! NetworkManager Device proxy.

use zbus::{Result, proxy};
use zvariant::OwnedObjectPath;

/// Proxy for NetworkManager device interface.
///
/// # Signals
///
/// The `StateChanged` signal is emitted whenever the device state changes.
/// Use `receive_device_state_changed()` to get a stream of state change events:
///
/// ```ignore
/// let mut stream = device_proxy.receive_device_state_changed().await?;
/// while let Some(signal) = stream.next().await {
///     let args = signal.args()?;
///     println!("New state: {}, Old state: {}, Reason: {}",
///              args.new_state, args.old_state, args.reason);
/// }
/// ```
#[proxy(
    interface = "org.freedesktop.NetworkManager.Device",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMDevice {
    /// The network interface name (e.g., "wlan0").
    #[zbus(property)]
    fn interface(&self) -> Result<String>;

    /// Device type as a numeric code (2 = Wi-Fi).
    #[zbus(property)]
    fn device_type(&self) -> Result<u32>;

    /// Current device state (100 = activated, 120 = failed).
    #[zbus(property)]
    fn state(&self) -> Result<u32>;

    /// Path of the active connection on this device ("/" if none).
    #[zbus(property)]
    fn active_connection(&self) -> Result<OwnedObjectPath>;

    /// Saved connection profiles that could be activated on this device.
    #[zbus(property)]
    fn available_connections(&self) -> Result<Vec<OwnedObjectPath>>;

    /// Whether the device may auto-activate connections.
    #[zbus(property)]
    fn autoconnect(&self) -> Result<bool>;

    /// Allow or forbid auto-activation on this device.
    #[zbus(property)]
    fn set_autoconnect(&self, value: bool) -> Result<()>;

    /// Signal emitted when device state changes.
    ///
    /// The method is named `device_state_changed` to avoid conflicts with the
    /// `state` property's change stream.
    #[zbus(signal, name = "StateChanged")]
    fn device_state_changed(&self, new_state: u32, old_state: u32, reason: u32);
}
