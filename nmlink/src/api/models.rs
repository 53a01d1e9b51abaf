use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::Duration;
use thiserror::Error;

use crate::types::constants::{device_state, urfkill, wifi_mode};

/// NetworkManager device states.
///
/// Represents the low-level operational state of a network device as
/// reported by the `StateChanged` signal and the `State` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// State is unknown.
    Unknown,
    /// Device is not managed by NetworkManager.
    Unmanaged,
    /// Device is managed but not yet available (e.g., Wi-Fi disabled).
    Unavailable,
    /// Device is available but not connected.
    Disconnected,
    /// Device is preparing to connect.
    Prepare,
    /// Device is connecting to the network.
    Config,
    /// Device needs secrets to continue.
    NeedAuth,
    /// Device is requesting IP addresses.
    IpConfig,
    /// Device is checking IP connectivity.
    IpCheck,
    /// Device is waiting for secondary connections (e.g. a VPN).
    Secondaries,
    /// Device is fully connected and operational.
    Activated,
    /// Device is disconnecting.
    Deactivating,
    /// Device connection failed.
    Failed,
    /// Unsupported state with raw code.
    Other(u32),
}

impl From<u32> for DeviceState {
    fn from(value: u32) -> Self {
        match value {
            device_state::UNKNOWN => DeviceState::Unknown,
            device_state::UNMANAGED => DeviceState::Unmanaged,
            device_state::UNAVAILABLE => DeviceState::Unavailable,
            device_state::DISCONNECTED => DeviceState::Disconnected,
            device_state::PREPARE => DeviceState::Prepare,
            device_state::CONFIG => DeviceState::Config,
            device_state::NEED_AUTH => DeviceState::NeedAuth,
            device_state::IP_CONFIG => DeviceState::IpConfig,
            device_state::IP_CHECK => DeviceState::IpCheck,
            device_state::SECONDARIES => DeviceState::Secondaries,
            device_state::ACTIVATED => DeviceState::Activated,
            device_state::DEACTIVATING => DeviceState::Deactivating,
            device_state::FAILED => DeviceState::Failed,
            v => DeviceState::Other(v),
        }
    }
}

impl Display for DeviceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Unknown => write!(f, "Unknown"),
            DeviceState::Unmanaged => write!(f, "Unmanaged"),
            DeviceState::Unavailable => write!(f, "Unavailable"),
            DeviceState::Disconnected => write!(f, "Disconnected"),
            DeviceState::Prepare => write!(f, "Preparing"),
            DeviceState::Config => write!(f, "Configuring"),
            DeviceState::NeedAuth => write!(f, "Needs authentication"),
            DeviceState::IpConfig => write!(f, "Configuring IP"),
            DeviceState::IpCheck => write!(f, "Checking IP"),
            DeviceState::Secondaries => write!(f, "Waiting for secondaries"),
            DeviceState::Activated => write!(f, "Activated"),
            DeviceState::Deactivating => write!(f, "Deactivating"),
            DeviceState::Failed => write!(f, "Failed"),
            DeviceState::Other(v) => write!(f, "Other({v})"),
        }
    }
}

/// State of the WLAN radio kill switch as reported by URfkill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KillSwitchState {
    /// No kill switch is present (or URfkill is not running).
    #[default]
    NotAvailable,
    /// Radio is enabled.
    Unblocked,
    /// Radio is disabled in software.
    SoftBlocked,
    /// Radio is disabled by a hardware switch.
    HardBlocked,
}

impl From<i32> for KillSwitchState {
    fn from(code: i32) -> Self {
        match code {
            urfkill::STATE_UNBLOCKED => Self::Unblocked,
            urfkill::STATE_SOFT_BLOCKED => Self::SoftBlocked,
            urfkill::STATE_HARD_BLOCKED => Self::HardBlocked,
            urfkill::STATE_NOT_AVAILABLE => Self::NotAvailable,
            code => {
                log::debug!("Unknown kill switch state {code}");
                Self::NotAvailable
            }
        }
    }
}

impl KillSwitchState {
    /// Returns `true` if the radio is blocked, in software or hardware.
    pub fn is_blocked(self) -> bool {
        matches!(self, Self::SoftBlocked | Self::HardBlocked)
    }
}

impl Display for KillSwitchState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAvailable => write!(f, "not available"),
            Self::Unblocked => write!(f, "unblocked"),
            Self::SoftBlocked => write!(f, "soft blocked"),
            Self::HardBlocked => write!(f, "hard blocked"),
        }
    }
}

/// Public status of a link, derived from the device state and kill switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkStatus {
    /// The radio is switched off.
    #[default]
    Disabled,
    /// The radio is on but not connected.
    Offline,
    /// A connection is being established.
    Connecting,
    /// The link is up but not fully configured (e.g. captive portal).
    Connected,
    /// The link is up and usable.
    Online,
}

impl Display for LinkStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Offline => write!(f, "offline"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Online => write!(f, "online"),
        }
    }
}

/// Operating mode of an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WifiMode {
    /// Mode not reported.
    Unknown,
    /// Ad-hoc (IBSS) network.
    Adhoc,
    /// Infrastructure network.
    Infra,
    /// The device itself is an access point (hotspot).
    Ap,
}

impl From<u32> for WifiMode {
    fn from(code: u32) -> Self {
        match code {
            wifi_mode::ADHOC => Self::Adhoc,
            wifi_mode::INFRA => Self::Infra,
            wifi_mode::AP => Self::Ap,
            _ => Self::Unknown,
        }
    }
}

impl Display for WifiMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Adhoc => write!(f, "Adhoc"),
            Self::Infra => write!(f, "Infra"),
            Self::Ap => write!(f, "AP"),
        }
    }
}

bitflags! {
    /// Access point security flags (`NM80211ApSecurityFlags`).
    ///
    /// NetworkManager reports these twice, once for WPA and once for RSN.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
    pub struct SecurityFlags: u32 {
        const PAIR_WEP40 = 0x0001;
        const PAIR_WEP104 = 0x0002;
        const PAIR_TKIP = 0x0004;
        const PAIR_CCMP = 0x0008;
        const GROUP_WEP40 = 0x0010;
        const GROUP_WEP104 = 0x0020;
        const GROUP_TKIP = 0x0040;
        const GROUP_CCMP = 0x0080;
        const KEY_MGMT_PSK = 0x0100;
        const KEY_MGMT_802_1X = 0x0200;
        const KEY_MGMT_SAE = 0x0400;
        const KEY_MGMT_OWE = 0x0800;
        const KEY_MGMT_OWE_TM = 0x1000;
        const KEY_MGMT_EAP_SUITE_B_192 = 0x2000;
    }
}

/// Result of a successful [`WifiLink::connect_to`](crate::WifiLink::connect_to).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A saved profile with a matching SSID was activated.
    ActivatedSaved,
    /// No saved profile matched; a minimal one was created and activated.
    CreatedNew,
}

/// Tunables for a [`WifiLink`](crate::WifiLink).
///
/// # Examples
///
/// ```rust
/// use nmlink::LinkConfig;
/// use std::time::Duration;
///
/// let config = LinkConfig::new()
///     .with_connect_timeout(Duration::from_secs(45))
///     .with_resync_on_failure(false);
/// assert_eq!(config.connect_timeout, Some(Duration::from_secs(45)));
/// ```
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Upper bound for the D-Bus round-trips of a connect attempt.
    pub connect_timeout: Option<Duration>,
    /// Re-read all link state from the backend after a failed connect attempt.
    pub resync_on_failure: bool,
}

impl Default for LinkConfig {
    /// Defaults:
    /// - `connect_timeout`: 30 seconds
    /// - `resync_on_failure`: `true`
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(30)),
            resync_on_failure: true,
        }
    }
}

impl LinkConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Disables the connect timeout.
    pub fn without_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    /// Sets whether a failed connect attempt triggers a resync.
    pub fn with_resync_on_failure(mut self, resync: bool) -> Self {
        self.resync_on_failure = resync;
        self
    }
}

/// Errors that can occur during link operations.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// A D-Bus communication error occurred.
    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),

    /// A D-Bus call failed, with context about what was being done.
    #[error("{context}: {source}")]
    DbusOperation {
        /// What the call was for.
        context: String,
        /// Underlying error.
        #[source]
        source: zbus::Error,
    },

    /// A value could not be converted to or from its D-Bus representation.
    #[error("D-Bus value error: {0}")]
    Variant(#[from] zvariant::Error),

    /// The requested network is not part of the link's access points.
    #[error("network not found")]
    NotFound,

    /// The connect attempt did not finish in time.
    #[error("connection timeout")]
    Timeout,

    /// The connect attempt was cancelled by the caller.
    #[error("connection attempt cancelled")]
    Cancelled,

    /// The radio is disabled by a hardware switch and cannot be enabled.
    #[error("Wi-Fi is hard blocked")]
    HardBlocked,

    /// URfkill refused to change the kill switch.
    #[error("failed to {0} kill switch")]
    KillSwitchFailed(&'static str),

    /// No Wi-Fi device was found on the system.
    #[error("no Wi-Fi device found")]
    NoWifiDevice,

    /// An event stream ended.
    #[error("monitoring stuck: {0}")]
    Stuck(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_state_from_u32_all_variants() {
        assert_eq!(DeviceState::from(0), DeviceState::Unknown);
        assert_eq!(DeviceState::from(10), DeviceState::Unmanaged);
        assert_eq!(DeviceState::from(20), DeviceState::Unavailable);
        assert_eq!(DeviceState::from(30), DeviceState::Disconnected);
        assert_eq!(DeviceState::from(40), DeviceState::Prepare);
        assert_eq!(DeviceState::from(50), DeviceState::Config);
        assert_eq!(DeviceState::from(60), DeviceState::NeedAuth);
        assert_eq!(DeviceState::from(70), DeviceState::IpConfig);
        assert_eq!(DeviceState::from(80), DeviceState::IpCheck);
        assert_eq!(DeviceState::from(90), DeviceState::Secondaries);
        assert_eq!(DeviceState::from(100), DeviceState::Activated);
        assert_eq!(DeviceState::from(110), DeviceState::Deactivating);
        assert_eq!(DeviceState::from(120), DeviceState::Failed);
        assert_eq!(DeviceState::from(7), DeviceState::Other(7));
    }

    #[test]
    fn device_state_display() {
        assert_eq!(format!("{}", DeviceState::Prepare), "Preparing");
        assert_eq!(format!("{}", DeviceState::Activated), "Activated");
        assert_eq!(format!("{}", DeviceState::Other(99)), "Other(99)");
    }

    #[test]
    fn kill_switch_state_from_i32() {
        assert_eq!(KillSwitchState::from(-1), KillSwitchState::NotAvailable);
        assert_eq!(KillSwitchState::from(0), KillSwitchState::Unblocked);
        assert_eq!(KillSwitchState::from(1), KillSwitchState::SoftBlocked);
        assert_eq!(KillSwitchState::from(2), KillSwitchState::HardBlocked);
        // out of range codes are treated as missing
        assert_eq!(KillSwitchState::from(3), KillSwitchState::NotAvailable);
        assert_eq!(KillSwitchState::from(-7), KillSwitchState::NotAvailable);
    }

    #[test]
    fn kill_switch_blocked() {
        assert!(KillSwitchState::SoftBlocked.is_blocked());
        assert!(KillSwitchState::HardBlocked.is_blocked());
        assert!(!KillSwitchState::Unblocked.is_blocked());
        assert!(!KillSwitchState::NotAvailable.is_blocked());
    }

    #[test]
    fn wifi_mode_from_u32() {
        assert_eq!(WifiMode::from(0), WifiMode::Unknown);
        assert_eq!(WifiMode::from(1), WifiMode::Adhoc);
        assert_eq!(WifiMode::from(2), WifiMode::Infra);
        assert_eq!(WifiMode::from(3), WifiMode::Ap);
        assert_eq!(WifiMode::from(42), WifiMode::Unknown);
    }

    #[test]
    fn security_flags_keep_unknown_bits() {
        let flags = SecurityFlags::from_bits_retain(0x0100 | 0x8000);
        assert!(flags.contains(SecurityFlags::KEY_MGMT_PSK));
        assert_eq!(flags.bits(), 0x8100);
    }

    #[test]
    fn link_config_builder() {
        let config = LinkConfig::new();
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(30)));
        assert!(config.resync_on_failure);

        let config = LinkConfig::new()
            .without_connect_timeout()
            .with_resync_on_failure(false);
        assert_eq!(config.connect_timeout, None);
        assert!(!config.resync_on_failure);
    }

    #[test]
    fn connection_error_display() {
        assert_eq!(format!("{}", ConnectionError::NotFound), "network not found");
        assert_eq!(
            format!("{}", ConnectionError::Cancelled),
            "connection attempt cancelled"
        );
        assert_eq!(
            format!("{}", ConnectionError::KillSwitchFailed("unblock")),
            "failed to unblock kill switch"
        );
        assert_eq!(
            format!("{}", ConnectionError::Stuck("events".into())),
            "monitoring stuck: events"
        );
    }
}
