//! A single physical scan result.

use serde::Serialize;
use std::time::SystemTime;
use zvariant::OwnedObjectPath;

use crate::api::models::{SecurityFlags, WifiMode};
use crate::backend::ScanRecord;
use crate::types::constants::ap_flags;
use crate::util::utils::decode_ssid;

/// Identifies one logical network: raw SSID, unioned security flags and mode.
///
/// Two access points with the same key are merged into one
/// [`AccessPointGroup`](crate::AccessPointGroup). The key is also the handle
/// callers use to refer to a group, e.g. in
/// [`WifiLink::connect_to`](crate::WifiLink::connect_to).
///
/// Security is compared as the union of the WPA and RSN flags rather than as
/// two separate values. Drivers are inconsistent about which of the two they
/// fill in for access points of the same network, so comparing them apart
/// would split one network into several entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupingKey {
    ssid: Vec<u8>,
    security: SecurityFlags,
    mode: WifiMode,
}

impl GroupingKey {
    /// Raw SSID bytes.
    pub fn ssid(&self) -> &[u8] {
        &self.ssid
    }

    /// Union of the WPA and RSN security flags.
    pub fn security(&self) -> SecurityFlags {
        self.security
    }

    pub fn mode(&self) -> WifiMode {
        self.mode
    }
}

/// One scan result as reported by the radio.
///
/// Identity (path, SSID, flags and mode) is fixed at construction. Only the
/// signal strength and the last-connected time change afterwards, and those
/// only through the owning [`WifiLink`](crate::WifiLink).
#[derive(Debug, Clone, Serialize)]
pub struct AccessPoint {
    path: OwnedObjectPath,
    raw_ssid: Vec<u8>,
    ssid: String,
    flags: u32,
    security: SecurityFlags,
    mode: WifiMode,
    strength: f64,
    last_connected: Option<SystemTime>,
}

impl AccessPoint {
    /// Builds an access point from its scan record. Never fails; SSID bytes
    /// that are not valid UTF-8 are decoded best-effort.
    pub fn new(path: OwnedObjectPath, record: ScanRecord) -> Self {
        let security = SecurityFlags::from_bits_retain(record.wpa_flags | record.rsn_flags);
        Self {
            ssid: decode_ssid(&record.ssid),
            raw_ssid: record.ssid,
            path,
            flags: record.flags,
            security,
            mode: WifiMode::from(record.mode),
            strength: f64::from(record.strength.min(100)),
            last_connected: None,
        }
    }

    /// Object path of the scan entry.
    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    /// SSID decoded for display.
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// SSID bytes as broadcast.
    pub fn raw_ssid(&self) -> &[u8] {
        &self.raw_ssid
    }

    /// General capability flags.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Returns `true` if the access point advertises the privacy bit.
    pub fn privacy(&self) -> bool {
        self.flags & ap_flags::PRIVACY != 0
    }

    /// Union of the WPA and RSN flags.
    pub fn security(&self) -> SecurityFlags {
        self.security
    }

    /// Returns `true` if any WPA or RSN security flag is set.
    pub fn secured(&self) -> bool {
        !self.security.is_empty()
    }

    /// Returns `true` for anything other than an infrastructure network.
    pub fn adhoc(&self) -> bool {
        self.mode != WifiMode::Infra
    }

    pub fn mode(&self) -> WifiMode {
        self.mode
    }

    /// Signal strength, 0-100.
    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn last_connected(&self) -> Option<SystemTime> {
        self.last_connected
    }

    /// The grouping key of this access point.
    pub fn key(&self) -> GroupingKey {
        GroupingKey {
            ssid: self.raw_ssid.clone(),
            security: self.security,
            mode: self.mode,
        }
    }

    /// Returns `true` if both access points belong to the same logical network.
    ///
    /// This is looser than identity: two different scan entries of one network
    /// compare as the same.
    pub fn same_network(&self, other: &AccessPoint) -> bool {
        self.raw_ssid == other.raw_ssid && self.security == other.security && self.mode == other.mode
    }

    pub(crate) fn set_strength(&mut self, strength: f64) {
        self.strength = strength.clamp(0.0, 100.0);
    }

    /// Moves the last-connected time forward. Older times are ignored.
    pub(crate) fn set_last_connected(&mut self, when: SystemTime) {
        if self.last_connected.is_none_or(|t| when > t) {
            self.last_connected = Some(when);
        }
    }
}
