//! [`WifiBackend`] over NetworkManager and URfkill on the system bus.

use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use zbus::Connection;
use zbus::proxy::CacheProperties;
use zvariant::{OwnedObjectPath, Value};

use crate::Result;
use crate::api::models::{ConnectionError, DeviceState, KillSwitchState};
use crate::backend::{SavedProfile, ScanRecord, WifiBackend};
use crate::dbus::{
    NMAccessPointProxy, NMActiveConnectionProxy, NMDeviceProxy, NMProxy, NMWirelessProxy,
    URfkillKillswitchProxy, URfkillProxy,
};
use crate::types::constants::{device_type, settings, urfkill};
use crate::util::utils::connection_settings_proxy;

/// Settings as returned by `Settings.Connection.GetSettings`.
type SettingsMap<'a> = HashMap<String, HashMap<String, Value<'a>>>;

/// NetworkManager-backed transport for one Wi-Fi device.
///
/// `NmBackend` is `Clone`; clones share the same D-Bus connection.
///
/// # Example
///
/// ```no_run
/// use nmlink::{NmBackend, WifiLink};
///
/// # async fn example() -> nmlink::Result<()> {
/// let backend = NmBackend::system().await?;
/// let link = WifiLink::new(backend);
/// link.resync().await?;
/// println!("{} networks", link.access_points().len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct NmBackend {
    conn: Connection,
    device: OwnedObjectPath,
}

impl NmBackend {
    /// Binds a backend to a known device path.
    pub fn new(conn: Connection, device: OwnedObjectPath) -> Self {
        Self { conn, device }
    }

    /// Connects to the system bus and binds to the first Wi-Fi device.
    pub async fn system() -> Result<Self> {
        let conn = Connection::system().await?;
        Self::first_wifi_device(conn).await
    }

    /// Binds to the first Wi-Fi device NetworkManager reports.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::NoWifiDevice` if there is none.
    pub async fn first_wifi_device(conn: Connection) -> Result<Self> {
        let nm = NMProxy::new(&conn).await?;
        let devices = nm
            .get_devices()
            .await
            .map_err(|e| ConnectionError::DbusOperation {
                context: "failed to get device paths from NetworkManager".to_string(),
                source: e,
            })?;

        for path in devices {
            let dev = NMDeviceProxy::builder(&conn)
                .path(path.clone())?
                .build()
                .await?;
            if dev.device_type().await? == device_type::WIFI {
                debug!("Using Wi-Fi device {}", path.as_str());
                return Ok(Self::new(conn, path));
            }
        }

        Err(ConnectionError::NoWifiDevice)
    }

    /// The underlying D-Bus connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Interface name of the device (e.g. "wlan0").
    pub async fn interface(&self) -> Result<String> {
        Ok(self.device().await?.interface().await?)
    }

    async fn device(&self) -> Result<NMDeviceProxy<'static>> {
        Ok(NMDeviceProxy::builder(&self.conn)
            .path(self.device.clone())?
            .build()
            .await?)
    }

    async fn read_profile(&self, path: OwnedObjectPath) -> Result<SavedProfile> {
        let proxy = connection_settings_proxy(&self.conn, path.clone()).await?;
        let msg = proxy.call_method("GetSettings", &()).await?;
        let body = msg.body();
        let all: SettingsMap<'_> = body.deserialize()?;

        Ok(SavedProfile {
            ssid: wireless_ssid(&all),
            timestamp: profile_timestamp(&all),
            path,
        })
    }
}

#[async_trait]
impl WifiBackend for NmBackend {
    fn device_path(&self) -> &OwnedObjectPath {
        &self.device
    }

    async fn access_point_paths(&self) -> Result<Vec<OwnedObjectPath>> {
        let wifi = NMWirelessProxy::builder(&self.conn)
            .path(self.device.clone())?
            .build()
            .await?;
        Ok(wifi.get_all_access_points().await?)
    }

    async fn scan_record(&self, ap: &OwnedObjectPath) -> Result<ScanRecord> {
        let proxy = NMAccessPointProxy::builder(&self.conn)
            .path(ap.clone())?
            .build()
            .await?;

        Ok(ScanRecord {
            ssid: proxy.ssid().await?,
            flags: proxy.flags().await?,
            wpa_flags: proxy.wpa_flags().await?,
            rsn_flags: proxy.rsn_flags().await?,
            mode: proxy.mode().await?,
            strength: proxy.strength().await?,
        })
    }

    async fn device_state(&self) -> Result<DeviceState> {
        Ok(self.device().await?.state().await?.into())
    }

    async fn active_connection(&self) -> Result<OwnedObjectPath> {
        Ok(self.device().await?.active_connection().await?)
    }

    async fn specific_object(
        &self,
        active_connection: &OwnedObjectPath,
    ) -> Result<OwnedObjectPath> {
        let ac = NMActiveConnectionProxy::builder(&self.conn)
            .path(active_connection.clone())?
            .build()
            .await?;
        Ok(ac.specific_object().await?)
    }

    async fn saved_profiles(&self) -> Result<Vec<SavedProfile>> {
        let paths = self.device().await?.available_connections().await?;

        let mut profiles = Vec::with_capacity(paths.len());
        for path in paths {
            match self.read_profile(path.clone()).await {
                Ok(profile) => profiles.push(profile),
                // Profiles can vanish between listing and reading them.
                Err(e) => warn!("Failed to read settings of {}: {e}", path.as_str()),
            }
        }
        Ok(profiles)
    }

    async fn activate_connection(
        &self,
        profile: &OwnedObjectPath,
        specific_object: &OwnedObjectPath,
    ) -> Result<OwnedObjectPath> {
        let nm = NMProxy::new(&self.conn).await?;
        nm.activate_connection(profile.clone(), self.device.clone(), specific_object.clone())
            .await
            .map_err(|e| ConnectionError::DbusOperation {
                context: format!("failed to activate {}", profile.as_str()),
                source: e,
            })
    }

    async fn add_and_activate_connection(
        &self,
        ssid: &[u8],
        specific_object: &OwnedObjectPath,
    ) -> Result<OwnedObjectPath> {
        let nm = NMProxy::new(&self.conn).await?;
        let (settings_path, active) = nm
            .add_and_activate_connection(
                minimal_wifi_profile(ssid),
                self.device.clone(),
                specific_object.clone(),
            )
            .await
            .map_err(|e| ConnectionError::DbusOperation {
                context: "failed to add and activate connection".to_string(),
                source: e,
            })?;
        debug!("Created profile {}", settings_path.as_str());
        Ok(active)
    }

    async fn kill_switch_state(&self) -> Result<KillSwitchState> {
        let ks = URfkillKillswitchProxy::builder(&self.conn)
            .cache_properties(CacheProperties::No)
            .build()
            .await?;
        match ks.state().await {
            Ok(code) => Ok(code.into()),
            Err(e) => {
                debug!("URfkill kill switch unavailable: {e}");
                Ok(KillSwitchState::NotAvailable)
            }
        }
    }

    async fn set_kill_switch_blocked(&self, blocked: bool) -> Result<()> {
        let urfkill_proxy = URfkillProxy::new(&self.conn).await?;
        if urfkill_proxy.block(urfkill::DEVICE_TYPE_WLAN, blocked).await? {
            Ok(())
        } else {
            Err(ConnectionError::KillSwitchFailed(if blocked {
                "block"
            } else {
                "unblock"
            }))
        }
    }

    async fn set_wireless_enabled(&self, enabled: bool) -> Result<()> {
        let nm = NMProxy::new(&self.conn).await?;
        Ok(nm.set_wireless_enabled(enabled).await?)
    }

    async fn set_autoconnect(&self, enabled: bool) -> Result<()> {
        Ok(self.device().await?.set_autoconnect(enabled).await?)
    }
}

/// Builds the smallest profile NetworkManager accepts for a Wi-Fi network.
///
/// Only the SSID is given; NetworkManager fills in the rest and asks the
/// secret agent for credentials if the network needs them.
pub(crate) fn minimal_wifi_profile(
    ssid: &[u8],
) -> HashMap<&'static str, HashMap<&'static str, Value<'static>>> {
    let wireless = HashMap::from([(settings::SSID, Value::from(ssid.to_vec()))]);
    HashMap::from([(settings::WIRELESS, wireless)])
}

/// Extracts `802-11-wireless.ssid` from a profile's settings.
fn wireless_ssid(all: &SettingsMap<'_>) -> Option<Vec<u8>> {
    match all.get(settings::WIRELESS)?.get(settings::SSID)? {
        Value::Array(arr) => Some(
            arr.iter()
                .filter_map(|v| u8::try_from(v.clone()).ok())
                .collect(),
        ),
        _ => None,
    }
}

/// Extracts `connection.timestamp` from a profile's settings.
fn profile_timestamp(all: &SettingsMap<'_>) -> Option<u64> {
    match all.get(settings::CONNECTION)?.get(settings::TIMESTAMP)? {
        Value::U64(t) => Some(*t),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(ssid: Option<&[u8]>, timestamp: Option<u64>) -> SettingsMap<'static> {
        let mut all: SettingsMap<'static> = HashMap::new();
        let mut connection = HashMap::new();
        connection.insert("id".to_string(), Value::from("Cafe"));
        if let Some(t) = timestamp {
            connection.insert(settings::TIMESTAMP.to_string(), Value::U64(t));
        }
        all.insert(settings::CONNECTION.to_string(), connection);
        if let Some(ssid) = ssid {
            let mut wireless = HashMap::new();
            wireless.insert(settings::SSID.to_string(), Value::from(ssid.to_vec()));
            all.insert(settings::WIRELESS.to_string(), wireless);
        }
        all
    }

    #[test]
    fn reads_wireless_ssid() {
        let all = settings_with(Some(b"Cafe"), None);
        assert_eq!(wireless_ssid(&all), Some(b"Cafe".to_vec()));
    }

    #[test]
    fn wired_profile_has_no_ssid() {
        let all = settings_with(None, Some(10));
        assert_eq!(wireless_ssid(&all), None);
        assert_eq!(profile_timestamp(&all), Some(10));
    }

    #[test]
    fn minimal_profile_only_carries_ssid() {
        let profile = minimal_wifi_profile(b"Cafe");
        assert_eq!(profile.len(), 1);
        let wireless = &profile[settings::WIRELESS];
        assert_eq!(wireless.len(), 1);
        assert_eq!(wireless[settings::SSID], Value::from(b"Cafe".to_vec()));
    }
}
