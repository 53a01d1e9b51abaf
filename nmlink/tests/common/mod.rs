//! In-memory backend for driving a `WifiLink` without a bus.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use zvariant::OwnedObjectPath;

use nmlink::{
    ConnectionError, DeviceState, KillSwitchState, Result, SavedProfile, ScanRecord, WifiBackend,
};

pub const DEVICE: &str = "/org/freedesktop/NetworkManager/Devices/3";
pub const ACTIVE: &str = "/org/freedesktop/NetworkManager/ActiveConnection/1";

pub fn ap_path(n: u32) -> OwnedObjectPath {
    OwnedObjectPath::try_from(format!("/org/freedesktop/NetworkManager/AccessPoint/{n}")).unwrap()
}

pub fn profile_path(n: u32) -> OwnedObjectPath {
    OwnedObjectPath::try_from(format!("/org/freedesktop/NetworkManager/Settings/{n}")).unwrap()
}

pub fn object_path(path: &str) -> OwnedObjectPath {
    OwnedObjectPath::try_from(path).unwrap()
}

/// An open infrastructure network.
pub fn open(ssid: &str, strength: u8) -> ScanRecord {
    ScanRecord {
        ssid: ssid.as_bytes().to_vec(),
        mode: 2,
        strength,
        ..Default::default()
    }
}

/// A secured infrastructure network.
pub fn secured(ssid: &str, wpa_flags: u32, rsn_flags: u32, strength: u8) -> ScanRecord {
    ScanRecord {
        flags: 0x1,
        wpa_flags,
        rsn_flags,
        ..open(ssid, strength)
    }
}

pub fn transport_error() -> ConnectionError {
    ConnectionError::Dbus(zbus::Error::Failure("org.freedesktop.DBus.Error.NoReply".into()))
}

#[derive(Debug)]
pub struct MockState {
    pub aps: Vec<(OwnedObjectPath, ScanRecord)>,
    pub device_state: DeviceState,
    pub active_connection: OwnedObjectPath,
    pub specific_objects: HashMap<OwnedObjectPath, OwnedObjectPath>,
    pub profiles: Vec<SavedProfile>,
    pub kill_switch: KillSwitchState,
    pub fail_connect: bool,
    pub calls: Vec<String>,
}

/// Backend whose answers are set up by the test.
pub struct MockBackend {
    device: OwnedObjectPath,
    pub state: Mutex<MockState>,
    /// When set, activation calls wait for a notification before answering.
    pub gate: Option<Arc<Notify>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            device: object_path(DEVICE),
            state: Mutex::new(MockState {
                aps: Vec::new(),
                device_state: DeviceState::Disconnected,
                active_connection: object_path("/"),
                specific_objects: HashMap::new(),
                profiles: Vec::new(),
                kill_switch: KillSwitchState::Unblocked,
                fail_connect: false,
                calls: Vec::new(),
            }),
            gate: None,
        }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn with_ap(self, n: u32, record: ScanRecord) -> Self {
        self.add_ap(n, record);
        self
    }

    pub fn add_ap(&self, n: u32, record: ScanRecord) {
        self.state.lock().unwrap().aps.push((ap_path(n), record));
    }

    pub fn remove_ap(&self, n: u32) {
        let path = ap_path(n);
        self.state.lock().unwrap().aps.retain(|(p, _)| *p != path);
    }

    pub fn set_device_state(&self, device_state: DeviceState) {
        self.state.lock().unwrap().device_state = device_state;
    }

    pub fn set_kill_switch(&self, kill_switch: KillSwitchState) {
        self.state.lock().unwrap().kill_switch = kill_switch;
    }

    /// Makes `ACTIVE` the device's active connection, running over `ap`.
    pub fn set_active(&self, ap: u32) {
        let mut state = self.state.lock().unwrap();
        state.active_connection = object_path(ACTIVE);
        state
            .specific_objects
            .insert(object_path(ACTIVE), ap_path(ap));
    }

    pub fn clear_active(&self) {
        self.state.lock().unwrap().active_connection = object_path("/");
    }

    pub fn add_profile(&self, n: u32, ssid: Option<&str>, timestamp: Option<u64>) {
        self.state.lock().unwrap().profiles.push(SavedProfile {
            path: profile_path(n),
            ssid: ssid.map(|s| s.as_bytes().to_vec()),
            timestamp,
        });
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().unwrap().fail_connect = fail;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(name))
    }

    fn record_call(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }

    /// Makes `ACTIVE` run over `specific` and returns it.
    fn activated(&self, specific: &OwnedObjectPath) -> Result<OwnedObjectPath> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(transport_error());
        }
        state
            .specific_objects
            .insert(object_path(ACTIVE), specific.clone());
        Ok(object_path(ACTIVE))
    }
}

#[async_trait]
impl WifiBackend for MockBackend {
    fn device_path(&self) -> &OwnedObjectPath {
        &self.device
    }

    async fn access_point_paths(&self) -> Result<Vec<OwnedObjectPath>> {
        self.record_call("access_point_paths".into());
        let state = self.state.lock().unwrap();
        Ok(state.aps.iter().map(|(p, _)| p.clone()).collect())
    }

    async fn scan_record(&self, ap: &OwnedObjectPath) -> Result<ScanRecord> {
        let state = self.state.lock().unwrap();
        state
            .aps
            .iter()
            .find(|(p, _)| p == ap)
            .map(|(_, r)| r.clone())
            .ok_or(ConnectionError::NotFound)
    }

    async fn device_state(&self) -> Result<DeviceState> {
        Ok(self.state.lock().unwrap().device_state)
    }

    async fn active_connection(&self) -> Result<OwnedObjectPath> {
        Ok(self.state.lock().unwrap().active_connection.clone())
    }

    async fn specific_object(
        &self,
        active_connection: &OwnedObjectPath,
    ) -> Result<OwnedObjectPath> {
        self.record_call(format!("specific_object {}", active_connection.as_str()));
        let state = self.state.lock().unwrap();
        state
            .specific_objects
            .get(active_connection)
            .cloned()
            .ok_or(ConnectionError::NotFound)
    }

    async fn saved_profiles(&self) -> Result<Vec<SavedProfile>> {
        let state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(transport_error());
        }
        Ok(state.profiles.clone())
    }

    async fn activate_connection(
        &self,
        profile: &OwnedObjectPath,
        specific_object: &OwnedObjectPath,
    ) -> Result<OwnedObjectPath> {
        self.record_call(format!(
            "activate_connection {} {}",
            profile.as_str(),
            specific_object.as_str()
        ));
        self.wait_for_gate().await;
        self.activated(specific_object)
    }

    async fn add_and_activate_connection(
        &self,
        ssid: &[u8],
        specific_object: &OwnedObjectPath,
    ) -> Result<OwnedObjectPath> {
        self.record_call(format!(
            "add_and_activate_connection {} {}",
            String::from_utf8_lossy(ssid),
            specific_object.as_str()
        ));
        self.wait_for_gate().await;
        self.activated(specific_object)
    }

    async fn kill_switch_state(&self) -> Result<KillSwitchState> {
        Ok(self.state.lock().unwrap().kill_switch)
    }

    async fn set_kill_switch_blocked(&self, blocked: bool) -> Result<()> {
        self.record_call(format!("set_kill_switch_blocked {blocked}"));
        self.state.lock().unwrap().kill_switch = if blocked {
            KillSwitchState::SoftBlocked
        } else {
            KillSwitchState::Unblocked
        };
        Ok(())
    }

    async fn set_wireless_enabled(&self, enabled: bool) -> Result<()> {
        self.record_call(format!("set_wireless_enabled {enabled}"));
        Ok(())
    }

    async fn set_autoconnect(&self, enabled: bool) -> Result<()> {
        self.record_call(format!("set_autoconnect {enabled}"));
        Ok(())
    }
}
