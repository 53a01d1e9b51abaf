//! The Wi-Fi link state machine.
//!
//! A [`WifiLink`] models one Wi-Fi device. It keeps the raw scan results the
//! device reports, merges them into [`AccessPointGroup`]s, derives a public
//! [`LinkStatus`] from device state and kill switch transitions, and knows
//! which group the device is currently connected to.
//!
//! The link itself never listens to the bus. Events are fed in through the
//! `ap_*`, `device_state_changed` and `kill_switch_changed` handlers (or
//! [`WifiLink::handle_event`]), usually by a
//! [`LinkMonitor`](crate::LinkMonitor). Every round-trip to NetworkManager goes
//! through the link's [`WifiBackend`].
//!
//! # Locking
//!
//! All state sits behind a single mutex that is never held across an
//! `.await`. Methods take `&self`, so a [`connect_to`](WifiLink::connect_to)
//! can be in flight while the same link keeps processing events.

use futures::{FutureExt, future, select};
use futures_timer::Delay;
use log::{debug, info, warn};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use zvariant::OwnedObjectPath;

use crate::Result;
use crate::api::models::{
    ConnectOutcome, ConnectionError, DeviceState, KillSwitchState, LinkConfig, LinkStatus,
};
use crate::backend::{SavedProfile, WifiBackend};
use crate::monitoring::events::LinkEvent;
use crate::util::utils::{decode_ssid, is_null_path};
use crate::wifi::access_point::{AccessPoint, GroupingKey};
use crate::wifi::group::AccessPointGroup;
use crate::wifi::kill_switch::{BlockAction, block_action, idle_status};

#[derive(Debug)]
struct LinkState {
    /// Scan entry path to the key of the group holding it.
    raw: HashMap<OwnedObjectPath, GroupingKey>,
    groups: BTreeMap<GroupingKey, AccessPointGroup>,
    status: LinkStatus,
    last_device_state: DeviceState,
    kill_switch: KillSwitchState,
    /// Active connection the active group was resolved from.
    active_connection: Option<OwnedObjectPath>,
    /// Access point the active connection runs over.
    active_specific: Option<OwnedObjectPath>,
    active: Option<GroupingKey>,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            raw: HashMap::new(),
            groups: BTreeMap::new(),
            status: LinkStatus::default(),
            last_device_state: DeviceState::Unknown,
            kill_switch: KillSwitchState::default(),
            active_connection: None,
            active_specific: None,
            active: None,
        }
    }
}

/// Counts in-flight connect attempts for as long as it is alive.
struct ConnectingGuard<'a>(&'a AtomicUsize);

impl<'a> ConnectingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One Wi-Fi device with its visible networks and connection status.
///
/// # Example
///
/// ```no_run
/// use nmlink::{NmBackend, WifiLink};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> nmlink::Result<()> {
/// let link = WifiLink::new(NmBackend::system().await?);
/// link.resync().await?;
///
/// if let Some(network) = link.access_points().first() {
///     println!("connecting to {} ({:.0}%)", network.ssid(), network.strength());
///     link.connect_to(network.key(), &CancellationToken::new()).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct WifiLink<B> {
    backend: B,
    config: LinkConfig,
    state: Mutex<LinkState>,
    connecting: AtomicUsize,
    status_tx: watch::Sender<LinkStatus>,
    groups_tx: watch::Sender<Vec<AccessPointGroup>>,
    active_tx: watch::Sender<Option<GroupingKey>>,
}

impl<B: WifiBackend> WifiLink<B> {
    /// Creates an empty link with the default [`LinkConfig`].
    ///
    /// Call [`resync`](Self::resync) to load the device's current state.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, LinkConfig::default())
    }

    pub fn with_config(backend: B, config: LinkConfig) -> Self {
        Self {
            backend,
            config,
            state: Mutex::new(LinkState::default()),
            connecting: AtomicUsize::new(0),
            status_tx: watch::Sender::new(LinkStatus::default()),
            groups_tx: watch::Sender::new(Vec::new()),
            active_tx: watch::Sender::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Object path of the device.
    pub fn device_path(&self) -> &OwnedObjectPath {
        self.backend.device_path()
    }

    pub fn status(&self) -> LinkStatus {
        self.lock().status
    }

    /// Receives every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<LinkStatus> {
        self.status_tx.subscribe()
    }

    /// Visible networks, strongest first.
    pub fn access_points(&self) -> Vec<AccessPointGroup> {
        self.groups_tx.borrow().clone()
    }

    /// Receives a new snapshot of [`access_points`](Self::access_points)
    /// whenever networks appear, disappear or change strength.
    pub fn subscribe_access_points(&self) -> watch::Receiver<Vec<AccessPointGroup>> {
        self.groups_tx.subscribe()
    }

    /// Looks up one network.
    pub fn access_point(&self, key: &GroupingKey) -> Option<AccessPointGroup> {
        self.lock().groups.get(key).cloned()
    }

    /// Every scan result, ungrouped.
    pub fn raw_access_points(&self) -> Vec<AccessPoint> {
        self.lock()
            .groups
            .values()
            .flat_map(|g| g.members().iter().cloned())
            .collect()
    }

    /// The network the device is connected (or connecting) to.
    pub fn active_access_point(&self) -> Option<AccessPointGroup> {
        let state = self.lock();
        state.active.as_ref().and_then(|k| state.groups.get(k)).cloned()
    }

    pub fn subscribe_active_access_point(&self) -> watch::Receiver<Option<GroupingKey>> {
        self.active_tx.subscribe()
    }

    /// Returns `true` while a [`connect_to`](Self::connect_to) is in flight.
    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::SeqCst) > 0
    }

    /// Last device state delivered to the link.
    pub fn device_state(&self) -> DeviceState {
        self.lock().last_device_state
    }

    /// Last kill switch state delivered to the link.
    pub fn kill_switch_state(&self) -> KillSwitchState {
        self.lock().kill_switch
    }

    /// Dispatches one event to its handler.
    pub async fn handle_event(&self, event: LinkEvent) {
        match event {
            LinkEvent::AccessPointAdded(path) => self.ap_added(path).await,
            LinkEvent::AccessPointRemoved(path) => self.ap_removed(&path),
            LinkEvent::StrengthChanged { path, strength } => {
                self.ap_strength_changed(&path, strength)
            }
            LinkEvent::DeviceStateChanged {
                new_state,
                old_state,
                reason,
            } => {
                debug!("Device state {old_state} -> {new_state} (reason {reason})");
                self.device_state_changed(new_state).await
            }
            LinkEvent::KillSwitchChanged(state) => self.kill_switch_changed(state).await,
        }
    }

    /// Adds a scan result. Paths that are already known are ignored.
    ///
    /// If its properties cannot be read the access point is skipped.
    pub async fn ap_added(&self, path: OwnedObjectPath) {
        if self.lock().raw.contains_key(&path) {
            debug!("Access point {} already known", path.as_str());
            return;
        }

        let record = match self.backend.scan_record(&path).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to read access point {}, ignoring: {e}", path.as_str());
                return;
            }
        };

        let mut state = self.lock();
        // Another add for the same path may have finished while we were reading.
        if state.raw.contains_key(&path) {
            return;
        }
        self.insert(&mut state, AccessPoint::new(path, record));
        self.publish_groups(&state);
    }

    /// Removes a scan result, and its group with it if it was the last member.
    pub fn ap_removed(&self, path: &OwnedObjectPath) {
        let mut state = self.lock();
        if !state.raw.contains_key(path) {
            warn!(
                "Tried to remove access point {} that has not been added",
                path.as_str()
            );
            return;
        }
        self.remove(&mut state, path);
        self.publish_groups(&state);
    }

    /// Updates the strength of one scan result.
    pub fn ap_strength_changed(&self, path: &OwnedObjectPath, strength: u8) {
        let mut state = self.lock();
        let Some(key) = state.raw.get(path).cloned() else {
            debug!("Strength change for unknown access point {}", path.as_str());
            return;
        };

        let changed = state
            .groups
            .get_mut(&key)
            .is_some_and(|g| g.set_member_strength(path, f64::from(strength)));
        if changed {
            self.publish_groups(&state);
        }
    }

    /// Runs the state table for a new device state.
    pub async fn device_state_changed(&self, new_state: DeviceState) {
        self.lock().last_device_state = new_state;
        self.apply_device_state(new_state).await;
    }

    /// Re-runs the state table for the last device state with a new kill
    /// switch state.
    pub async fn kill_switch_changed(&self, kill_switch: KillSwitchState) {
        let last = {
            let mut state = self.lock();
            state.kill_switch = kill_switch;
            state.last_device_state
        };
        debug!("Kill switch {kill_switch}, re-applying device state {last}");
        self.apply_device_state(last).await;
    }

    async fn apply_device_state(&self, device_state: DeviceState) {
        match device_state {
            DeviceState::Disconnected | DeviceState::Deactivating if self.is_connecting() => {
                // NetworkManager drops the old connection while it sets up the new one.
                debug!("Ignoring {device_state} while connecting");
            }
            DeviceState::Prepare
            | DeviceState::Config
            | DeviceState::NeedAuth
            | DeviceState::IpConfig
            | DeviceState::IpCheck => {
                // The path is "/" in some of these states even with a connection underway.
                match self.backend.active_connection().await {
                    Ok(path) if !is_null_path(&path) => self.resolve_active(&path).await,
                    Ok(_) => {}
                    Err(e) => warn!("Failed to read active connection: {e}"),
                }
                self.set_status(LinkStatus::Connecting);
            }
            DeviceState::Secondaries => {
                self.resolve_current().await;
                self.set_status(LinkStatus::Connected);
            }
            DeviceState::Activated => {
                self.resolve_current().await;
                if self.set_status(LinkStatus::Online) {
                    self.stamp_last_connected();
                }
            }
            _ => {
                self.clear_active();
                let kill_switch = self.lock().kill_switch;
                self.set_status(idle_status(kill_switch));
            }
        }
    }

    async fn resolve_current(&self) {
        match self.backend.active_connection().await {
            Ok(path) => self.resolve_active(&path).await,
            Err(e) => {
                warn!("Failed to read active connection: {e}");
                self.clear_active();
            }
        }
    }

    /// Resolves the active group from an active connection path.
    ///
    /// `"/"` clears the active group. A path that is already resolved is not
    /// looked up again.
    pub async fn resolve_active(&self, connection: &OwnedObjectPath) {
        if is_null_path(connection) {
            self.clear_active();
            return;
        }
        if self.lock().active_connection.as_ref() == Some(connection) {
            return;
        }

        let specific = match self.backend.specific_object(connection).await {
            Ok(path) => path,
            Err(e) => {
                warn!(
                    "Failed to get active connection {}: {e}",
                    connection.as_str()
                );
                self.clear_active();
                return;
            }
        };

        let mut state = self.lock();
        let key = state
            .groups
            .iter()
            .find(|(_, g)| g.has_member(&specific))
            .map(|(k, _)| k.clone());
        if key.is_none() {
            debug!(
                "No network has access point {} (yet)",
                specific.as_str()
            );
        }

        state.active_connection = Some(connection.clone());
        state.active_specific = (!is_null_path(&specific)).then_some(specific);
        self.set_active(&mut state, key);
    }

    fn clear_active(&self) {
        let mut state = self.lock();
        state.active_connection = None;
        state.active_specific = None;
        self.set_active(&mut state, None);
    }

    fn set_active(&self, state: &mut LinkState, key: Option<GroupingKey>) {
        if state.active == key {
            return;
        }
        state.active = key.clone();
        self.active_tx.send_replace(key);
    }

    /// Returns `true` if the status changed.
    fn set_status(&self, status: LinkStatus) -> bool {
        let mut state = self.lock();
        if state.status == status {
            return false;
        }
        info!("Wi-Fi link {}: {} -> {status}", self.device_path().as_str(), state.status);
        state.status = status;
        self.status_tx.send_replace(status);
        true
    }

    /// Marks the access point the link is online through as just connected.
    fn stamp_last_connected(&self) {
        let mut state = self.lock();
        let (Some(specific), Some(key)) = (state.active_specific.clone(), state.active.clone())
        else {
            return;
        };
        if let Some(group) = state.groups.get_mut(&key) {
            group.set_member_last_connected(&specific, SystemTime::now());
            self.publish_groups(&state);
        }
    }

    fn insert(&self, state: &mut LinkState, ap: AccessPoint) {
        let key = ap.key();
        let path = ap.path().clone();
        debug!("Adding access point {} '{}'", path.as_str(), ap.ssid());

        state.raw.insert(path.clone(), key.clone());
        match state.groups.entry(key.clone()) {
            Entry::Occupied(mut group) => group.get_mut().add(ap),
            Entry::Vacant(slot) => {
                slot.insert(AccessPointGroup::new(ap));
            }
        }

        // The active connection was resolved before its access point showed up.
        if state.active.is_none() && state.active_specific.as_ref() == Some(&path) {
            self.set_active(state, Some(key));
        }
    }

    fn remove(&self, state: &mut LinkState, path: &OwnedObjectPath) {
        let Some(key) = state.raw.remove(path) else {
            return;
        };
        debug!("Removing access point {}", path.as_str());

        let emptied = match state.groups.get_mut(&key) {
            Some(group) => {
                group.remove(path);
                group.is_empty()
            }
            None => false,
        };
        if emptied {
            state.groups.remove(&key);
            if state.active.as_ref() == Some(&key) {
                self.set_active(state, None);
            }
        }
    }

    fn publish_groups(&self, state: &LinkState) {
        let mut snapshot: Vec<AccessPointGroup> = state.groups.values().cloned().collect();
        snapshot.sort_by(|a, b| {
            b.strength()
                .total_cmp(&a.strength())
                .then_with(|| a.ssid().cmp(b.ssid()))
                .then_with(|| a.key().cmp(b.key()))
        });
        self.groups_tx.send_replace(snapshot);
    }

    /// Connects the device to a network.
    ///
    /// A saved profile for the network's SSID is activated if there is one;
    /// otherwise NetworkManager is asked to create and activate a profile
    /// holding nothing but the SSID. While the attempt runs, disconnect
    /// notifications from the device are ignored.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotFound` if `key` is not a visible network
    /// - `ConnectionError::Cancelled` if `cancel` fires first
    /// - `ConnectionError::Timeout` if [`LinkConfig::connect_timeout`] elapses
    /// - any transport error
    ///
    /// A failed attempt leaves status and active network untouched and, unless
    /// disabled in the config, resyncs the link.
    pub async fn connect_to(
        &self,
        key: &GroupingKey,
        cancel: &CancellationToken,
    ) -> Result<ConnectOutcome> {
        let (ssid, specific) = {
            let state = self.lock();
            let group = state.groups.get(key).ok_or(ConnectionError::NotFound)?;
            let specific = group.path().cloned().ok_or(ConnectionError::NotFound)?;
            (group.raw_ssid().to_vec(), specific)
        };
        info!("Connecting to '{}'", decode_ssid(&ssid));

        let guard = ConnectingGuard::new(&self.connecting);
        let result = {
            let mut attempt = pin!(self.activate(&ssid, &specific).fuse());
            let mut cancelled = pin!(cancel.cancelled().fuse());
            let mut timeout = pin!(
                match self.config.connect_timeout {
                    Some(t) => Delay::new(t).left_future(),
                    None => future::pending::<()>().right_future(),
                }
                .fuse()
            );

            select! {
                r = attempt => r,
                _ = cancelled => Err(ConnectionError::Cancelled),
                _ = timeout => Err(ConnectionError::Timeout),
            }
        };
        drop(guard);

        match result {
            Ok(outcome) => {
                debug!("Connect to '{}' requested: {outcome:?}", decode_ssid(&ssid));
                Ok(outcome)
            }
            Err(e) => {
                warn!("Failed to connect to '{}': {e}", decode_ssid(&ssid));
                if self.config.resync_on_failure && !matches!(e, ConnectionError::Cancelled) {
                    if let Err(resync_err) = self.resync().await {
                        warn!("Resync after failed connect failed too: {resync_err}");
                    }
                }
                Err(e)
            }
        }
    }

    async fn activate(&self, ssid: &[u8], specific: &OwnedObjectPath) -> Result<ConnectOutcome> {
        let profiles = self.backend.saved_profiles().await?;

        let (active, outcome) = match pick_profile(&profiles, ssid) {
            Some(profile) => {
                debug!("Activating saved profile {}", profile.path.as_str());
                let active = self
                    .backend
                    .activate_connection(&profile.path, specific)
                    .await?;
                (active, ConnectOutcome::ActivatedSaved)
            }
            None => {
                debug!("No saved profile, creating one");
                let active = self
                    .backend
                    .add_and_activate_connection(ssid, specific)
                    .await?;
                (active, ConnectOutcome::CreatedNew)
            }
        };

        self.resolve_active(&active).await;
        Ok(outcome)
    }

    /// Turns the radio on.
    ///
    /// Lifts a soft kill switch block first, then enables wireless in
    /// NetworkManager and lets the device auto-connect again.
    ///
    /// # Errors
    ///
    /// `ConnectionError::HardBlocked` if a hardware switch keeps the radio off.
    pub async fn enable(&self) -> Result<()> {
        let kill_switch = self.backend.kill_switch_state().await?;
        if block_action(kill_switch, false)? == BlockAction::Request {
            info!("Unblocking Wi-Fi kill switch");
            self.backend.set_kill_switch_blocked(false).await?;
        }
        self.backend.set_wireless_enabled(true).await?;
        self.backend.set_autoconnect(true).await
    }

    /// Turns the radio off.
    ///
    /// With a usable kill switch the radio is blocked and nothing else is
    /// touched. Without one, wireless is disabled in NetworkManager along with
    /// the device's auto-connect.
    pub async fn disable(&self) -> Result<()> {
        let kill_switch = self.backend.kill_switch_state().await?;
        if block_action(kill_switch, true)? == BlockAction::Request {
            info!("Blocking Wi-Fi kill switch");
            return self.backend.set_kill_switch_blocked(true).await;
        }
        self.backend.set_wireless_enabled(false).await?;
        self.backend.set_autoconnect(false).await
    }

    /// Reloads everything from the backend.
    ///
    /// Access points that vanished are dropped, new ones are added and known
    /// ones get their strength refreshed. Then the state table runs for the
    /// current device and kill switch state.
    pub async fn resync(&self) -> Result<()> {
        let paths = self.backend.access_point_paths().await?;
        let kill_switch = self.backend.kill_switch_state().await?;
        let device_state = self.backend.device_state().await?;

        let mut aps = Vec::with_capacity(paths.len());
        for path in paths {
            match self.backend.scan_record(&path).await {
                Ok(record) => aps.push(AccessPoint::new(path, record)),
                Err(e) => warn!("Failed to read access point {}, ignoring: {e}", path.as_str()),
            }
        }

        {
            let mut state = self.lock();
            let seen: HashSet<OwnedObjectPath> = aps.iter().map(|ap| ap.path().clone()).collect();
            let stale: Vec<OwnedObjectPath> = state
                .raw
                .keys()
                .filter(|p| !seen.contains(*p))
                .cloned()
                .collect();
            for path in &stale {
                self.remove(&mut state, path);
            }

            for ap in aps {
                let path = ap.path().clone();
                match state.raw.get(&path).cloned() {
                    Some(key) if key == ap.key() => {
                        if let Some(group) = state.groups.get_mut(&key) {
                            group.set_member_strength(&path, ap.strength());
                        }
                    }
                    Some(_) => {
                        self.remove(&mut state, &path);
                        self.insert(&mut state, ap);
                    }
                    None => self.insert(&mut state, ap),
                }
            }

            state.kill_switch = kill_switch;
            state.last_device_state = device_state;
            // Look the active connection up again instead of trusting the cache.
            state.active_connection = None;
            self.publish_groups(&state);
            debug!(
                "Resynced {} access points in {} networks",
                state.raw.len(),
                state.groups.len()
            );
        }

        self.apply_device_state(device_state).await;
        Ok(())
    }
}

/// Picks the saved profile to activate for `ssid`: the most recently used
/// one, or the first listed among equals.
fn pick_profile<'a>(profiles: &'a [SavedProfile], ssid: &[u8]) -> Option<&'a SavedProfile> {
    profiles
        .iter()
        .filter(|p| p.ssid.as_deref() == Some(ssid))
        .fold(None, |best, p| match best {
            Some(b) if b.timestamp >= p.timestamp => Some(b),
            _ => Some(p),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(n: u32, ssid: Option<&[u8]>, timestamp: Option<u64>) -> SavedProfile {
        SavedProfile {
            path: OwnedObjectPath::try_from(format!(
                "/org/freedesktop/NetworkManager/Settings/{n}"
            ))
            .unwrap(),
            ssid: ssid.map(<[u8]>::to_vec),
            timestamp,
        }
    }

    #[test]
    fn pick_profile_matches_ssid_bytes() {
        let profiles = vec![
            profile(1, None, Some(500)),
            profile(2, Some(b"Other"), Some(400)),
            profile(3, Some(b"Cafe"), Some(100)),
        ];
        let picked = pick_profile(&profiles, b"Cafe").unwrap();
        assert_eq!(picked.path.as_str(), "/org/freedesktop/NetworkManager/Settings/3");
        assert!(pick_profile(&profiles, b"Nowhere").is_none());
    }

    #[test]
    fn pick_profile_prefers_newest() {
        let profiles = vec![
            profile(1, Some(b"Cafe"), Some(100)),
            profile(2, Some(b"Cafe"), Some(300)),
            profile(3, Some(b"Cafe"), None),
            profile(4, Some(b"Cafe"), Some(300)),
        ];
        let picked = pick_profile(&profiles, b"Cafe").unwrap();
        assert_eq!(picked.path.as_str(), "/org/freedesktop/NetworkManager/Settings/2");
    }

    #[test]
    fn connecting_guard_counts() {
        let counter = AtomicUsize::new(0);
        {
            let _a = ConnectingGuard::new(&counter);
            let _b = ConnectingGuard::new(&counter);
            assert_eq!(counter.load(Ordering::SeqCst), 2);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
