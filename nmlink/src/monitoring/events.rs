//! Bus signals that drive a [`WifiLink`](crate::WifiLink).

use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, warn};
use zbus::Connection;
use zbus::proxy::CacheProperties;
use zvariant::OwnedObjectPath;

use crate::Result;
use crate::api::models::{DeviceState, KillSwitchState};
use crate::dbus::{NMAccessPointProxy, NMDeviceProxy, NMWirelessProxy, URfkillKillswitchProxy};

/// Something that happened to a Wi-Fi device.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The device sees a new access point.
    AccessPointAdded(OwnedObjectPath),
    /// An access point went out of range.
    AccessPointRemoved(OwnedObjectPath),
    /// An access point's signal strength changed.
    StrengthChanged {
        path: OwnedObjectPath,
        strength: u8,
    },
    /// The device moved to another state.
    DeviceStateChanged {
        new_state: DeviceState,
        old_state: DeviceState,
        reason: u32,
    },
    /// The WLAN kill switch changed.
    KillSwitchChanged(KillSwitchState),
}

/// A boxed stream of [`LinkEvent`]s.
pub type EventStream = BoxStream<'static, LinkEvent>;

/// Subscribes to the signals of one Wi-Fi device and merges them into one
/// stream, in delivery order per signal.
///
/// Covers access point additions and removals, device state changes and,
/// when URfkill is running, the WLAN kill switch. Strength changes are per
/// access point; see [`strength_events`].
pub async fn link_events(conn: &Connection, device: &OwnedObjectPath) -> Result<EventStream> {
    let wifi = NMWirelessProxy::builder(conn)
        .path(device.clone())?
        .build()
        .await?;
    let dev = NMDeviceProxy::builder(conn)
        .path(device.clone())?
        .build()
        .await?;

    let added = wifi.receive_access_point_added().await?;
    let removed = wifi.receive_access_point_removed().await?;
    let state_changes = dev.receive_device_state_changed().await?;

    let mut streams: Vec<EventStream> = vec![
        added
            .filter_map(|signal| async move {
                match signal.args() {
                    Ok(args) => Some(LinkEvent::AccessPointAdded(args.path.clone())),
                    Err(e) => {
                        warn!("Failed to parse AccessPointAdded signal: {e}");
                        None
                    }
                }
            })
            .boxed(),
        removed
            .filter_map(|signal| async move {
                match signal.args() {
                    Ok(args) => Some(LinkEvent::AccessPointRemoved(args.path.clone())),
                    Err(e) => {
                        warn!("Failed to parse AccessPointRemoved signal: {e}");
                        None
                    }
                }
            })
            .boxed(),
        state_changes
            .filter_map(|signal| async move {
                match signal.args() {
                    Ok(args) => Some(LinkEvent::DeviceStateChanged {
                        new_state: args.new_state.into(),
                        old_state: args.old_state.into(),
                        reason: args.reason,
                    }),
                    Err(e) => {
                        warn!("Failed to parse StateChanged signal args: {e}");
                        None
                    }
                }
            })
            .boxed(),
    ];

    match kill_switch_events(conn).await {
        Ok(events) => streams.push(events),
        Err(e) => warn!("Not following the URfkill kill switch: {e}"),
    }

    debug!("Subscribed to signals of device {}", device.as_str());
    Ok(stream::select_all(streams).boxed())
}

async fn kill_switch_events(conn: &Connection) -> Result<EventStream> {
    // The state is re-read on every signal, so it must not come from the cache.
    let kill_switch = URfkillKillswitchProxy::builder(conn)
        .cache_properties(CacheProperties::No)
        .build()
        .await?;
    let changes = kill_switch.receive_killswitch_state_changed().await?;

    Ok(changes
        .then(move |_| {
            let kill_switch = kill_switch.clone();
            async move {
                match kill_switch.state().await {
                    Ok(code) => KillSwitchState::from(code),
                    Err(e) => {
                        debug!("Failed to read kill switch state: {e}");
                        KillSwitchState::NotAvailable
                    }
                }
            }
        })
        .map(LinkEvent::KillSwitchChanged)
        .boxed())
}

/// Follows the `Strength` property of one access point.
pub async fn strength_events(conn: &Connection, ap: &OwnedObjectPath) -> Result<EventStream> {
    let proxy = NMAccessPointProxy::builder(conn)
        .path(ap.clone())?
        .build()
        .await?;
    let changes = proxy.receive_strength_changed().await;
    let path = ap.clone();

    Ok(changes
        .filter_map(move |change| {
            let path = path.clone();
            async move {
                match change.get().await {
                    Ok(strength) => Some(LinkEvent::StrengthChanged { path, strength }),
                    Err(e) => {
                        debug!("Failed to read strength of {}: {e}", path.as_str());
                        None
                    }
                }
            }
        })
        .boxed())
}
