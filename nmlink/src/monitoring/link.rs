//! Feeding bus signals into a [`WifiLink`].

use futures::stream::{AbortHandle, Abortable, SelectAll, StreamExt, abortable};
use futures::{FutureExt, select};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::pin::pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use zbus::Connection;
use zvariant::OwnedObjectPath;

use crate::Result;
use crate::api::models::ConnectionError;
use crate::backend::NmBackend;
use crate::monitoring::events::{EventStream, LinkEvent, link_events, strength_events};
use crate::try_log;
use crate::wifi::WifiLink;

/// Keeps a [`WifiLink`] in sync with NetworkManager.
///
/// The monitor subscribes to the device's signals, loads the current state,
/// and then hands every event to the link in the order it arrives. It also
/// follows the signal strength of each visible access point.
///
/// # Example
///
/// ```no_run
/// use nmlink::{LinkMonitor, NmBackend, WifiLink};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> nmlink::Result<()> {
/// let link = Arc::new(WifiLink::new(NmBackend::system().await?));
/// let monitor = LinkMonitor::new(link.clone());
/// let shutdown = CancellationToken::new();
///
/// tokio::spawn({
///     let shutdown = shutdown.clone();
///     async move { monitor.run(&shutdown).await }
/// });
///
/// let mut status = link.subscribe_status();
/// while status.changed().await.is_ok() {
///     println!("{}", *status.borrow());
/// }
/// # Ok(())
/// # }
/// ```
pub struct LinkMonitor {
    link: Arc<WifiLink<NmBackend>>,
}

/// Per access point strength streams, each cancellable on its own.
#[derive(Default)]
struct StrengthWatchers {
    streams: SelectAll<Abortable<EventStream>>,
    handles: HashMap<OwnedObjectPath, AbortHandle>,
}

impl StrengthWatchers {
    /// Starts watching new access points and stops watching removed ones.
    async fn sync(&mut self, conn: &Connection, link: &WifiLink<NmBackend>) {
        let current: Vec<OwnedObjectPath> = link
            .raw_access_points()
            .iter()
            .map(|ap| ap.path().clone())
            .collect();

        self.handles.retain(|path, handle| {
            let keep = current.contains(path);
            if !keep {
                handle.abort();
            }
            keep
        });

        for path in current {
            if self.handles.contains_key(&path) {
                continue;
            }
            if let Some(events) = watch_strength(conn, &path).await {
                let (events, handle) = abortable(events);
                self.streams.push(events);
                self.handles.insert(path, handle);
            }
        }
    }
}

async fn watch_strength(conn: &Connection, path: &OwnedObjectPath) -> Option<EventStream> {
    let events = try_log!(
        strength_events(conn, path).await,
        format!("Failed to follow strength of {}", path.as_str())
    );
    Some(events)
}

impl LinkMonitor {
    pub fn new(link: Arc<WifiLink<NmBackend>>) -> Self {
        Self { link }
    }

    pub fn link(&self) -> &Arc<WifiLink<NmBackend>> {
        &self.link
    }

    /// Processes events until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Fails if the initial subscription or resync fails, or with
    /// `ConnectionError::Stuck` if the bus stops delivering signals.
    pub async fn run(&self, shutdown: &CancellationToken) -> Result<()> {
        let conn = self.link.backend().connection().clone();
        let device = self.link.device_path().clone();

        // Subscribe before loading state so nothing falls in between.
        let mut events = link_events(&conn, &device).await?.fuse();
        self.link.resync().await?;

        let mut watchers = StrengthWatchers::default();
        watchers.sync(&conn, &self.link).await;
        info!(
            "Monitoring Wi-Fi device {} ({} access points)",
            device.as_str(),
            watchers.handles.len()
        );

        let mut stop = pin!(shutdown.cancelled().fuse());

        loop {
            select! {
                _ = stop => {
                    debug!("Link monitor for {} stopped", device.as_str());
                    return Ok(());
                }
                event = events.next() => match event {
                    Some(event) => {
                        let membership_changed = matches!(
                            event,
                            LinkEvent::AccessPointAdded(_) | LinkEvent::AccessPointRemoved(_)
                        );
                        self.link.handle_event(event).await;
                        if membership_changed {
                            watchers.sync(&conn, &self.link).await;
                        }
                    }
                    None => {
                        warn!("Link event stream ended unexpectedly");
                        return Err(ConnectionError::Stuck("link event stream ended".into()));
                    }
                },
                event = watchers.streams.next() => {
                    if let Some(event) = event {
                        self.link.handle_event(event).await;
                    }
                }
            }
        }
    }
}
