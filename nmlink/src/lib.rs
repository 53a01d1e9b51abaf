//! A live model of a NetworkManager Wi-Fi device.
//!
//! `nmlink` keeps track of what one Wi-Fi radio sees and what it is doing:
//!
//! - Scan results are merged into one entry per logical network
//!   ([`AccessPointGroup`]), ranked by the strongest access point
//! - A [`LinkStatus`] (`disabled`, `offline`, `connecting`, `connected`,
//!   `online`) is derived from device state and the URfkill kill switch
//! - The network the device is connected to is resolved from its active
//!   connection
//! - Networks can be connected to, and the radio switched on and off
//!
//! # Example
//!
//! ```no_run
//! use nmlink::{LinkMonitor, NmBackend, WifiLink};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> nmlink::Result<()> {
//! let link = Arc::new(WifiLink::new(NmBackend::system().await?));
//! let shutdown = CancellationToken::new();
//!
//! // Keep the link in sync with the bus
//! let monitor = LinkMonitor::new(link.clone());
//! tokio::spawn({
//!     let shutdown = shutdown.clone();
//!     async move { monitor.run(&shutdown).await }
//! });
//!
//! // List visible networks
//! let mut networks = link.subscribe_access_points();
//! networks.changed().await.ok();
//! for net in networks.borrow().iter() {
//!     println!("{} ({:.0}%)", net.ssid(), net.strength());
//! }
//!
//! // Connect to the strongest one
//! if let Some(net) = link.access_points().first() {
//!     link.connect_to(net.key(), &shutdown).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Testing without a bus
//!
//! [`WifiLink`] talks to NetworkManager only through the [`WifiBackend`]
//! trait. [`NmBackend`] implements it over zbus; tests can implement it in
//! memory and feed events into the link by hand.
//!
//! # Error Handling
//!
//! Operations with a meaningful outcome return `Result<T, ConnectionError>`.
//! Event handlers never fail: problems such as a vanished access point are
//! logged and skipped.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade for logging. To see
//! log output, add a logging implementation like `env_logger`. For example:
//!
//! ```no_run,ignore
//! env_logger::init();
//! // ...
//! ```

// Internal implementation modules
mod dbus;
mod types;
mod util;

// Public API modules
pub mod api;
pub mod backend;
pub mod monitoring;
pub mod wifi;

// Re-exported public API
pub use api::models::{
    ConnectOutcome, ConnectionError, DeviceState, KillSwitchState, LinkConfig, LinkStatus,
    SecurityFlags, WifiMode,
};
pub use backend::{NmBackend, SavedProfile, ScanRecord, WifiBackend};
pub use monitoring::{LinkEvent, LinkMonitor};
pub use wifi::{AccessPoint, AccessPointGroup, GroupingKey, WifiLink};

/// A specialized `Result` type for link operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;
