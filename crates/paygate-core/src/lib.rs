//! Reactive data layer between `paygate-api` and console front ends.
//!
//! - **[`Console`]**: central facade. [`start()`](Console::start) loads the
//!   device list and begins connectivity polling; dialog operations
//!   (editor, payment QR, channel URL, delete confirmation) run through it.
//!
//! - **[`DeviceStore`]**: ordered device mirror that publishes snapshots on a
//!   `tokio::sync::watch` channel. Subscribers get a [`DeviceStream`].
//!
//! - **[`ConnectionTracker`]**: owns at most one real-time payment channel
//!   and hints the [`StatusPoller`] after each payment.
//!
//! - **[`stats`]**: pure filter/totals derivation over a store snapshot.

pub mod config;
pub mod console;
pub mod convert;
pub mod dialog;
pub mod error;
pub mod model;
pub mod notice;
pub mod poller;
pub mod stats;
pub mod store;
pub mod stream;
pub mod tracker;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ConsoleConfig, TlsVerification, WalletCredentials};
pub use console::Console;
pub use dialog::{ChannelInfoDialog, DeleteDialog, DeviceDraft, PaymentView};
pub use error::CoreError;
pub use notice::{Notice, NoticeLevel};
pub use poller::StatusPoller;
pub use stats::{
    Connectivity, ConnectivitySource, DeviceView, LinkStatus, Totals, ViewQuery, WalletFilter,
    WalletSummary,
};
pub use store::DeviceStore;
pub use stream::{DeviceSnapshot, DeviceStream};
pub use tracker::{
    ChannelConnector, ChannelState, ChannelStatus, ConnectionTracker, TrackerEvent, WsConnector,
};

pub use model::{Currency, Device, DeviceId, Switch, SwitchId};
