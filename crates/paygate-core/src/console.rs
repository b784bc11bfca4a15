// ── Console facade ──
//
// Owns the device store, the connection tracker, the status poller, the
// dialog state and the API client. Front ends (CLI, future UIs) drive the
// console through this type only.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use paygate_api::{ApiClient, TlsMode, TransportConfig};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConsoleConfig, TlsVerification};
use crate::dialog::{
    ChannelInfoDialog, DEFAULT_TIMEZONE, DeleteDialog, DeviceDraft, DeviceEditor, PaymentView,
    QrDialog,
};
use crate::error::CoreError;
use crate::model::{Currency, Device, DeviceId, Switch, SwitchId};
use crate::notice::Notice;
use crate::poller::StatusPoller;
use crate::stats::{self, Connectivity, DeviceView, ViewQuery, WalletSummary};
use crate::store::DeviceStore;
use crate::stream::DeviceStream;
use crate::tracker::{
    ChannelConnector, ChannelStatus, ConnectionTracker, TrackerEvent, WsConnector, status_text,
};

const NOTICE_CHANNEL_SIZE: usize = 64;

#[derive(Default)]
struct Dialogs {
    editor: DeviceEditor,
    qr: Option<QrDialog>,
    channel_info: Option<ChannelInfoDialog>,
    delete: Option<DeleteDialog>,
}

/// The main entry point for front ends.
///
/// Cheaply cloneable via `Arc<ConsoleInner>`. Call [`start`](Self::start)
/// to load devices and begin connectivity polling, and
/// [`shutdown`](Self::shutdown) to stop everything.
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

struct ConsoleInner {
    config: ConsoleConfig,
    client: ApiClient,
    store: Arc<DeviceStore>,
    server_confirmed: watch::Sender<Arc<BTreeSet<DeviceId>>>,
    tracker: ConnectionTracker,
    poller: StatusPoller,
    dialogs: Mutex<Dialogs>,
    notices: broadcast::Sender<Notice>,
    cancel: CancellationToken,
}

impl Console {
    /// Build a console that dials real channels (when enabled in `config`).
    /// Does not touch the network.
    pub fn new(config: ConsoleConfig) -> Result<Self, CoreError> {
        let client = ApiClient::new(config.url.clone(), &build_transport(&config))?;
        let connector: Option<Arc<dyn ChannelConnector>> = if config.channel_enabled {
            Some(Arc::new(WsConnector::new(client.clone())))
        } else {
            None
        };
        Ok(Self::with_parts(config, client, connector))
    }

    /// Build a console around an existing client and channel connector.
    pub fn with_parts(
        config: ConsoleConfig,
        client: ApiClient,
        connector: Option<Arc<dyn ChannelConnector>>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let poller = StatusPoller::new(config.status_poll_interval, Arc::default());
        let tracker = ConnectionTracker::new(
            connector,
            poller.hint(),
            config.payment_refresh_delay,
            cancel.child_token(),
        );
        let (server_confirmed, _) = watch::channel(Arc::new(BTreeSet::new()));
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);

        Self {
            inner: Arc::new(ConsoleInner {
                config,
                client,
                store: Arc::new(DeviceStore::new()),
                server_confirmed,
                tracker,
                poller,
                dialogs: Mutex::new(Dialogs::default()),
                notices,
                cancel,
            }),
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.inner.store
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.inner.tracker
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Load devices, then start the connectivity poller (first poll
    /// immediately). Calling it again reloads devices; the poller is only
    /// started once.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.reload_devices().await?;

        let console = self.clone();
        let started = self.inner.poller.start(&self.inner.cancel, move || {
            let console = console.clone();
            async move { console.poll_connectivity().await }
        });
        if started {
            info!(
                period_secs = self.inner.poller.period().as_secs(),
                "console started"
            );
        }
        Ok(())
    }

    /// Close the channel, stop polling and cancel background work.
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        self.inner.tracker.shutdown().await;
        if let Some(handle) = self.inner.poller.stop() {
            let _ = handle.await;
        }
        self.inner.cancel.cancel();
        *self.dialogs() = Dialogs::default();
        debug!("console shut down");
    }

    // ── Data refresh ─────────────────────────────────────────────

    /// Replace the store with the server's device list.
    pub async fn reload_devices(&self) -> Result<usize, CoreError> {
        let result = self.reload_devices_inner().await;
        self.report(result)
    }

    async fn reload_devices_inner(&self) -> Result<usize, CoreError> {
        let key = self.inner.config.read_key()?;
        let devices: Vec<Device> = self
            .inner
            .client
            .list_devices(key)
            .await?
            .into_iter()
            .map(Device::from)
            .collect();
        let count = devices.len();
        self.inner.store.load(devices);
        info!(devices = count, "device list loaded");
        Ok(count)
    }

    /// Fetch one device and upsert it.
    pub async fn fetch_device(&self, id: &DeviceId) -> Result<Arc<Device>, CoreError> {
        let key = self.inner.config.read_key()?;
        let device = Device::from(self.inner.client.get_device(key, id.as_str()).await?);
        self.inner.store.upsert(device);
        self.require_device(id)
    }

    /// Replace the server-confirmed connectivity set.
    pub async fn refresh_connectivity(&self) -> Result<usize, CoreError> {
        let key = self.inner.config.read_key()?;
        let status = self.inner.client.connection_status(key).await?;
        let connected: BTreeSet<DeviceId> =
            status.connected.into_iter().map(DeviceId::from).collect();
        let count = connected.len();
        debug!(connected = count, "connectivity refreshed");
        self.inner.server_confirmed.send_replace(Arc::new(connected));
        Ok(count)
    }

    /// Background variant: failures keep the previous set.
    async fn poll_connectivity(&self) {
        if let Err(e) = self.refresh_connectivity().await {
            warn!(error = %e, "connectivity poll failed");
        }
    }

    // ── Derived views ────────────────────────────────────────────

    pub fn connectivity(&self) -> Connectivity {
        Connectivity {
            server_confirmed: self.inner.server_confirmed.borrow().clone(),
            session_channel: self.inner.tracker.session_device(),
        }
    }

    pub fn view(&self, query: &ViewQuery) -> DeviceView {
        stats::compute(&self.inner.store.snapshot(), query, &self.connectivity())
    }

    pub fn wallets_with_counts(&self) -> Vec<WalletSummary> {
        stats::wallet_summaries(
            &self.inner.store.snapshot(),
            self.inner
                .config
                .wallets
                .iter()
                .map(|w| (w.id.as_str(), w.display_name())),
        )
    }

    pub fn device(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.inner.store.get(id)
    }

    // ── Subscriptions ────────────────────────────────────────────

    pub fn subscribe_devices(&self) -> DeviceStream {
        self.inner.store.subscribe()
    }

    pub fn connectivity_changes(&self) -> watch::Receiver<Arc<BTreeSet<DeviceId>>> {
        self.inner.server_confirmed.subscribe()
    }

    pub fn channel_status(&self) -> watch::Receiver<ChannelStatus> {
        self.inner.tracker.subscribe_status()
    }

    pub fn channel_events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.inner.tracker.events()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    // ── Device editor ────────────────────────────────────────────

    /// Open the editor on a copy of `existing`, or on a blank template
    /// whose wallet is the first configured one.
    pub fn open_device_editor(&self, existing: Option<&DeviceId>) -> Result<DeviceDraft, CoreError> {
        let device = existing.map(|id| self.require_device(id)).transpose();
        let device = self.report(device)?;
        let default_wallet = self.inner.config.first_wallet().map(|w| w.id.clone());
        Ok(self
            .dialogs()
            .editor
            .open(device.as_deref(), default_wallet)
            .clone())
    }

    pub fn device_editor(&self) -> Option<DeviceDraft> {
        self.dialogs().editor.draft().cloned()
    }

    /// Apply `edit` to the open draft.
    pub fn edit_draft<R>(&self, edit: impl FnOnce(&mut DeviceDraft) -> R) -> Result<R, CoreError> {
        let mut dialogs = self.dialogs();
        Ok(edit(dialogs.editor.draft_mut()?))
    }

    /// Append a default switch to the draft. Returns the new switch count.
    pub fn add_switch(&self) -> Result<usize, CoreError> {
        self.edit_draft(DeviceDraft::add_switch)
    }

    pub fn remove_switch(&self, index: usize) -> Result<Switch, CoreError> {
        let result = self.edit_draft(|draft| draft.remove_switch(index)).and_then(|r| r);
        self.report(result)
    }

    pub fn close_device_editor(&self) {
        self.dialogs().editor.close();
    }

    /// Create or update from the draft, replace the store entry and close
    /// the editor. Validation failures make no remote call.
    pub async fn submit_device_editor(&self) -> Result<Arc<Device>, CoreError> {
        let result = self.submit_device_editor_inner().await;
        if let Ok(device) = &result {
            self.notify(Notice::positive(format!("Device \"{}\" saved", device.title)));
        }
        self.report(result)
    }

    async fn submit_device_editor_inner(&self) -> Result<Arc<Device>, CoreError> {
        let draft = self
            .dialogs()
            .editor
            .draft()
            .cloned()
            .ok_or(CoreError::DialogClosed {
                dialog: "device editor",
            })?;

        let wallet_id = draft
            .wallet_id()
            .ok_or_else(|| CoreError::validation("a wallet is required"))?;
        let wallet = self.inner.config.wallet(wallet_id).ok_or_else(|| {
            CoreError::validation(format!("wallet {wallet_id} is not configured"))
        })?;
        draft.validate()?;
        let key = wallet.write_key()?;
        let payload = draft.payload()?;

        let saved = match &draft.id {
            Some(id) => {
                self.inner
                    .client
                    .update_device(key, id.as_str(), &payload)
                    .await?
            }
            None => self.inner.client.create_device(key, &payload).await?,
        };

        let device = Device::from(saved);
        let id = device.id.clone();
        let is_new = self.inner.store.upsert(device);
        self.dialogs().editor.close();
        info!(device = %id, created = is_new, "device saved");
        self.require_device(&id)
    }

    // ── Payment dialog ───────────────────────────────────────────

    /// Open the payment dialog and bind the channel to the device.
    ///
    /// A device without a saved switch is rejected before any channel is
    /// touched. A channel that cannot be opened does not prevent the
    /// dialog from showing.
    pub fn open_qr_dialog(
        &self,
        device_id: &DeviceId,
        switch: Option<&SwitchId>,
    ) -> Result<PaymentView, CoreError> {
        let result = self.open_qr_dialog_inner(device_id, switch);
        self.report(result)
    }

    fn open_qr_dialog_inner(
        &self,
        device_id: &DeviceId,
        switch: Option<&SwitchId>,
    ) -> Result<PaymentView, CoreError> {
        let device = self.require_device(device_id)?;
        let dialog = QrDialog::open((*device).clone(), switch, &self.inner.client, cache_buster())?;
        let view = dialog.payment().clone();
        self.dialogs().qr = Some(dialog);

        if let Err(e) = self.inner.tracker.open(device_id) {
            let text = match e {
                CoreError::ChannelUnavailable => status_text::NOT_SUPPORTED,
                _ => status_text::CHANNEL_ERROR,
            };
            self.notify(Notice::warning(text));
        }
        Ok(view)
    }

    /// Switch the payment dialog to another saved switch of the same device.
    pub fn select_switch(&self, switch_id: &SwitchId) -> Result<PaymentView, CoreError> {
        let result = {
            let mut dialogs = self.dialogs();
            dialogs
                .qr
                .as_mut()
                .ok_or(CoreError::DialogClosed { dialog: "payment" })
                .and_then(|qr| {
                    qr.select_switch(switch_id, &self.inner.client, cache_buster())
                        .cloned()
                })
        };
        self.report(result)
    }

    pub fn qr_dialog(&self) -> Option<PaymentView> {
        self.dialogs().qr.as_ref().map(|qr| qr.payment().clone())
    }

    /// Close the payment dialog. Always closes the channel.
    pub fn close_qr_dialog(&self) {
        self.dialogs().qr = None;
        self.inner.tracker.close();
    }

    // ── Channel URL dialog ───────────────────────────────────────

    pub fn open_channel_info(&self, device_id: &DeviceId) -> Result<ChannelInfoDialog, CoreError> {
        let result = self
            .require_device(device_id)
            .and_then(|device| ChannelInfoDialog::new(&device, &self.inner.client));
        let info = self.report(result)?;
        self.dialogs().channel_info = Some(info.clone());
        Ok(info)
    }

    pub fn close_channel_info(&self) {
        self.dialogs().channel_info = None;
    }

    // ── Delete confirmation ──────────────────────────────────────

    /// Stage a device for deletion.
    pub fn delete_device(&self, device_id: &DeviceId) -> Result<DeleteDialog, CoreError> {
        let device = self.report(self.require_device(device_id))?;
        let dialog = DeleteDialog::from(device.as_ref());
        self.dialogs().delete = Some(dialog.clone());
        Ok(dialog)
    }

    pub fn pending_delete(&self) -> Option<DeleteDialog> {
        self.dialogs().delete.clone()
    }

    /// Delete the staged device on the server, then from the store. On
    /// failure the store and the staged dialog are left as they were.
    pub async fn confirm_delete_device(&self) -> Result<DeviceId, CoreError> {
        let result = self.confirm_delete_device_inner().await;
        if let Ok(id) = &result {
            self.notify(Notice::positive(format!("Device {id} deleted")));
        }
        self.report(result)
    }

    async fn confirm_delete_device_inner(&self) -> Result<DeviceId, CoreError> {
        let staged = self
            .dialogs()
            .delete
            .clone()
            .ok_or(CoreError::DialogClosed { dialog: "delete" })?;

        let key = self.inner.config.delete_key(&staged.wallet)?;

        self.inner
            .client
            .delete_device(key, staged.device_id.as_str())
            .await?;

        self.inner.store.remove(&staged.device_id);
        let showing_payment = {
            let mut dialogs = self.dialogs();
            dialogs.delete = None;
            dialogs
                .qr
                .as_ref()
                .is_some_and(|qr| *qr.device_id() == staged.device_id)
        };
        if showing_payment {
            self.close_qr_dialog();
        }
        info!(device = %staged.device_id, "device deleted");
        Ok(staged.device_id)
    }

    pub fn cancel_delete(&self) {
        self.dialogs().delete = None;
    }

    // ── Catalogs ─────────────────────────────────────────────────

    /// Timezones for the editor. Falls back to the default zone when the
    /// server list is unavailable.
    pub async fn timezones(&self) -> Vec<String> {
        match self.inner.client.list_timezones().await {
            Ok(zones) if !zones.is_empty() => zones,
            Ok(_) => vec![DEFAULT_TIMEZONE.to_owned()],
            Err(e) => {
                warn!(error = %e, "timezone list unavailable");
                vec![DEFAULT_TIMEZONE.to_owned()]
            }
        }
    }

    /// Currencies for the editor: `sat` plus the server's fiat list, or the
    /// built-in list when the server cannot be asked.
    pub async fn currencies(&self) -> Vec<Currency> {
        match self.inner.client.list_currencies().await {
            Ok(codes) => {
                let mut out = vec![Currency::Sat];
                for currency in codes.into_iter().filter(|c| !c.is_empty()).map(Currency::from) {
                    if !out.contains(&currency) {
                        out.push(currency);
                    }
                }
                out
            }
            Err(e) => {
                warn!(error = %e, "currency list unavailable");
                Currency::KNOWN.to_vec()
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn dialogs(&self) -> MutexGuard<'_, Dialogs> {
        self.inner.dialogs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_device(&self, id: &DeviceId) -> Result<Arc<Device>, CoreError> {
        self.inner
            .store
            .get(id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_string(),
            })
    }

    fn notify(&self, notice: Notice) {
        // No subscribers is fine.
        let _ = self.inner.notices.send(notice);
    }

    /// Surface an error from a user-initiated action as a notice.
    fn report<T>(&self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(e) = &result {
            let notice = if e.is_validation() {
                Notice::warning(e.to_string())
            } else {
                Notice::error(e.to_string())
            };
            self.notify(notice);
        }
        result
    }
}

/// Build a [`TransportConfig`] from the console configuration.
fn build_transport(config: &ConsoleConfig) -> TransportConfig {
    TransportConfig {
        tls: match &config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        },
        timeout: config.timeout,
    }
}

fn cache_buster() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
