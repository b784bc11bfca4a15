// ── Connection tracker ──
//
// Owns the console's single payment channel. `open` and `close` are the
// only mutators of the slot; the reader task reports lifecycle changes back
// through `Shared`, tagged with a generation so a superseded task can never
// overwrite the state of its successor.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use paygate_api::channel::{self, ChannelEvent, ChannelRole, ChannelStream};
use paygate_api::ApiClient;
use serde::Serialize;
use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::DeviceId;

const EVENT_CHANNEL_SIZE: usize = 64;

/// Status text shown while each lifecycle step is current.
pub mod status_text {
    pub const CONNECTING: &str = "Connecting...";
    pub const CONNECTED: &str = "Connected";
    pub const PAYMENT_RECEIVED: &str = "Payment received!";
    pub const CONNECTION_ERROR: &str = "Connection error";
    pub const NOT_SUPPORTED: &str = "Real-time channel not supported";
    pub const CHANNEL_ERROR: &str = "WebSocket error";
}

// ── Connector seam ───────────────────────────────────────────────────

/// Opens the event stream for a device's channel.
///
/// The production implementation dials the server; tests substitute
/// scripted streams.
pub trait ChannelConnector: Send + Sync {
    /// Build the endpoint and return its (lazy) event stream. Errors here
    /// are construction errors: no socket has been opened.
    fn connect(
        &self,
        device_id: &DeviceId,
        cancel: CancellationToken,
    ) -> Result<ChannelStream, CoreError>;
}

/// Dials `ws(s)://<root>/api/v1/ws/{id}?type=browser`.
pub struct WsConnector {
    client: ApiClient,
}

impl WsConnector {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl ChannelConnector for WsConnector {
    fn connect(
        &self,
        device_id: &DeviceId,
        cancel: CancellationToken,
    ) -> Result<ChannelStream, CoreError> {
        let url = self
            .client
            .channel_url(device_id.as_str(), ChannelRole::Browser)?;
        Ok(channel::connect(url, cancel))
    }
}

// ── Observable state ─────────────────────────────────────────────────

/// Channel lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

/// Current channel status. `device_id` is set only while connecting or
/// open; `message` survives into `Errored` as a short reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub state: ChannelState,
    pub device_id: Option<DeviceId>,
    pub message: Option<String>,
}

/// One lifecycle transition, always tagged with the device it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    Connecting(DeviceId),
    Opened(DeviceId),
    PaymentReceived(DeviceId),
    Closed(DeviceId),
    Errored { device_id: DeviceId, message: String },
}

impl TrackerEvent {
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::Connecting(id)
            | Self::Opened(id)
            | Self::PaymentReceived(id)
            | Self::Closed(id)
            | Self::Errored { device_id: id, .. } => id,
        }
    }
}

// ── Tracker ──────────────────────────────────────────────────────────

struct ActiveChannel {
    generation: u64,
    device_id: DeviceId,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    active: Option<ActiveChannel>,
}

struct Shared {
    slot: Mutex<Slot>,
    status: watch::Sender<ChannelStatus>,
    events: broadcast::Sender<TrackerEvent>,
    refresh_hint: Arc<Notify>,
    refresh_delay: Duration,
    cancel: CancellationToken,
}

/// Single-slot manager for the console's payment channel.
pub struct ConnectionTracker {
    connector: Option<Arc<dyn ChannelConnector>>,
    shared: Arc<Shared>,
}

impl ConnectionTracker {
    /// `connector = None` means the capability is missing: every `open`
    /// fails with [`CoreError::ChannelUnavailable`].
    ///
    /// `refresh_hint` is notified `refresh_delay` after each payment signal.
    pub fn new(
        connector: Option<Arc<dyn ChannelConnector>>,
        refresh_hint: Arc<Notify>,
        refresh_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (status, _) = watch::channel(ChannelStatus::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            connector,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::default()),
                status,
                events,
                refresh_hint,
                refresh_delay,
                cancel,
            }),
        }
    }

    /// Open a channel for `device_id`, closing any existing one first.
    ///
    /// The previous device is reported `Closed` before the new one is
    /// reported `Connecting`. Must be called inside a tokio runtime.
    pub fn open(&self, device_id: &DeviceId) -> Result<(), CoreError> {
        let Some(connector) = self.connector.as_ref() else {
            warn!(device = %device_id, "real-time channel unavailable");
            return Err(CoreError::ChannelUnavailable);
        };

        let mut slot = self.shared.lock_slot();
        if let Some(previous) = slot.active.take() {
            self.shared.retire(previous);
        }

        slot.generation += 1;
        let generation = slot.generation;
        self.shared.publish(
            ChannelStatus {
                state: ChannelState::Connecting,
                device_id: Some(device_id.clone()),
                message: Some(status_text::CONNECTING.into()),
            },
            TrackerEvent::Connecting(device_id.clone()),
        );

        let cancel = self.shared.cancel.child_token();
        let stream = match connector.connect(device_id, cancel.clone()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(device = %device_id, error = %e, "could not build channel");
                self.shared.publish(
                    errored_status(status_text::CHANNEL_ERROR),
                    TrackerEvent::Errored {
                        device_id: device_id.clone(),
                        message: status_text::CHANNEL_ERROR.into(),
                    },
                );
                return Err(e);
            }
        };

        let handle = tokio::spawn(run_channel(
            Arc::clone(&self.shared),
            generation,
            device_id.clone(),
            stream,
        ));
        slot.active = Some(ActiveChannel {
            generation,
            device_id: device_id.clone(),
            cancel,
            handle: Some(handle),
        });
        debug!(device = %device_id, generation, "channel task spawned");
        Ok(())
    }

    /// Close the active channel. No-op when nothing is open.
    pub fn close(&self) {
        let mut slot = self.shared.lock_slot();
        if let Some(active) = slot.active.take() {
            self.shared.retire(active);
        }
    }

    /// Close the channel and wait for its reader task to finish.
    pub async fn shutdown(&self) {
        let handle = {
            let mut slot = self.shared.lock_slot();
            slot.active.take().and_then(|mut active| {
                let handle = active.handle.take();
                self.shared.retire(active);
                handle
            })
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Device bound to the channel while connecting or open.
    pub fn active_device(&self) -> Option<DeviceId> {
        self.shared
            .lock_slot()
            .active
            .as_ref()
            .map(|a| a.device_id.clone())
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock_slot().active.is_some()
    }

    /// Device whose channel is fully open, for session-based connectivity.
    pub fn session_device(&self) -> Option<DeviceId> {
        let status = self.shared.status.borrow();
        match status.state {
            ChannelState::Open => status.device_id.clone(),
            _ => None,
        }
    }

    pub fn status(&self) -> ChannelStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ChannelStatus> {
        self.shared.status.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_supported(&self) -> bool {
        self.connector.is_some()
    }
}

impl Shared {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, status: ChannelStatus, event: TrackerEvent) {
        self.status.send_replace(status);
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Cancel a channel that has already been taken out of the slot and
    /// report it closed. Its reader task notices the generation mismatch and
    /// exits without publishing.
    fn retire(&self, channel: ActiveChannel) {
        channel.cancel.cancel();
        info!(device = %channel.device_id, "channel closed");
        self.publish(closed_status(), TrackerEvent::Closed(channel.device_id));
    }

    /// Publish a non-terminal update if `generation` still owns the slot.
    fn update(&self, generation: u64, status: ChannelStatus, event: TrackerEvent) {
        let slot = self.lock_slot();
        if slot.active.as_ref().is_some_and(|a| a.generation == generation) {
            self.publish(status, event);
        }
    }

    /// Clear the slot and publish a terminal state if `generation` still
    /// owns it.
    fn settle(&self, generation: u64, status: ChannelStatus, event: TrackerEvent) {
        let mut slot = self.lock_slot();
        if slot.active.as_ref().is_some_and(|a| a.generation == generation) {
            slot.active = None;
            self.publish(status, event);
        }
    }

    /// Ask the status poller for an out-of-band refresh after the delay.
    fn schedule_refresh(&self) {
        let hint = Arc::clone(&self.refresh_hint);
        let delay = self.refresh_delay;
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => hint.notify_one(),
            }
        });
    }
}

fn closed_status() -> ChannelStatus {
    ChannelStatus {
        state: ChannelState::Closed,
        device_id: None,
        message: None,
    }
}

fn errored_status(message: &str) -> ChannelStatus {
    ChannelStatus {
        state: ChannelState::Errored,
        device_id: None,
        message: Some(message.into()),
    }
}

fn open_status(device_id: &DeviceId, message: &str) -> ChannelStatus {
    ChannelStatus {
        state: ChannelState::Open,
        device_id: Some(device_id.clone()),
        message: Some(message.into()),
    }
}

// ── Reader task ──────────────────────────────────────────────────────

async fn run_channel(
    shared: Arc<Shared>,
    generation: u64,
    device_id: DeviceId,
    mut stream: ChannelStream,
) {
    while let Some(event) = stream.next().await {
        match event {
            ChannelEvent::Opened => {
                info!(device = %device_id, "channel open");
                shared.update(
                    generation,
                    open_status(&device_id, status_text::CONNECTED),
                    TrackerEvent::Opened(device_id.clone()),
                );
            }
            ChannelEvent::Message(_) => {
                info!(device = %device_id, "payment received");
                shared.update(
                    generation,
                    open_status(&device_id, status_text::PAYMENT_RECEIVED),
                    TrackerEvent::PaymentReceived(device_id.clone()),
                );
                shared.schedule_refresh();
            }
            ChannelEvent::Closed { code, reason } => {
                debug!(device = %device_id, ?code, %reason, "channel ended");
                shared.settle(
                    generation,
                    closed_status(),
                    TrackerEvent::Closed(device_id.clone()),
                );
                return;
            }
            ChannelEvent::Failed(reason) => {
                warn!(device = %device_id, %reason, "channel failed");
                shared.settle(
                    generation,
                    errored_status(status_text::CONNECTION_ERROR),
                    TrackerEvent::Errored {
                        device_id: device_id.clone(),
                        message: status_text::CONNECTION_ERROR.into(),
                    },
                );
                return;
            }
        }
    }

    // Stream ended without a terminal event.
    shared.settle(generation, closed_status(), TrackerEvent::Closed(device_id));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::stream;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Connector that replays a fixed script and then stays pending until
    /// cancelled.
    struct Scripted {
        script: Vec<ChannelEvent>,
        opens: AtomicUsize,
    }

    impl Scripted {
        fn new(script: Vec<ChannelEvent>) -> Arc<Self> {
            Arc::new(Self {
                script,
                opens: AtomicUsize::new(0),
            })
        }
    }

    impl ChannelConnector for Scripted {
        fn connect(
            &self,
            _device_id: &DeviceId,
            cancel: CancellationToken,
        ) -> Result<ChannelStream, CoreError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let head = stream::iter(self.script.clone());
            let tail = stream::once(async move {
                cancel.cancelled().await;
                ChannelEvent::Closed {
                    code: None,
                    reason: "cancelled".into(),
                }
            });
            Ok(head.chain(tail).boxed())
        }
    }

    struct Broken;

    impl ChannelConnector for Broken {
        fn connect(&self, _: &DeviceId, _: CancellationToken) -> Result<ChannelStream, CoreError> {
            Err(CoreError::Config {
                message: "bad endpoint".into(),
            })
        }
    }

    fn tracker(connector: Option<Arc<dyn ChannelConnector>>) -> (ConnectionTracker, Arc<Notify>) {
        let hint = Arc::new(Notify::new());
        let t = ConnectionTracker::new(
            connector,
            Arc::clone(&hint),
            Duration::from_secs(1),
            CancellationToken::new(),
        );
        (t, hint)
    }

    async fn wait_for(rx: &mut watch::Receiver<ChannelStatus>, state: ChannelState) {
        rx.wait_for(|s| s.state == state).await.unwrap();
    }

    #[tokio::test]
    async fn open_reaches_open_state() {
        let (t, _) = tracker(Some(Scripted::new(vec![ChannelEvent::Opened])));
        let mut rx = t.subscribe_status();

        t.open(&"a".into()).unwrap();
        wait_for(&mut rx, ChannelState::Open).await;

        let status = t.status();
        assert_eq!(status.device_id, Some("a".into()));
        assert_eq!(status.message.as_deref(), Some("Connected"));
        assert_eq!(t.session_device(), Some("a".into()));
    }

    #[tokio::test]
    async fn reopening_closes_previous_before_connecting() {
        let connector = Scripted::new(vec![ChannelEvent::Opened]);
        let (t, _) = tracker(Some(connector.clone()));
        let mut events = t.events();

        t.open(&"a".into()).unwrap();
        t.open(&"b".into()).unwrap();

        let mut seen = Vec::new();
        while seen.len() < 3 {
            seen.push(events.recv().await.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                TrackerEvent::Connecting("a".into()),
                TrackerEvent::Closed("a".into()),
                TrackerEvent::Connecting("b".into()),
            ]
        );
        assert_eq!(t.active_device(), Some("b".into()));
        assert_eq!(connector.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (t, _) = tracker(Some(Scripted::new(vec![ChannelEvent::Opened])));
        t.close();
        assert_eq!(t.status().state, ChannelState::Idle);

        t.open(&"a".into()).unwrap();
        t.close();
        t.close();
        assert!(!t.is_active());
        assert_eq!(t.status().state, ChannelState::Closed);
        assert_eq!(t.status().device_id, None);
    }

    #[tokio::test]
    async fn superseded_task_does_not_publish() {
        let (t, _) = tracker(Some(Scripted::new(vec![ChannelEvent::Opened])));
        let mut events = t.events();

        t.open(&"a".into()).unwrap();
        t.close();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut seen = Vec::new();
        while let Ok(ev) = events.try_recv() {
            seen.push(ev);
        }
        assert_eq!(
            seen,
            vec![
                TrackerEvent::Connecting("a".into()),
                TrackerEvent::Closed("a".into()),
            ]
        );
    }

    #[tokio::test]
    async fn missing_capability_stays_idle() {
        let (t, _) = tracker(None);
        let err = t.open(&"a".into()).unwrap_err();
        assert!(matches!(err, CoreError::ChannelUnavailable));
        assert_eq!(t.status().state, ChannelState::Idle);
        assert!(!t.is_active());
        assert!(!t.is_supported());
    }

    #[tokio::test]
    async fn construction_error_is_errored_without_handle() {
        let (t, _) = tracker(Some(Arc::new(Broken)));
        assert!(t.open(&"a".into()).is_err());
        let status = t.status();
        assert_eq!(status.state, ChannelState::Errored);
        assert_eq!(status.message.as_deref(), Some("WebSocket error"));
        assert!(!t.is_active());
    }

    #[tokio::test]
    async fn failure_settles_errored() {
        let (t, _) = tracker(Some(Scripted::new(vec![ChannelEvent::Failed(
            "refused".into(),
        )])));
        let mut rx = t.subscribe_status();
        t.open(&"a".into()).unwrap();
        wait_for(&mut rx, ChannelState::Errored).await;
        assert_eq!(t.status().message.as_deref(), Some("Connection error"));
        assert!(!t.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn payment_schedules_refresh_hint() {
        let (t, hint) = tracker(Some(Scripted::new(vec![
            ChannelEvent::Opened,
            ChannelEvent::Message("paid".into()),
        ])));
        let mut rx = t.subscribe_status();

        t.open(&"a".into()).unwrap();
        rx.wait_for(|s| s.message.as_deref() == Some("Payment received!"))
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        tokio::time::timeout(Duration::from_secs(5), hint.notified())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(t.status().state, ChannelState::Open);
    }

    #[tokio::test]
    async fn shutdown_joins_reader() {
        let (t, _) = tracker(Some(Scripted::new(vec![ChannelEvent::Opened])));
        let mut rx = t.subscribe_status();
        t.open(&"a".into()).unwrap();
        wait_for(&mut rx, ChannelState::Open).await;

        t.shutdown().await;
        assert!(!t.is_active());
        assert_eq!(t.status().state, ChannelState::Closed);
    }
}
