// ── Status poller ──
//
// Periodic refresh of server-reported hardware connectivity. Runs one
// background task at a time; refresh hints (from the connection tracker)
// trigger an extra fetch. At most one hint is held pending, so a burst of
// payments collapses into a single extra fetch.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct PollerTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Fixed-period poller with out-of-band refresh hints.
pub struct StatusPoller {
    period: Duration,
    hint: Arc<Notify>,
    task: Mutex<Option<PollerTask>>,
}

impl StatusPoller {
    pub fn new(period: Duration, hint: Arc<Notify>) -> Self {
        Self {
            period,
            hint,
            task: Mutex::new(None),
        }
    }

    /// Handle that requests an immediate extra tick when notified.
    pub fn hint(&self) -> Arc<Notify> {
        Arc::clone(&self.hint)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start polling. The first tick runs immediately. Returns `false` (and
    /// does nothing) if already running.
    pub fn start<F, Fut>(&self, parent: &CancellationToken, tick: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return false;
        }

        let cancel = parent.child_token();
        let handle = tokio::spawn(poll_task(
            self.period,
            Arc::clone(&self.hint),
            cancel.clone(),
            tick,
        ));
        *slot = Some(PollerTask { cancel, handle });
        debug!(period_secs = self.period.as_secs(), "status poller started");
        true
    }

    /// Stop polling. Safe to call when never started or already stopped.
    /// Returns the task handle so callers can wait for it to wind down.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        let task = self.lock().take()?;
        task.cancel.cancel();
        debug!("status poller stopped");
        Some(task.handle)
    }

    pub fn is_running(&self) -> bool {
        self.lock().as_ref().is_some_and(|t| !t.handle.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, Option<PollerTask>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        if let Some(task) = self.stop() {
            task.abort();
        }
    }
}

async fn poll_task<F, Fut>(period: Duration, hint: Arc<Notify>, cancel: CancellationToken, tick: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
            () = hint.notified() => debug!("status refresh hinted"),
        }

        // A tick in flight is abandoned on cancellation.
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tick() => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_poller(period: Duration) -> (StatusPoller, Arc<AtomicUsize>) {
        (StatusPoller::new(period, Arc::new(Notify::new())), Arc::new(AtomicUsize::new(0)))
    }

    fn counter_tick(count: &Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<()> + Send + Sync + 'static {
        let count = Arc::clone(count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate_then_periodic() {
        let (poller, count) = counting_poller(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        assert!(poller.start(&cancel, counter_tick(&count)));

        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        poller.stop().unwrap().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let (poller, count) = counting_poller(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        assert!(poller.start(&cancel, counter_tick(&count)));
        assert!(!poller.start(&cancel, counter_tick(&count)));

        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(poller.is_running());
    }

    #[tokio::test]
    async fn stop_from_any_state() {
        let (poller, count) = counting_poller(Duration::from_secs(60));
        assert!(poller.stop().is_none());

        poller.start(&CancellationToken::new(), counter_tick(&count));
        poller.stop().unwrap().await.unwrap();
        assert!(!poller.is_running());
        assert!(poller.stop().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn hint_triggers_extra_tick() {
        let (poller, count) = counting_poller(Duration::from_secs(60));
        poller.start(&CancellationToken::new(), counter_tick(&count));
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        poller.hint().notify_one();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn parent_cancellation_stops_task() {
        let (poller, count) = counting_poller(Duration::from_secs(60));
        let parent = CancellationToken::new();
        poller.start(&parent, counter_tick(&count));
        parent.cancel();
        poller.stop().unwrap().await.unwrap();
        assert!(!poller.is_running());
    }
}
