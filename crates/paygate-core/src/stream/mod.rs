// ── Device subscriptions ──
//
// Change feed over the device mirror. Every store mutation publishes a new
// snapshot; readers hold `Arc`s, so a snapshot never changes under them.

use std::sync::Arc;

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::{Device, DeviceId};

/// Ordered, immutable view of the mirrored devices.
pub type DeviceSnapshot = Arc<Vec<Arc<Device>>>;

/// A subscription to the device mirror.
pub struct DeviceStream {
    seen: DeviceSnapshot,
    receiver: watch::Receiver<DeviceSnapshot>,
}

impl DeviceStream {
    pub(crate) fn new(mut receiver: watch::Receiver<DeviceSnapshot>) -> Self {
        let seen = receiver.borrow_and_update().clone();
        Self { seen, receiver }
    }

    /// Snapshot as of subscription or the last [`changed`](Self::changed).
    pub fn seen(&self) -> &DeviceSnapshot {
        &self.seen
    }

    pub fn latest(&self) -> DeviceSnapshot {
        self.receiver.borrow().clone()
    }

    /// Look up a device in the seen snapshot.
    pub fn get(&self, id: &DeviceId) -> Option<&Arc<Device>> {
        self.seen.iter().find(|d| &d.id == id)
    }

    /// Wait for a snapshot whose contents differ from the last one seen.
    ///
    /// Republishing identical contents (a reload that changed nothing) does
    /// not wake the caller. Returns `None` once the store is dropped.
    pub async fn changed(&mut self) -> Option<DeviceSnapshot> {
        loop {
            self.receiver.changed().await.ok()?;
            let next = self.receiver.borrow_and_update().clone();
            if *next != *self.seen {
                self.seen = Arc::clone(&next);
                return Some(next);
            }
        }
    }

    /// Every published snapshot after the seen one, unfiltered.
    pub fn into_stream(self) -> impl Stream<Item = DeviceSnapshot> + Send + 'static {
        WatchStream::from_changes(self.receiver)
    }
}
