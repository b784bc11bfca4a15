// ── Device store ──
//
// Single source of truth for the mirrored device list. Entries keep the
// order the server listed them in; upserts of an existing id keep its
// position. Every mutation rebuilds the snapshot that subscribers receive.

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::watch;

use crate::model::{Device, DeviceId};
use crate::stream::DeviceStream;

/// Reactive, ordered collection of devices keyed by id.
///
/// Mutate only after a successful server response; the store never
/// speculates.
pub struct DeviceStore {
    devices: RwLock<IndexMap<DeviceId, Arc<Device>>>,
    /// Full snapshot, rebuilt on mutation for cheap subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<Device>>>>,
    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,
    last_load: watch::Sender<Option<DateTime<Utc>>>,
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (version, _) = watch::channel(0u64);
        let (last_load, _) = watch::channel(None);

        Self {
            devices: RwLock::new(IndexMap::new()),
            snapshot,
            version,
            last_load,
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Replace the whole collection. A repeated id keeps its first
    /// position and its last value.
    pub fn load(&self, devices: Vec<Device>) {
        let mut map = self.write();
        map.clear();
        for device in devices {
            map.insert(device.id.clone(), Arc::new(device));
        }
        self.publish(&map);
        drop(map);
        self.last_load.send_replace(Some(Utc::now()));
    }

    /// Insert or replace by id. Returns `true` if the id was new.
    pub fn upsert(&self, device: Device) -> bool {
        let mut map = self.write();
        let is_new = map
            .insert(device.id.clone(), Arc::new(device))
            .is_none();
        self.publish(&map);
        is_new
    }

    /// Remove by id. Returns the removed device if it existed.
    pub fn remove(&self, id: &DeviceId) -> Option<Arc<Device>> {
        let mut map = self.write();
        let removed = map.shift_remove(id);
        if removed.is_some() {
            self.publish(&map);
        }
        removed
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.snapshot.subscribe())
    }

    pub fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// When the collection was last replaced wholesale.
    pub fn last_load(&self) -> Option<DateTime<Utc>> {
        *self.last_load.borrow()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<DeviceId, Arc<Device>>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuild the snapshot from the locked map and notify subscribers.
    /// Called with the write lock held so snapshots publish in mutation order.
    fn publish(&self, map: &IndexMap<DeviceId, Arc<Device>>) {
        let values: Vec<Arc<Device>> = map.values().map(Arc::clone).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Currency, Switch};

    fn device(id: &str, title: &str) -> Device {
        Device {
            id: DeviceId::from(id),
            title: title.into(),
            wallet: "w1".into(),
            currency: Currency::Sat,
            timezone: "Europe/Amsterdam".into(),
            available_start: "09:00".into(),
            available_stop: "17:00".into(),
            timeout: 30,
            maxperday: 0,
            closed_url: None,
            wait_url: None,
            switches: vec![Switch::new_at(1)],
            timestamp: None,
        }
    }

    #[test]
    fn load_replaces_everything() {
        let store = DeviceStore::new();
        store.load(vec![device("a", "A"), device("b", "B")]);
        assert_eq!(store.len(), 2);

        store.load(vec![device("c", "C")]);
        assert_eq!(store.len(), 1);
        assert!(store.get(&"a".into()).is_none());
        assert!(store.last_load().is_some());
    }

    #[test]
    fn upsert_replaces_in_place() {
        let store = DeviceStore::new();
        store.load(vec![device("a", "A"), device("b", "B"), device("c", "C")]);

        assert!(!store.upsert(device("b", "B2")));
        let titles: Vec<_> = store.snapshot().iter().map(|d| d.title.clone()).collect();
        assert_eq!(titles, ["A", "B2", "C"]);

        assert!(store.upsert(device("d", "D")));
        assert_eq!(store.snapshot().last().unwrap().id.as_str(), "d");
    }

    #[test]
    fn upsert_leaves_other_entries_untouched() {
        let store = DeviceStore::new();
        store.load(vec![device("a", "A"), device("b", "B")]);
        let before = store.get(&"a".into()).unwrap();

        store.upsert(device("b", "B2"));
        let after = store.get(&"a".into()).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn remove_missing_does_not_publish() {
        let store = DeviceStore::new();
        store.load(vec![device("a", "A")]);
        let version = store.version();

        assert!(store.remove(&"zzz".into()).is_none());
        assert_eq!(store.version(), version);

        assert!(store.remove(&"a".into()).is_some());
        assert!(store.is_empty());
        assert_eq!(store.version(), version + 1);
    }

    #[tokio::test]
    async fn subscribers_see_each_mutation() {
        let store = DeviceStore::new();
        let mut stream = store.subscribe();
        assert!(stream.seen().is_empty());

        store.upsert(device("a", "A"));
        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(stream.latest().len(), 1);
    }

    #[tokio::test]
    async fn identical_reload_does_not_wake_subscribers() {
        use std::time::Duration;

        use futures_util::StreamExt;

        let store = DeviceStore::new();
        store.load(vec![device("a", "A")]);
        let mut stream = store.subscribe();
        let mut raw = Box::pin(store.subscribe().into_stream());

        store.load(vec![device("a", "A")]);
        assert_eq!(raw.next().await.unwrap()[0].title, "A");
        let quiet = tokio::time::timeout(Duration::from_millis(50), stream.changed()).await;
        assert!(quiet.is_err());

        store.upsert(device("a", "Renamed"));
        let snap = stream.changed().await.unwrap();
        assert_eq!(snap[0].title, "Renamed");
        assert_eq!(stream.get(&"a".into()).unwrap().title, "Renamed");
    }
}
