// ── Reactive device store ──
//
// Ordered device storage with push-based change notification.

mod device_store;

pub use device_store::DeviceStore;
