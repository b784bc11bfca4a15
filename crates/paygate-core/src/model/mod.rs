// ── Domain model ──
//
// Canonical representation of devices and switches. Wire types from
// `paygate-api` are normalized into these at ingestion (see `convert`).

pub mod device;
pub mod id;

pub use device::{
    Currency, DEFAULT_GPIO_DURATION_MS, DEFAULT_GPIO_PIN, DEFAULT_SWITCH_AMOUNT, Device, Switch,
};
pub use id::{DeviceId, SwitchId};
