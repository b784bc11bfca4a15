// Wire types for the device API.
//
// These mirror the JSON the server sends and accepts. Optional fields stay
// optional here; `paygate-core` normalizes them into domain types at the
// ingestion boundary.

use serde::{Deserialize, Serialize};

/// A switch as returned by the server.
///
/// `id` and `lnurl` are assigned server-side on create/update and are
/// `None` (or missing) on a switch that was never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSwitch {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default = "default_gpio_pin")]
    pub gpio_pin: u32,
    #[serde(default = "default_gpio_duration")]
    pub gpio_duration: u64,
    #[serde(default)]
    pub lnurl: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

fn default_gpio_pin() -> u32 {
    21
}

fn default_gpio_duration() -> u64 {
    2100
}

/// A device record as returned by `GET api/v1/device`.
///
/// The server also returns a per-device secret `key` used by hardware for
/// signing; the console never needs it, so it is captured only as part of
/// `extra` and never displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDevice {
    pub id: String,
    pub title: String,
    pub wallet: String,
    pub currency: String,
    #[serde(default)]
    pub switches: Option<Vec<ApiSwitch>>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub available_start: String,
    pub available_stop: String,
    pub timeout: u64,
    pub timezone: String,
    #[serde(default)]
    pub maxperday: Option<u32>,
    #[serde(default)]
    pub closed_url: Option<String>,
    #[serde(default)]
    pub wait_url: Option<String>,

    /// All remaining fields the server sends.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Response of `GET api/v1/ws/status`: device ids with a live hardware
/// connection on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    #[serde(default)]
    pub connected: Vec<String>,
}

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// Flatten `detail` into a single message. Validation errors arrive as
    /// an array of `{loc, msg}` objects.
    pub(crate) fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.get("msg")
                        .and_then(serde_json::Value::as_str)
                        .map_or_else(|| item.to_string(), String::from)
                })
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}
