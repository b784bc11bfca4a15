// ── Device editor ──
//
// Create/edit form state. The draft is an independent copy: edits never
// reach the store until the server accepts them.

use chrono::NaiveTime;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::model::{Currency, Device, DeviceId, Switch};

pub const DEFAULT_TIMEZONE: &str = "Europe/Amsterdam";
pub const DEFAULT_AVAILABLE_START: &str = "09:00";
pub const DEFAULT_AVAILABLE_STOP: &str = "17:00";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Working copy of a device being created or edited.
///
/// Serializes to the request body shape (minus `id`, which goes in the
/// path).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDraft {
    #[serde(skip)]
    pub id: Option<DeviceId>,
    pub title: String,
    pub wallet: Option<String>,
    pub currency: Currency,
    pub timezone: String,
    pub available_start: String,
    pub available_stop: String,
    pub timeout: u64,
    pub maxperday: u32,
    pub closed_url: Option<String>,
    pub wait_url: Option<String>,
    pub switches: Vec<Switch>,
}

impl DeviceDraft {
    /// Blank form for a new device.
    pub fn template(default_wallet: Option<String>) -> Self {
        Self {
            id: None,
            title: String::new(),
            wallet: default_wallet,
            currency: Currency::Sat,
            timezone: DEFAULT_TIMEZONE.into(),
            available_start: DEFAULT_AVAILABLE_START.into(),
            available_stop: DEFAULT_AVAILABLE_STOP.into(),
            timeout: DEFAULT_TIMEOUT_SECS,
            maxperday: 0,
            closed_url: None,
            wait_url: None,
            switches: Vec::new(),
        }
    }

    pub fn from_device(device: &Device) -> Self {
        Self {
            id: Some(device.id.clone()),
            title: device.title.clone(),
            wallet: Some(device.wallet.clone()),
            currency: device.currency.clone(),
            timezone: device.timezone.clone(),
            available_start: device.available_start.clone(),
            available_stop: device.available_stop.clone(),
            timeout: device.timeout,
            maxperday: device.maxperday,
            closed_url: device.closed_url.clone(),
            wait_url: device.wait_url.clone(),
            switches: device.switches.clone(),
        }
    }

    pub fn is_edit(&self) -> bool {
        self.id.is_some()
    }

    /// Wallet id, if one is set and non-empty.
    pub fn wallet_id(&self) -> Option<&str> {
        self.wallet.as_deref().filter(|w| !w.is_empty())
    }

    /// Append a switch with default settings and the next `Switch N` label.
    pub fn add_switch(&mut self) -> usize {
        self.switches.push(Switch::new_at(self.switches.len() + 1));
        self.switches.len()
    }

    pub fn remove_switch(&mut self, index: usize) -> Result<Switch, CoreError> {
        if index >= self.switches.len() {
            return Err(CoreError::validation(format!(
                "no switch at position {} (device has {})",
                index + 1,
                self.switches.len()
            )));
        }
        Ok(self.switches.remove(index))
    }

    /// Checks the server would otherwise reject.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.title.trim().is_empty() {
            return Err(CoreError::validation("title is required"));
        }
        if self.wallet_id().is_none() {
            return Err(CoreError::validation("a wallet is required"));
        }
        for (field, value) in [
            ("available_start", &self.available_start),
            ("available_stop", &self.available_stop),
        ] {
            if !is_valid_hhmm(value) {
                return Err(CoreError::validation(format!(
                    "{field} must be HH:MM, got {value:?}"
                )));
            }
        }
        Ok(())
    }

    /// Request body: empty strings and nulls are dropped, `switches` is
    /// always present.
    pub fn payload(&self) -> Result<Map<String, Value>, CoreError> {
        let Value::Object(mut body) = serde_json::to_value(self)
            .map_err(|e| CoreError::Internal(format!("draft serialization failed: {e}")))?
        else {
            return Err(CoreError::Internal("draft did not serialize to an object".into()));
        };
        body.retain(|key, value| key == "switches" || !is_blank(value));
        Ok(body)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// `HH:MM` with two-digit fields naming a real wall-clock time.
pub fn is_valid_hhmm(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 5
        && bytes[2] == b':'
        && bytes[..2].iter().chain(&bytes[3..]).all(u8::is_ascii_digit)
        && NaiveTime::parse_from_str(value, "%H:%M").is_ok()
}

/// Editor dialog: open/closed plus the working copy.
#[derive(Debug, Clone, Default)]
pub struct DeviceEditor {
    draft: Option<DeviceDraft>,
}

impl DeviceEditor {
    /// Seed from `existing` (edit) or from the template (create).
    pub fn open(&mut self, existing: Option<&Device>, default_wallet: Option<String>) -> &DeviceDraft {
        let draft = match existing {
            Some(device) => DeviceDraft::from_device(device),
            None => DeviceDraft::template(default_wallet),
        };
        self.draft.insert(draft)
    }

    pub fn close(&mut self) {
        self.draft = None;
    }

    pub fn is_open(&self) -> bool {
        self.draft.is_some()
    }

    pub fn is_edit(&self) -> bool {
        self.draft.as_ref().is_some_and(DeviceDraft::is_edit)
    }

    pub fn draft(&self) -> Option<&DeviceDraft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Result<&mut DeviceDraft, CoreError> {
        self.draft
            .as_mut()
            .ok_or(CoreError::DialogClosed { dialog: "device editor" })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::SwitchId;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn template_defaults() {
        let draft = DeviceDraft::template(Some("w1".into()));
        assert!(!draft.is_edit());
        assert_eq!(draft.currency, Currency::Sat);
        assert_eq!(draft.timezone, "Europe/Amsterdam");
        assert_eq!(draft.available_start, "09:00");
        assert_eq!(draft.available_stop, "17:00");
        assert_eq!(draft.timeout, 30);
        assert_eq!(draft.maxperday, 0);
        assert_eq!(draft.wallet_id(), Some("w1"));
        assert!(draft.switches.is_empty());
    }

    #[test]
    fn add_and_remove_switches() {
        let mut draft = DeviceDraft::template(None);
        assert_eq!(draft.add_switch(), 1);
        assert_eq!(draft.add_switch(), 2);
        assert_eq!(draft.switches[1].label.as_deref(), Some("Switch 2"));

        let removed = draft.remove_switch(0).unwrap();
        assert_eq!(removed.label.as_deref(), Some("Switch 1"));
        assert_eq!(draft.switches.len(), 1);
        assert!(draft.remove_switch(5).unwrap_err().is_validation());
    }

    #[test]
    fn payload_strips_blanks_but_keeps_switches() {
        let mut draft = DeviceDraft::template(Some("w1".into()));
        draft.title = "Coffee".into();
        draft.closed_url = Some(String::new());

        let body = draft.payload().unwrap();
        assert_eq!(body["switches"], json!([]));
        assert!(!body.contains_key("closed_url"));
        assert!(!body.contains_key("wait_url"));
        assert!(!body.contains_key("id"));
        assert_eq!(body["maxperday"], json!(0));
        assert_eq!(body["currency"], json!("sat"));
        assert_eq!(body["title"], json!("Coffee"));
    }

    #[test]
    fn payload_carries_switch_identity_when_saved() {
        let mut draft = DeviceDraft::template(Some("w1".into()));
        draft.add_switch();
        draft.switches[0].id = Some(SwitchId::from("sw1"));

        let body = draft.payload().unwrap();
        assert_eq!(body["switches"][0]["id"], json!("sw1"));
        assert_eq!(body["switches"][0]["gpio_pin"], json!(21));
    }

    #[test]
    fn validate_rejects_bad_input() {
        let mut draft = DeviceDraft::template(None);
        draft.title = "Coffee".into();
        assert!(draft.validate().unwrap_err().to_string().contains("wallet"));

        draft.wallet = Some("w1".into());
        draft.available_stop = "5pm".into();
        assert!(draft.validate().unwrap_err().to_string().contains("available_stop"));

        draft.available_stop = "17:30".into();
        assert!(draft.validate().is_ok());

        draft.title = "   ".into();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn hhmm_format() {
        assert!(is_valid_hhmm("00:00"));
        assert!(is_valid_hhmm("23:59"));
        assert!(!is_valid_hhmm("9:00"));
        assert!(!is_valid_hhmm("24:00"));
        assert!(!is_valid_hhmm("12:60"));
        assert!(!is_valid_hhmm("12-30"));
        assert!(!is_valid_hhmm("１2:30"));
    }

    #[test]
    fn editor_open_edit_vs_create() {
        let mut editor = DeviceEditor::default();
        assert!(editor.draft_mut().is_err());

        editor.open(None, Some("w1".into()));
        assert!(editor.is_open());
        assert!(!editor.is_edit());

        editor.close();
        assert!(!editor.is_open());
    }
}
