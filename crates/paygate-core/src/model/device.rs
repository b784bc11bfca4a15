// ── Device domain types ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::{DeviceId, SwitchId};

/// Defaults applied to a switch added in the editor.
pub const DEFAULT_SWITCH_AMOUNT: f64 = 10.0;
pub const DEFAULT_GPIO_PIN: u32 = 21;
pub const DEFAULT_GPIO_DURATION_MS: u64 = 2100;

// ── Currency ────────────────────────────────────────────────────────

/// Pricing currency for a device's switches.
///
/// `sat` prices directly in satoshis; the fiat codes are converted by the
/// server at payment time. Codes outside the known set are kept verbatim so
/// that a server-accepted currency round-trips unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Currency {
    #[default]
    Sat,
    Eur,
    Usd,
    Gbp,
    Chf,
    Cad,
    Jpy,
    Inr,
    Zar,
    Czk,
    Other(String),
}

impl Currency {
    /// The currencies offered by the editor, in display order.
    pub const KNOWN: [Currency; 10] = [
        Currency::Sat,
        Currency::Eur,
        Currency::Usd,
        Currency::Gbp,
        Currency::Chf,
        Currency::Cad,
        Currency::Jpy,
        Currency::Inr,
        Currency::Zar,
        Currency::Czk,
    ];

    pub fn code(&self) -> &str {
        match self {
            Self::Sat => "sat",
            Self::Eur => "EUR",
            Self::Usd => "USD",
            Self::Gbp => "GBP",
            Self::Chf => "CHF",
            Self::Cad => "CAD",
            Self::Jpy => "JPY",
            Self::Inr => "INR",
            Self::Zar => "ZAR",
            Self::Czk => "CZK",
            Self::Other(code) => code,
        }
    }

    pub fn is_fiat(&self) -> bool {
        !matches!(self, Self::Sat)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_owned()))
    }
}

impl From<String> for Currency {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("sat") {
            return Self::Sat;
        }
        Self::KNOWN
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(&s))
            .unwrap_or(Self::Other(s))
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        match c {
            Currency::Other(code) => code,
            known => known.code().to_owned(),
        }
    }
}

// ── Switch ──────────────────────────────────────────────────────────

/// One payable output of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<SwitchId>,
    pub amount: f64,
    pub gpio_pin: u32,
    /// How long the output stays active, in milliseconds.
    pub gpio_duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lnurl: Option<String>,
}

impl Switch {
    /// A fresh, unsaved switch at 1-based `position`.
    pub fn new_at(position: usize) -> Self {
        Self {
            id: None,
            amount: DEFAULT_SWITCH_AMOUNT,
            gpio_pin: DEFAULT_GPIO_PIN,
            gpio_duration: DEFAULT_GPIO_DURATION_MS,
            label: Some(format!("Switch {position}")),
            lnurl: None,
        }
    }

    /// Saved on the server: has an id and a payment link.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some() && self.lnurl.is_some()
    }

    /// Label, or `Switch N` for the 1-based `position` when unset.
    pub fn display_label(&self, position: usize) -> String {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label.to_owned(),
            _ => format!("Switch {position}"),
        }
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// A payment-gated device as mirrored in the store.
///
/// `switches` is always present (empty when the server omits it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub title: String,
    pub wallet: String,
    pub currency: Currency,
    pub timezone: String,
    pub available_start: String,
    pub available_stop: String,
    /// Seconds a switch waits for payment before giving up.
    pub timeout: u64,
    /// Activations allowed per day; 0 means unlimited.
    pub maxperday: u32,
    pub closed_url: Option<String>,
    pub wait_url: Option<String>,
    pub switches: Vec<Switch>,
    pub timestamp: Option<String>,
}

impl Device {
    /// Availability window, e.g. `09:00 - 17:00`.
    pub fn hours(&self) -> String {
        format!("{} - {}", self.available_start, self.available_stop)
    }

    pub fn switch_count(&self) -> usize {
        self.switches.len()
    }

    pub fn switch(&self, id: &SwitchId) -> Option<&Switch> {
        self.switches.iter().find(|s| s.id.as_ref() == Some(id))
    }

    /// Case-insensitive match of `needle` against title or currency code.
    /// An empty needle matches everything.
    pub fn matches_text(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.currency.code().to_lowercase().contains(&needle)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn currency_parses_known_and_keeps_unknown() {
        assert_eq!("sat".parse::<Currency>().unwrap(), Currency::Sat);
        assert_eq!("eur".parse::<Currency>().unwrap(), Currency::Eur);
        assert_eq!(
            "NOK".parse::<Currency>().unwrap(),
            Currency::Other("NOK".into())
        );
        assert_eq!(String::from(Currency::Other("NOK".into())), "NOK");
        assert!(Currency::Usd.is_fiat());
        assert!(!Currency::Sat.is_fiat());
    }

    #[test]
    fn currency_serializes_as_code() {
        let json = serde_json::to_string(&Currency::Chf).unwrap();
        assert_eq!(json, "\"CHF\"");
        let back: Currency = serde_json::from_str("\"sat\"").unwrap();
        assert_eq!(back, Currency::Sat);
    }

    #[test]
    fn new_switch_uses_defaults() {
        let sw = Switch::new_at(3);
        assert!((sw.amount - DEFAULT_SWITCH_AMOUNT).abs() < f64::EPSILON);
        assert_eq!(sw.gpio_pin, 21);
        assert_eq!(sw.gpio_duration, 2100);
        assert_eq!(sw.label.as_deref(), Some("Switch 3"));
        assert!(!sw.is_persisted());
    }

    #[test]
    fn persisted_needs_id_and_lnurl() {
        let mut sw = Switch::new_at(1);
        sw.id = Some("sw1".into());
        assert!(!sw.is_persisted());
        sw.lnurl = Some("LNURL1".into());
        assert!(sw.is_persisted());
    }

    #[test]
    fn unsaved_switch_serializes_without_id() {
        let value = serde_json::to_value(Switch::new_at(1)).unwrap();
        assert!(value.get("id").is_none());
        assert!(value.get("lnurl").is_none());
        assert_eq!(value["label"], "Switch 1");
    }
}
