// ── API-to-domain type conversions ──
//
// Bridges raw `paygate_api` response types into canonical model types.
// Missing optional data gets its documented default here so nothing
// downstream has to care whether the server sent `null`, `""` or nothing.

use paygate_api::{ApiDevice, ApiSwitch};

use crate::model::{Currency, Device, DeviceId, Switch, SwitchId};

/// Empty strings become `None`.
fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.is_empty())
}

impl From<ApiSwitch> for Switch {
    fn from(s: ApiSwitch) -> Self {
        Switch {
            id: non_empty(s.id).map(SwitchId::from),
            amount: s.amount,
            gpio_pin: s.gpio_pin,
            gpio_duration: s.gpio_duration,
            label: non_empty(s.label),
            lnurl: non_empty(s.lnurl),
        }
    }
}

impl From<ApiDevice> for Device {
    fn from(d: ApiDevice) -> Self {
        Device {
            id: DeviceId::from(d.id),
            title: d.title,
            wallet: d.wallet,
            currency: Currency::from(d.currency),
            timezone: d.timezone,
            available_start: d.available_start,
            available_stop: d.available_stop,
            timeout: d.timeout,
            maxperday: d.maxperday.unwrap_or(0),
            closed_url: non_empty(d.closed_url),
            wait_url: non_empty(d.wait_url),
            switches: d
                .switches
                .unwrap_or_default()
                .into_iter()
                .map(Switch::from)
                .collect(),
            timestamp: d.timestamp,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api_device(switches: serde_json::Value) -> ApiDevice {
        serde_json::from_value(json!({
            "id": "dev1",
            "title": "Coffee",
            "wallet": "w1",
            "currency": "EUR",
            "switches": switches,
            "available_start": "09:00",
            "available_stop": "17:00",
            "timeout": 30,
            "timezone": "Europe/Amsterdam",
            "maxperday": null,
            "closed_url": "",
            "wait_url": null
        }))
        .unwrap()
    }

    #[test]
    fn null_switches_become_empty() {
        let device = Device::from(api_device(serde_json::Value::Null));
        assert!(device.switches.is_empty());
        assert_eq!(device.maxperday, 0);
        assert_eq!(device.closed_url, None);
        assert_eq!(device.currency, Currency::Eur);
    }

    #[test]
    fn switch_with_null_id_is_not_persisted() {
        let device = Device::from(api_device(json!([{"id": null, "amount": 5, "lnurl": null}])));
        assert_eq!(device.switches.len(), 1);
        assert!(!device.switches[0].is_persisted());
    }

    #[test]
    fn saved_switch_keeps_identity() {
        let device = Device::from(api_device(json!([
            {"id": "sw1", "amount": 21, "gpio_pin": 4, "gpio_duration": 500, "lnurl": "LNURL1", "label": ""}
        ])));
        let sw = &device.switches[0];
        assert_eq!(sw.id, Some(SwitchId::from("sw1")));
        assert_eq!(sw.gpio_pin, 4);
        assert_eq!(sw.label, None);
        assert!(sw.is_persisted());
    }
}
