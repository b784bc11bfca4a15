// ── Filter & stats engine ──
//
// Pure derivation of the visible device list and the dashboard counters.
// No I/O, no interior state: equal inputs give equal outputs.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::model::{Device, DeviceId};

// ── Inputs ───────────────────────────────────────────────────────────

/// Which wallet's devices to show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum WalletFilter {
    #[default]
    All,
    Wallet(String),
}

impl WalletFilter {
    pub fn matches(&self, device: &Device) -> bool {
        match self {
            Self::All => true,
            Self::Wallet(id) => device.wallet == *id,
        }
    }
}

impl fmt::Display for WalletFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Wallet(id) => f.write_str(id),
        }
    }
}

impl FromStr for WalletFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.is_empty() || s == "all" {
            Self::All
        } else {
            Self::Wallet(s.to_owned())
        })
    }
}

/// Where the connected/offline split comes from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ConnectivitySource {
    /// Device ids the server reports as hardware-connected. Authoritative.
    #[default]
    #[strum(to_string = "server", serialize = "server-confirmed")]
    ServerConfirmed,
    /// Only the device whose payment channel this console has open.
    #[strum(to_string = "session", serialize = "session-channel")]
    SessionChannel,
}

/// Connectivity snapshot from both sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connectivity {
    /// Last successful server status poll.
    pub server_confirmed: Arc<BTreeSet<DeviceId>>,
    /// Device bound to the console's open channel, if the channel is open.
    pub session_channel: Option<DeviceId>,
}

/// Per-device link status for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum LinkStatus {
    /// The server holds a hardware channel for the device.
    Online,
    /// Not confirmed by the server, but this console's channel is open.
    SessionOnly,
    Offline,
}

impl Connectivity {
    pub fn is_connected(&self, id: &DeviceId, source: ConnectivitySource) -> bool {
        match source {
            ConnectivitySource::ServerConfirmed => self.server_confirmed.contains(id),
            ConnectivitySource::SessionChannel => self.session_channel.as_ref() == Some(id),
        }
    }

    pub fn link_status(&self, id: &DeviceId) -> LinkStatus {
        if self.server_confirmed.contains(id) {
            LinkStatus::Online
        } else if self.session_channel.as_ref() == Some(id) {
            LinkStatus::SessionOnly
        } else {
            LinkStatus::Offline
        }
    }
}

/// Filter settings for [`compute`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub wallet: WalletFilter,
    /// Case-insensitive substring of title or currency. Empty shows all.
    pub text: String,
    pub source: ConnectivitySource,
}

// ── Outputs ──────────────────────────────────────────────────────────

/// Dashboard counters. Computed over the wallet-filtered set; the text
/// filter only narrows the visible list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub devices: usize,
    pub switches: usize,
    pub connected: usize,
    pub offline: usize,
}

/// Result of [`compute`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceView {
    pub visible: Vec<Arc<Device>>,
    pub totals: Totals,
}

/// Derive the visible devices and totals.
pub fn compute(
    devices: &[Arc<Device>],
    query: &ViewQuery,
    connectivity: &Connectivity,
) -> DeviceView {
    let in_wallet: Vec<&Arc<Device>> = devices
        .iter()
        .filter(|d| query.wallet.matches(d))
        .collect();

    let connected = in_wallet
        .iter()
        .filter(|d| connectivity.is_connected(&d.id, query.source))
        .count();

    let totals = Totals {
        devices: in_wallet.len(),
        switches: in_wallet.iter().map(|d| d.switch_count()).sum(),
        connected,
        offline: in_wallet.len() - connected,
    };

    let visible = in_wallet
        .into_iter()
        .filter(|d| d.matches_text(&query.text))
        .map(Arc::clone)
        .collect();

    DeviceView { visible, totals }
}

/// A wallet choice with the number of devices it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletSummary {
    pub filter: String,
    pub name: String,
    pub devices: usize,
}

/// Wallet choices for a picker: `all` first, then each `(id, name)` in order.
pub fn wallet_summaries<'a>(
    devices: &[Arc<Device>],
    wallets: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Vec<WalletSummary> {
    let mut out = vec![WalletSummary {
        filter: WalletFilter::All.to_string(),
        name: "All wallets".into(),
        devices: devices.len(),
    }];
    out.extend(wallets.into_iter().map(|(id, name)| WalletSummary {
        filter: id.to_owned(),
        name: name.to_owned(),
        devices: devices.iter().filter(|d| d.wallet == id).count(),
    }));
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Currency, Switch};
    use pretty_assertions::assert_eq;

    fn device(id: &str, wallet: &str, title: &str, currency: Currency, switches: usize) -> Arc<Device> {
        Arc::new(Device {
            id: DeviceId::from(id),
            title: title.into(),
            wallet: wallet.into(),
            currency,
            timezone: "Europe/Amsterdam".into(),
            available_start: "09:00".into(),
            available_stop: "17:00".into(),
            timeout: 30,
            maxperday: 0,
            closed_url: None,
            wait_url: None,
            switches: (1..=switches).map(Switch::new_at).collect(),
            timestamp: None,
        })
    }

    fn confirmed(ids: &[&str]) -> Connectivity {
        Connectivity {
            server_confirmed: Arc::new(ids.iter().map(|s| DeviceId::from(*s)).collect()),
            session_channel: None,
        }
    }

    #[test]
    fn wallet_filter_limits_visible_and_totals() {
        let devices = vec![
            device("a", "w1", "Alpha", Currency::Sat, 2),
            device("b", "w2", "Beta", Currency::Sat, 3),
        ];
        let query = ViewQuery {
            wallet: WalletFilter::Wallet("w1".into()),
            ..ViewQuery::default()
        };

        let view = compute(&devices, &query, &Connectivity::default());
        assert_eq!(view.visible.len(), 1);
        assert_eq!(view.visible[0].id.as_str(), "a");
        assert_eq!(view.totals.devices, 1);
        assert_eq!(view.totals.switches, 2);
    }

    #[test]
    fn all_wallet_passes_everything() {
        let devices = vec![
            device("a", "w1", "Alpha", Currency::Sat, 1),
            device("b", "w2", "Beta", Currency::Sat, 1),
        ];
        let view = compute(&devices, &ViewQuery::default(), &Connectivity::default());
        assert_eq!(view.visible.len(), 2);
        assert_eq!(view.totals.offline, 2);
    }

    #[test]
    fn text_filter_matches_title_or_currency_but_not_totals() {
        let devices = vec![
            device("a", "w1", "Coffee Machine", Currency::Sat, 1),
            device("b", "w1", "Arcade", Currency::Eur, 1),
            device("c", "w1", "Locker", Currency::Usd, 4),
        ];

        let by_title = ViewQuery {
            text: "COFFEE".into(),
            ..ViewQuery::default()
        };
        let view = compute(&devices, &by_title, &Connectivity::default());
        assert_eq!(view.visible.len(), 1);
        assert_eq!(view.totals.devices, 3);
        assert_eq!(view.totals.switches, 6);

        let by_currency = ViewQuery {
            text: "eur".into(),
            ..ViewQuery::default()
        };
        let view = compute(&devices, &by_currency, &Connectivity::default());
        assert_eq!(view.visible.len(), 1);
        assert_eq!(view.visible[0].id.as_str(), "b");
    }

    #[test]
    fn connected_counts_only_wallet_filtered_devices() {
        let devices = vec![
            device("a", "w1", "A", Currency::Sat, 1),
            device("b", "w1", "B", Currency::Sat, 1),
            device("c", "w2", "C", Currency::Sat, 1),
        ];
        let query = ViewQuery {
            wallet: WalletFilter::Wallet("w1".into()),
            ..ViewQuery::default()
        };
        // "c" and an unknown id are confirmed but outside the filtered set.
        let view = compute(&devices, &query, &confirmed(&["a", "c", "ghost"]));
        assert_eq!(view.totals.connected, 1);
        assert_eq!(view.totals.offline, 1);
    }

    #[test]
    fn session_source_counts_the_open_channel_only() {
        let devices = vec![
            device("a", "w1", "A", Currency::Sat, 1),
            device("b", "w1", "B", Currency::Sat, 1),
        ];
        let mut conn = confirmed(&["a"]);
        conn.session_channel = Some(DeviceId::from("b"));

        let query = ViewQuery {
            source: ConnectivitySource::SessionChannel,
            ..ViewQuery::default()
        };
        let view = compute(&devices, &query, &conn);
        assert_eq!(view.totals.connected, 1);
        assert_eq!(conn.link_status(&"a".into()), LinkStatus::Online);
        assert_eq!(conn.link_status(&"b".into()), LinkStatus::SessionOnly);
    }

    #[test]
    fn compute_is_deterministic() {
        let devices = vec![device("a", "w1", "A", Currency::Sat, 2)];
        let conn = confirmed(&["a"]);
        let query = ViewQuery::default();
        assert_eq!(compute(&devices, &query, &conn), compute(&devices, &query, &conn));
    }

    #[test]
    fn source_parses_short_and_long_names() {
        assert_eq!(
            "server".parse::<ConnectivitySource>().unwrap(),
            ConnectivitySource::ServerConfirmed
        );
        assert_eq!(
            "session-channel".parse::<ConnectivitySource>().unwrap(),
            ConnectivitySource::SessionChannel
        );
        assert_eq!("all".parse::<WalletFilter>().unwrap(), WalletFilter::All);
    }

    #[test]
    fn wallet_summaries_put_all_first() {
        let devices = vec![
            device("a", "w1", "A", Currency::Sat, 1),
            device("b", "w1", "B", Currency::Sat, 1),
            device("c", "w2", "C", Currency::Sat, 1),
        ];
        let summaries = wallet_summaries(&devices, [("w1", "Main"), ("w2", "Shop")]);
        let counts: Vec<_> = summaries.iter().map(|s| (s.filter.as_str(), s.devices)).collect();
        assert_eq!(counts, vec![("all", 3), ("w1", 2), ("w2", 1)]);
    }
}
