//! Connectivity totals and wallet listings.

use serde::Serialize;
use tabled::Tabled;

use paygate_core::{Console, ConnectivitySource, Totals, WalletSummary};

use crate::cli::{GlobalOpts, SourceArg, StatusArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
pub(super) struct StatusReport {
    pub wallet: String,
    pub source: ConnectivitySource,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Tabled)]
struct WalletRow {
    #[tabled(rename = "Filter")]
    filter: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Devices")]
    devices: usize,
}

impl From<&WalletSummary> for WalletRow {
    fn from(w: &WalletSummary) -> Self {
        Self {
            filter: w.filter.clone(),
            name: w.name.clone(),
            devices: w.devices,
        }
    }
}

pub(super) fn report_detail(r: &StatusReport) -> String {
    [
        format!("Wallet:    {}", r.wallet),
        format!("Source:    {}", r.source),
        format!("Devices:   {}", r.totals.devices),
        format!("Switches:  {}", r.totals.switches),
        format!("Connected: {}", r.totals.connected),
        format!("Offline:   {}", r.totals.offline),
    ]
    .join("\n")
}

pub(super) fn report_line(r: &StatusReport) -> String {
    format!(
        "devices={} switches={} connected={} offline={}",
        r.totals.devices, r.totals.switches, r.totals.connected, r.totals.offline
    )
}

pub async fn handle(console: &Console, args: &StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    console.reload_devices().await?;
    // Without a status answer every device counts as offline.
    if let Err(e) = console.refresh_connectivity().await {
        tracing::warn!(error = %e, "connectivity unavailable");
    }

    let mut query = util::view_query(args.wallet.as_deref(), None);
    query.source = match args.source {
        SourceArg::Server => ConnectivitySource::ServerConfirmed,
        SourceArg::Session => ConnectivitySource::SessionChannel,
    };
    let view = console.view(&query);
    let report = StatusReport {
        wallet: query.wallet.to_string(),
        source: query.source,
        totals: view.totals,
    };

    let out = output::render_single(global.output, &report, report_detail, report_line)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn wallets(console: &Console, global: &GlobalOpts) -> Result<(), CliError> {
    console.reload_devices().await?;
    let summaries = console.wallets_with_counts();
    let out = output::render_list(
        global.output,
        &summaries,
        |w| WalletRow::from(w),
        |w| w.filter.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line_lists_every_counter() {
        let report = StatusReport {
            wallet: "all".into(),
            source: ConnectivitySource::ServerConfirmed,
            totals: Totals {
                devices: 3,
                switches: 5,
                connected: 1,
                offline: 2,
            },
        };
        assert_eq!(
            report_line(&report),
            "devices=3 switches=5 connected=1 offline=2"
        );
        assert!(report_detail(&report).contains("Source:    server"));
    }
}
