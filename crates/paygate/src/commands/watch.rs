//! Live totals: start the console's background polling and reprint the
//! counters whenever the device list or the server's connected set changes.

use paygate_core::{Console, ConnectivitySource};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::status::{StatusReport, report_detail, report_line};
use super::util;

pub async fn handle(console: &Console, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut notices = console.notices();
    let mut devices = console.subscribe_devices();
    let mut connected = console.connectivity_changes();

    console.start().await?;

    let query = util::view_query(args.wallet.as_deref(), None);
    let mut last = None;

    loop {
        let totals = console.view(&query).totals;
        if last != Some(totals) {
            let report = StatusReport {
                wallet: query.wallet.to_string(),
                source: ConnectivitySource::ServerConfirmed,
                totals,
            };
            let out = output::render_single(global.output, &report, report_detail, report_line)?;
            output::print_output(&out, global.quiet);
            last = Some(totals);
        }
        util::drain_notices(&mut notices, global);

        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => return Ok(()),

            snapshot = devices.changed() => {
                if snapshot.is_none() {
                    return Ok(());
                }
            }

            changed = connected.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
        }
    }
}
