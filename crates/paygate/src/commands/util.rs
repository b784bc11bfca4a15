//! Shared helpers for command handlers.

use std::path::Path;

use paygate_core::{Notice, NoticeLevel, ViewQuery, WalletFilter};
use tokio::sync::broadcast;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal to ask on, refuses instead of blocking.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    use std::io::IsTerminal;

    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Read and parse a JSON file for `--from-file` flags.
pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "from-file".into(),
        reason: format!("{}: {e}", path.display()),
    })
}

/// Build a view query from `--wallet` / `--filter` style options.
pub fn view_query(wallet: Option<&str>, filter: Option<&str>) -> ViewQuery {
    ViewQuery {
        wallet: wallet.map_or(WalletFilter::All, |w| {
            w.parse().unwrap_or(WalletFilter::All)
        }),
        text: filter.unwrap_or_default().to_owned(),
        ..ViewQuery::default()
    }
}

/// Print queued console notices to stderr. Errors are skipped: they also
/// come back as the command's `Err` and are reported once, by `main`.
pub fn drain_notices(notices: &mut broadcast::Receiver<Notice>, global: &GlobalOpts) {
    let color = output::should_color(global.color);
    while let Ok(notice) = notices.try_recv() {
        if global.quiet || notice.level == NoticeLevel::Error {
            continue;
        }
        eprintln!("{}", output::paint_notice(notice.level, &notice.message, color));
    }
}
