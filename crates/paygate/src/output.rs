//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use paygate_core::{LinkStatus, NoticeLevel};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

pub fn paint_link(status: LinkStatus, color: bool) -> String {
    let text = status.to_string();
    if !color {
        return text;
    }
    match status {
        LinkStatus::Online => text.green().to_string(),
        LinkStatus::SessionOnly => text.yellow().to_string(),
        LinkStatus::Offline => text.red().to_string(),
    }
}

pub fn paint_notice(level: NoticeLevel, message: &str, color: bool) -> String {
    if !color {
        return message.to_owned();
    }
    match level {
        NoticeLevel::Positive => message.green().bold().to_string(),
        NoticeLevel::Warning => message.yellow().to_string(),
        NoticeLevel::Error => message.red().bold().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable items in the chosen format.
///
/// - `table`: maps each item through `to_row` into a `Tabled` row
/// - `json` / `json-compact` / `yaml`: serializes the original data
/// - `plain`: calls `id_fn` on each item, one per line
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => data.iter().map(id_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render a single item in the chosen format.
///
/// Table rendering uses `detail_fn`, which returns a pre-formatted block.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => id_fn(data),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}
