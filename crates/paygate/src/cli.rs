//! Clap derive structures for the `paygate` CLI.
//!
//! Defines the command tree, global flags, and shared argument types.
//! Only depends on clap so `build.rs` can include it for man pages.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// paygate -- console for payment-gated device switches
#[derive(Debug, Parser)]
#[command(
    name = "paygate",
    version,
    about = "Manage payment-gated devices from the command line",
    long_about = "Create, edit and monitor devices whose switches are released by\n\
        Lightning payments. Shows live hardware connectivity and follows the\n\
        real-time payment channel of a device.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "PAYGATE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Extension root URL (overrides profile)
    #[arg(long, short = 'S', env = "PAYGATE_SERVER", global = true)]
    pub server: Option<String>,

    /// Wallet admin key (overrides the first wallet's key)
    #[arg(long, env = "PAYGATE_WALLET_KEY", global = true, hide_env_values = true)]
    pub wallet_key: Option<String>,

    /// Wallet id used with --wallet-key when no profile is configured
    #[arg(long, env = "PAYGATE_WALLET_ID", global = true)]
    pub wallet_id: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PAYGATE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "PAYGATE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "PAYGATE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Where `status` takes the connected/offline split from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    /// Devices the server reports as hardware-connected
    Server,
    /// The device whose payment channel this console has open
    Session,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage devices and their switches
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Show connectivity totals
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Follow totals live until interrupted
    Watch(WatchArgs),

    /// List configured wallets with device counts
    Wallets,

    /// List timezones accepted by the server
    Timezones,

    /// List currencies accepted by the server
    Currencies,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices with totals
    #[command(alias = "ls")]
    List {
        /// Only devices of this wallet ("all" for every wallet)
        #[arg(long, short = 'w')]
        wallet: Option<String>,

        /// Case-insensitive match on title or currency
        #[arg(long, short = 'f')]
        filter: Option<String>,
    },

    /// Show one device and its switches
    Get {
        /// Device ID
        device: String,
    },

    /// Create a device
    Create {
        #[command(flatten)]
        fields: DeviceFields,
    },

    /// Update a device (flags are merged over the current record)
    Update {
        /// Device ID
        device: String,

        #[command(flatten)]
        fields: DeviceFields,

        /// Drop existing switches before adding any given with --switch
        #[arg(long)]
        clear_switches: bool,
    },

    /// Delete a device
    #[command(alias = "rm")]
    Delete {
        /// Device ID
        device: String,
    },

    /// Show the payment QR for a switch and follow the payment channel
    Qr {
        /// Device ID
        device: String,

        /// Switch ID (defaults to the first switch)
        #[arg(long, short = 's')]
        switch: Option<String>,

        /// Exit after the first payment
        #[arg(long)]
        once: bool,

        /// Print the payment details and exit without opening the channel
        #[arg(long, conflicts_with = "once")]
        no_follow: bool,
    },

    /// Show the URL the device hardware connects to
    ChannelUrl {
        /// Device ID
        device: String,
    },
}

/// Device fields shared by `create` and `update`.
#[derive(Debug, Default, Args)]
pub struct DeviceFields {
    /// Device title
    #[arg(long)]
    pub title: Option<String>,

    /// Wallet that receives payments
    #[arg(long, short = 'w')]
    pub wallet: Option<String>,

    /// Pricing currency (sat or a fiat code)
    #[arg(long)]
    pub currency: Option<String>,

    /// IANA timezone for the availability window
    #[arg(long)]
    pub timezone: Option<String>,

    /// Availability window start (HH:MM)
    #[arg(long, value_name = "HH:MM")]
    pub start: Option<String>,

    /// Availability window end (HH:MM)
    #[arg(long, value_name = "HH:MM")]
    pub stop: Option<String>,

    /// Seconds a payment request stays valid
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Maximum payments per day (0 = unlimited)
    #[arg(long)]
    pub max_per_day: Option<u32>,

    /// Redirect URL when the device is closed
    #[arg(long)]
    pub closed_url: Option<String>,

    /// Redirect URL while waiting
    #[arg(long)]
    pub wait_url: Option<String>,

    /// Switch as AMOUNT:PIN:DURATION_MS[:LABEL] (repeatable)
    #[arg(long = "switch", value_name = "SPEC")]
    pub switches: Vec<SwitchSpec>,

    /// JSON file with device fields; flags override its values
    #[arg(long, short = 'F')]
    pub from_file: Option<PathBuf>,
}

/// A switch given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchSpec {
    pub amount: f64,
    pub pin: u32,
    pub duration_ms: u64,
    pub label: Option<String>,
}

impl FromStr for SwitchSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, ':');
        let mut next = |name: &str| {
            parts
                .next()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| format!("missing {name} in '{s}' (expected AMOUNT:PIN:DURATION_MS[:LABEL])"))
        };

        let amount: f64 = next("amount")?
            .parse()
            .map_err(|e| format!("invalid amount: {e}"))?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(format!("amount must be positive, got {amount}"));
        }
        let pin = next("pin")?.parse().map_err(|e| format!("invalid pin: {e}"))?;
        let duration_ms = next("duration")?
            .parse()
            .map_err(|e| format!("invalid duration: {e}"))?;
        let label = parts.next().filter(|l| !l.is_empty()).map(str::to_owned);

        Ok(Self {
            amount,
            pin,
            duration_ms,
            label,
        })
    }
}

impl fmt::Display for SwitchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.amount, self.pin, self.duration_ms)?;
        if let Some(label) = &self.label {
            write!(f, ":{label}")?;
        }
        Ok(())
    }
}

// ── Status / Watch ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Only devices of this wallet ("all" for every wallet)
    #[arg(long, short = 'w')]
    pub wallet: Option<String>,

    /// Connectivity source
    #[arg(long, default_value = "server")]
    pub source: SourceArg,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only devices of this wallet ("all" for every wallet)
    #[arg(long, short = 'w')]
    pub wallet: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or extend the config file with guided setup
    Init,

    /// Display the configuration (keys masked)
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn switch_spec_parses_with_and_without_label() {
        let spec: SwitchSpec = "10:21:2100".parse().unwrap();
        assert_eq!(spec.pin, 21);
        assert_eq!(spec.duration_ms, 2100);
        assert_eq!(spec.label, None);

        let spec: SwitchSpec = "2.5:4:500:Left: door".parse().unwrap();
        assert!((spec.amount - 2.5).abs() < f64::EPSILON);
        assert_eq!(spec.label.as_deref(), Some("Left: door"));
    }

    #[test]
    fn switch_spec_rejects_bad_input() {
        assert!("10:21".parse::<SwitchSpec>().is_err());
        assert!("ten:21:2100".parse::<SwitchSpec>().is_err());
        assert!("0:21:2100".parse::<SwitchSpec>().is_err());
        assert!("10:-1:2100".parse::<SwitchSpec>().is_err());
    }
}
