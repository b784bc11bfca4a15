//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use paygate_config::ConfigError;
use paygate_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the server at {url}")]
    #[diagnostic(
        code(paygate::connection_failed),
        help(
            "Check that the node is running and the extension is enabled.\n\
             {reason}\n\
             Self-signed certificate? Try --insecure (-k)."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(paygate::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(paygate::auth_failed),
        help(
            "Check the wallet keys of profile '{profile}'.\n\
             Mutations need the wallet's admin key."
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No wallet credentials for profile '{profile}'")]
    #[diagnostic(
        code(paygate::no_credentials),
        help(
            "Configure a wallet with: paygate config init\n\
             Or pass --server and --wallet-key (PAYGATE_WALLET_KEY)."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(paygate::not_found),
        help("Run: paygate {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Server error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    #[diagnostic(code(paygate::api_error))]
    ApiError { status: Option<u16>, message: String },

    #[error("Real-time channel not supported")]
    #[diagnostic(
        code(paygate::channel_unavailable),
        help("The profile disables the payment channel (channel = false).")
    )]
    ChannelUnavailable,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(paygate::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(paygate::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: paygate config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(paygate::no_config),
        help(
            "Create one with: paygate config init\n\
             Expected at: {path}\n\
             Or pass --server and --wallet-key."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(paygate::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(paygate::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Internal / IO ────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(paygate::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(paygate::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Config(err) => match **err {
                ConfigError::NoCredentials { .. } | ConfigError::NoWallets { .. } => {
                    exit_code::AUTH
                }
                ConfigError::Validation { .. } => exit_code::USAGE,
                _ => exit_code::GENERAL,
            },
            _ => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } => Self::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::Timeout => Self::Timeout,

            CoreError::DeviceNotFound { identifier } => Self::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },

            CoreError::Api {
                message,
                status: Some(404),
            } => Self::NotFound {
                resource_type: "device".into(),
                identifier: message,
                list_command: "devices list".into(),
            },

            CoreError::ValidationFailed { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::MissingCredential { wallet, role } => Self::Validation {
                field: "wallet".into(),
                reason: format!("wallet {wallet} has no {role} key configured"),
            },

            CoreError::ChannelUnavailable => Self::ChannelUnavailable,

            CoreError::Api { message, status } => Self::ApiError { status, message },

            CoreError::Config { message } => Self::Validation {
                field: "configuration".into(),
                reason: message,
            },

            CoreError::DialogClosed { dialog } => {
                Self::Internal(format!("the {dialog} dialog is not open"))
            }

            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}
