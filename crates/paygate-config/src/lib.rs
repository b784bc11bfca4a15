//! Shared configuration for paygate front ends.
//!
//! TOML profiles, wallet key resolution (env + keyring + plaintext), and
//! translation to `paygate_core::ConsoleConfig`. The CLI layers its
//! flag overrides on top of this.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use paygate_core::{ConsoleConfig, TlsVerification, WalletCredentials};

const KEYRING_SERVICE: &str = "paygate";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no keys configured for wallet '{wallet}' in profile '{profile}'")]
    NoCredentials { profile: String, wallet: String },

    #[error("profile '{profile}' has no wallets")]
    NoWallets { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use when none is given on the command line.
    pub fn active_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Connectivity poll period in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

/// A named server profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Extension root URL (e.g., "https://node.example/devicetimer").
    pub server: String,

    /// Path to custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    /// Override request timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Override connectivity poll period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,

    /// Allow the real-time payment channel.
    #[serde(default = "default_true")]
    pub channel: bool,

    /// Wallets in display order. The first one is the default.
    #[serde(default)]
    pub wallets: Vec<WalletProfile>,
}

impl Profile {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ca_cert: None,
            insecure: None,
            timeout: None,
            poll_interval: None,
            channel: true,
            wallets: Vec::new(),
        }
    }
}

/// One wallet entry in a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WalletProfile {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Admin key (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_key: Option<String>,

    /// Environment variable holding the admin key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_key_env: Option<String>,

    /// Invoice/read key (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_key: Option<String>,

    /// Environment variable holding the invoice key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_key_env: Option<String>,
}

/// Which of a wallet's two keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Admin,
    Invoice,
}

impl KeyRole {
    fn slug(self) -> &'static str {
        match self {
            Self::Admin => "admin-key",
            Self::Invoice => "invoice-key",
        }
    }
}

/// Keyring account name for a wallet key: `{profile}/{wallet}/{role}`.
pub fn keyring_account(profile_name: &str, wallet_id: &str, role: KeyRole) -> String {
    format!("{profile_name}/{wallet_id}/{}", role.slug())
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "paygate", "paygate").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("paygate");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. `PAYGATE_` variables override file values;
/// nested keys use a double underscore (`PAYGATE_DEFAULTS__OUTPUT`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PAYGATE_").split("__"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if the file doesn't exist or is invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Store a wallet key in the system keyring.
pub fn store_wallet_key(
    profile_name: &str,
    wallet_id: &str,
    role: KeyRole,
    secret: &str,
) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(
        KEYRING_SERVICE,
        &keyring_account(profile_name, wallet_id, role),
    )?;
    entry.set_password(secret)?;
    Ok(())
}

/// Resolve one wallet key: `*_env` variable, then keyring, then plaintext.
pub fn resolve_wallet_key(
    wallet: &WalletProfile,
    profile_name: &str,
    role: KeyRole,
) -> Option<SecretString> {
    resolve_wallet_key_with(wallet, profile_name, role, |name| std::env::var(name).ok())
}

fn resolve_wallet_key_with(
    wallet: &WalletProfile,
    profile_name: &str,
    role: KeyRole,
    env: impl Fn(&str) -> Option<String>,
) -> Option<SecretString> {
    let (env_name, plaintext) = match role {
        KeyRole::Admin => (&wallet.admin_key_env, &wallet.admin_key),
        KeyRole::Invoice => (&wallet.invoice_key_env, &wallet.invoice_key),
    };

    // 1. Env var named by the profile
    if let Some(val) = env_name.as_deref().and_then(env) {
        return Some(SecretString::from(val));
    }

    // 2. System keyring
    let account = keyring_account(profile_name, &wallet.id, role);
    if let Ok(secret) =
        keyring::Entry::new(KEYRING_SERVICE, &account).and_then(|entry| entry.get_password())
    {
        return Some(SecretString::from(secret));
    }

    // 3. Plaintext in config
    plaintext.clone().map(SecretString::from)
}

/// Resolve every wallet of a profile. A wallet with neither key is an error.
pub fn resolve_wallets(
    profile: &Profile,
    profile_name: &str,
) -> Result<Vec<WalletCredentials>, ConfigError> {
    if profile.wallets.is_empty() {
        return Err(ConfigError::NoWallets {
            profile: profile_name.into(),
        });
    }

    profile
        .wallets
        .iter()
        .map(|wallet| {
            if wallet.id.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: "wallets.id".into(),
                    reason: "wallet id must not be empty".into(),
                });
            }
            let admin_key = resolve_wallet_key(wallet, profile_name, KeyRole::Admin);
            let invoice_key = resolve_wallet_key(wallet, profile_name, KeyRole::Invoice);
            if admin_key.is_none() && invoice_key.is_none() {
                return Err(ConfigError::NoCredentials {
                    profile: profile_name.into(),
                    wallet: wallet.id.clone(),
                });
            }
            Ok(WalletCredentials {
                id: wallet.id.clone(),
                name: wallet.name.clone().unwrap_or_default(),
                admin_key,
                invoice_key,
            })
        })
        .collect()
}

/// Parse and check a server URL.
pub fn parse_server_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "server".into(),
            reason: format!("expected http or https, got '{}'", url.scheme()),
        });
    }
    Ok(url)
}

/// Build a `ConsoleConfig` from a profile, with no CLI flag overrides.
pub fn profile_to_console_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ConsoleConfig, ConfigError> {
    let url = parse_server_url(&profile.server)?;
    let wallets = resolve_wallets(profile, profile_name)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut config = ConsoleConfig::new(url);
    config.wallets = wallets;
    config.tls = tls;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.status_poll_interval =
        Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval).max(1));
    config.channel_enabled = profile.channel;
    Ok(config)
}
