//! CLI configuration: thin wrapper around `paygate_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--server,
//! --wallet-key, --insecure, --timeout).

use std::time::Duration;

use secrecy::SecretString;

use paygate_core::{ConsoleConfig, TlsVerification, WalletCredentials};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use paygate_config::{
    Config, Defaults, KeyRole, Profile, WalletProfile, config_path, load_config_or_default,
    save_config, store_wallet_key,
};

/// Wallet id used for a bare `--wallet-key` without `--wallet-id`.
const FLAG_WALLET_ID: &str = "default";

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.active_profile_name().to_owned())
}

/// Build the console configuration from the config file, the active
/// profile and CLI overrides.
pub fn build_console_config(global: &GlobalOpts) -> Result<ConsoleConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, &cfg.defaults, global);
    }

    // An explicitly requested profile must exist.
    if global.profile.is_some() {
        let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
        available.sort();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    }

    // No profile: build from flags / env alone.
    let server = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let url = paygate_config::parse_server_url(server)?;

    let key = global
        .wallet_key
        .clone()
        .map(SecretString::from)
        .ok_or(CliError::NoCredentials {
            profile: profile_name,
        })?;
    let wallet = WalletCredentials {
        id: global
            .wallet_id
            .clone()
            .unwrap_or_else(|| FLAG_WALLET_ID.into()),
        name: String::new(),
        admin_key: Some(key),
        invoice_key: None,
    };

    let mut config = ConsoleConfig::new(url).with_wallet(wallet);
    config.tls = if global.insecure || cfg.defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };
    config.timeout = Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout));
    config.status_poll_interval = Duration::from_secs(cfg.defaults.poll_interval.max(1));
    Ok(config)
}

/// Translate a `Profile` + global flags into a `ConsoleConfig`.
///
/// CLI flag overrides take priority over profile values.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    global: &GlobalOpts,
) -> Result<ConsoleConfig, CliError> {
    let mut profile = profile.clone();
    if let Some(server) = &global.server {
        profile.server.clone_from(server);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    let mut config = paygate_config::profile_to_console_config(&profile, profile_name, defaults)?;

    // --wallet-key replaces the admin key of the selected wallet.
    if let Some(key) = &global.wallet_key {
        let target = global.wallet_id.as_deref();
        let wallet = match target {
            Some(id) => config.wallets.iter_mut().find(|w| w.id == id),
            None => config.wallets.first_mut(),
        }
        .ok_or_else(|| CliError::Validation {
            field: "wallet-id".into(),
            reason: format!(
                "wallet '{}' is not in profile '{profile_name}'",
                target.unwrap_or_default()
            ),
        })?;
        wallet.admin_key = Some(SecretString::from(key.clone()));
    }

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use secrecy::ExposeSecret;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["paygate"];
        argv.extend_from_slice(args);
        argv.push("timezones");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn profile() -> Profile {
        let mut p = Profile::new("https://node.example/devicetimer");
        p.wallets.push(WalletProfile {
            id: "w1".into(),
            invoice_key: Some("inv".into()),
            ..WalletProfile::default()
        });
        p
    }

    #[test]
    fn flags_override_profile() {
        let g = global(&[
            "--server",
            "http://localhost:5000/devicetimer",
            "--timeout",
            "5",
            "-k",
            "--wallet-key",
            "adm",
        ]);
        let cfg = resolve_profile(&profile(), "shop", &Defaults::default(), &g).unwrap();

        assert_eq!(cfg.url.as_str(), "http://localhost:5000/devicetimer");
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert_eq!(cfg.tls, TlsVerification::DangerAcceptInvalid);
        let w = &cfg.wallets[0];
        assert_eq!(w.admin_key.as_ref().unwrap().expose_secret(), "adm");
        assert_eq!(w.invoice_key.as_ref().unwrap().expose_secret(), "inv");
    }

    #[test]
    fn unknown_wallet_id_is_rejected() {
        let g = global(&["--wallet-key", "adm", "--wallet-id", "nope"]);
        let err = resolve_profile(&profile(), "shop", &Defaults::default(), &g).unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));
    }
}
