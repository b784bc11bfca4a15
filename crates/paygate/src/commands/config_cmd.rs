//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, KeyRole, Profile, WalletProfile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config with every plaintext key replaced by a mask.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        for wallet in &mut profile.wallets {
            if wallet.admin_key.is_some() {
                wallet.admin_key = Some(MASK.into());
            }
            if wallet.invoice_key.is_some() {
                wallet.invoice_key = Some(MASK.into());
            }
        }
    }
    cfg
}

/// Format an already-redacted config as TOML-like text.
fn format_config(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "poll_interval = {}", cfg.defaults.poll_interval);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "server = \"{}\"", p.server);
        let _ = writeln!(out, "channel = {}", p.channel);
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(poll) = p.poll_interval {
            let _ = writeln!(out, "poll_interval = {poll}");
        }
        for w in &p.wallets {
            let _ = writeln!(out);
            let _ = writeln!(out, "[[profiles.{name}.wallets]]");
            let _ = writeln!(out, "id = \"{}\"", w.id);
            let optional = [
                ("name", &w.name),
                ("admin_key", &w.admin_key),
                ("admin_key_env", &w.admin_key_env),
                ("invoice_key", &w.invoice_key),
                ("invoice_key_env", &w.invoice_key_env),
            ];
            for (key, value) in optional {
                if let Some(value) = value {
                    let _ = writeln!(out, "{key} = \"{value}\"");
                }
            }
        }
    }

    out
}

fn profile_not_found(cfg: &Config, name: String) -> CliError {
    let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Ask for one wallet key. Empty input skips the key.
///
/// Returns the plaintext value to write to the config file, or `None`
/// when the key was skipped or went to the keyring.
fn prompt_wallet_key(
    profile_name: &str,
    wallet_id: &str,
    role: KeyRole,
    use_keyring: bool,
) -> Result<Option<String>, CliError> {
    let label = match role {
        KeyRole::Admin => "Admin key (blank to skip): ",
        KeyRole::Invoice => "Invoice key (blank to skip): ",
    };
    let secret = rpassword::prompt_password(label).map_err(prompt_err)?;
    if secret.is_empty() {
        return Ok(None);
    }
    if use_keyring {
        config::store_wallet_key(profile_name, wallet_id, role, &secret)?;
        eprintln!("   ✓ stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

fn prompt_wallet(profile_name: &str, use_keyring: bool) -> Result<WalletProfile, CliError> {
    let id: String = Input::new()
        .with_prompt("Wallet id")
        .interact_text()
        .map_err(prompt_err)?;
    let name: String = Input::new()
        .with_prompt("Wallet name")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let admin_key = prompt_wallet_key(profile_name, &id, KeyRole::Admin, use_keyring)?;
    let invoice_key = prompt_wallet_key(profile_name, &id, KeyRole::Invoice, use_keyring)?;

    Ok(WalletProfile {
        id,
        name: Some(name).filter(|n| !n.is_empty()),
        admin_key,
        invoice_key,
        ..WalletProfile::default()
    })
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("paygate configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let mut cfg = config::load_config_or_default();

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let server: String = Input::new()
                .with_prompt("Extension URL")
                .default("https://localhost:5000/devicetimer".into())
                .validate_with(|s: &String| {
                    paygate_config::parse_server_url(s)
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .interact_text()
                .map_err(prompt_err)?;

            let storage = Select::new()
                .with_prompt("Where to store wallet keys?")
                .items(&[
                    "Store in system keyring (recommended)",
                    "Save to config file (plaintext)",
                ])
                .default(0)
                .interact()
                .map_err(prompt_err)?;
            let use_keyring = storage == 0;

            let mut profile = Profile::new(server);
            loop {
                profile.wallets.push(prompt_wallet(&profile_name, use_keyring)?);
                let more = Confirm::new()
                    .with_prompt("Add another wallet?")
                    .default(false)
                    .interact()
                    .map_err(prompt_err)?;
                if !more {
                    break;
                }
            }

            profile.channel = Confirm::new()
                .with_prompt("Follow payments over the real-time channel?")
                .default(true)
                .interact()
                .map_err(prompt_err)?;

            // Validate wallets before anything is written.
            paygate_config::resolve_wallets(&profile, &profile_name)?;

            cfg.profiles.insert(profile_name.clone(), profile);
            if cfg.profiles.len() == 1 {
                cfg.default_profile = Some(profile_name.clone());
            }
            config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Profile: {profile_name}");
            eprintln!("\n  Test it: paygate -p {profile_name} devices list");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(global.output, &cfg, format_config, |_| {
                "config".into()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let active = config::active_profile_name(global, &cfg);
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: paygate config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if *name == active { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(&cfg, name));
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Config {
        let mut profile = Profile::new("https://node.example/devicetimer");
        profile.wallets.push(WalletProfile {
            id: "w1".into(),
            admin_key: Some("secret-admin".into()),
            invoice_key_env: Some("SHOP_INVOICE".into()),
            ..WalletProfile::default()
        });
        let mut cfg = Config::default();
        cfg.profiles.insert("shop".into(), profile);
        cfg
    }

    #[test]
    fn show_masks_plaintext_keys_in_every_format() {
        let cfg = redacted(&sample());

        let text = format_config(&cfg);
        assert!(!text.contains("secret-admin"));
        assert!(text.contains("admin_key = \"****\""));
        assert!(text.contains("invoice_key_env = \"SHOP_INVOICE\""));

        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("secret-admin"));
    }

    #[test]
    fn unknown_profile_lists_alternatives() {
        let err = profile_not_found(&sample(), "nope".into());
        match err {
            CliError::ProfileNotFound { available, .. } => assert_eq!(available, "shop"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
