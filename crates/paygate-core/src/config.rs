// ── Runtime console configuration ──
//
// These types describe *where* the device API lives and which wallet keys
// the console may use. They never touch disk: the CLI resolves profiles and
// hands a `ConsoleConfig` in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Keys for one wallet the operator controls.
///
/// Reads (device listing, connectivity) use the invoice key; mutations use
/// the admin key. LNbits also accepts the admin key for reads, so a wallet
/// configured with only an admin key can do everything.
#[derive(Debug, Clone)]
pub struct WalletCredentials {
    pub id: String,
    /// Display name; falls back to the id when empty.
    pub name: String,
    pub admin_key: Option<SecretString>,
    pub invoice_key: Option<SecretString>,
}

impl WalletCredentials {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Key for read-only endpoints.
    pub fn read_key(&self) -> Result<&SecretString, CoreError> {
        self.invoice_key
            .as_ref()
            .or(self.admin_key.as_ref())
            .ok_or_else(|| CoreError::MissingCredential {
                wallet: self.id.clone(),
                role: "invoice",
            })
    }

    /// Key for create/update/delete.
    pub fn write_key(&self) -> Result<&SecretString, CoreError> {
        self.admin_key
            .as_ref()
            .ok_or_else(|| CoreError::MissingCredential {
                wallet: self.id.clone(),
                role: "admin",
            })
    }
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed development nodes).
    DangerAcceptInvalid,
}

/// Configuration for one console session against one server.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Extension root URL (e.g., `https://node.example/devicetimer`).
    pub url: Url,
    /// Wallets in display order. The first one is the default for new
    /// devices and supplies the read key.
    pub wallets: Vec<WalletCredentials>,
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Period of the server connectivity poll.
    pub status_poll_interval: Duration,
    /// Delay between a payment signal and the connectivity refresh it triggers.
    pub payment_refresh_delay: Duration,
    /// Allow the per-device real-time channel. When `false`, opening a
    /// payment dialog still works but no channel is attempted.
    pub channel_enabled: bool,
}

impl ConsoleConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            wallets: Vec::new(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            status_poll_interval: Duration::from_secs(60),
            payment_refresh_delay: Duration::from_secs(1),
            channel_enabled: true,
        }
    }

    pub fn with_wallet(mut self, wallet: WalletCredentials) -> Self {
        self.wallets.push(wallet);
        self
    }

    pub fn first_wallet(&self) -> Option<&WalletCredentials> {
        self.wallets.first()
    }

    pub fn wallet(&self, id: &str) -> Option<&WalletCredentials> {
        self.wallets.iter().find(|w| w.id == id)
    }

    /// Admin key for deleting a device owned by `owner`.
    ///
    /// Uses the owner's admin key when it has one, otherwise the first
    /// wallet's. Errors only when neither carries an admin key.
    pub(crate) fn delete_key(&self, owner: &str) -> Result<&SecretString, CoreError> {
        let first = self.first_wallet().ok_or_else(|| CoreError::Config {
            message: "no wallet configured".into(),
        })?;
        self.wallet(owner)
            .and_then(|w| w.admin_key.as_ref())
            .or(first.admin_key.as_ref())
            .ok_or_else(|| CoreError::MissingCredential {
                wallet: self.wallet(owner).unwrap_or(first).id.clone(),
                role: "admin",
            })
    }

    /// Read key of the first wallet.
    pub(crate) fn read_key(&self) -> Result<&SecretString, CoreError> {
        self.first_wallet()
            .ok_or_else(|| CoreError::Config {
                message: "no wallet configured".into(),
            })?
            .read_key()
    }
}
