// ── Core error types ──
//
// User-facing errors from paygate-core. Consumers never match on HTTP
// transport details; the `From<paygate_api::Error>` impl translates them
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out")]
    Timeout,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    // ── Local validation (no remote call was made) ───────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("No {role} key configured for wallet {wallet}")]
    MissingCredential { wallet: String, role: &'static str },

    #[error("The {dialog} dialog is not open")]
    DialogClosed { dialog: &'static str },

    // ── Real-time channel ────────────────────────────────────────────
    #[error("Real-time channel not supported")]
    ChannelUnavailable,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    /// `true` for failures detected locally, before any remote call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed { .. } | Self::MissingCredential { .. }
        )
    }

    /// `true` when the target record does not exist (locally or remotely).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. } | Self::Api {
                status: Some(404),
                ..
            }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<paygate_api::Error> for CoreError {
    fn from(err: paygate_api::Error) -> Self {
        match err {
            paygate_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            paygate_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            paygate_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            paygate_api::Error::InvalidId(id) => {
                CoreError::validation(format!("invalid device or switch id: {id:?}"))
            }
            paygate_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            paygate_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            paygate_api::Error::ChannelConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Channel connection failed: {reason}"),
            },
            paygate_api::Error::ChannelClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Channel closed (code {code}): {reason}"),
            },
            paygate_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_404_maps_to_not_found() {
        let err = CoreError::from(paygate_api::Error::Api {
            status: 404,
            message: "Lnurldevice does not exist.".into(),
        });
        assert!(err.is_not_found());
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "API error: Lnurldevice does not exist.");
    }

    #[test]
    fn auth_error_keeps_message() {
        let err = CoreError::from(paygate_api::Error::Authentication {
            message: "Invalid adminkey.".into(),
        });
        assert!(matches!(err, CoreError::AuthenticationFailed { ref message } if message == "Invalid adminkey."));
    }

    #[test]
    fn local_errors_are_validation() {
        assert!(CoreError::validation("no switches").is_validation());
        assert!(
            CoreError::MissingCredential {
                wallet: "w1".into(),
                role: "admin",
            }
            .is_validation()
        );
    }
}
