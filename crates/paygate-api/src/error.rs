use thiserror::Error;

/// Top-level error type for the `paygate-api` crate.
///
/// Covers every failure mode across the REST surface and the real-time
/// channel. `paygate-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The server rejected the wallet key (HTTP 401/403).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// An id that cannot stand as a single path segment.
    #[error("Invalid id for request path: {0:?}")]
    InvalidId(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success HTTP status. `message` carries the server's `detail`
    /// field when the body has one.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Channel ─────────────────────────────────────────────────────
    /// Real-time channel could not be established.
    #[error("Channel connection failed: {0}")]
    ChannelConnect(String),

    /// Real-time channel closed by the remote with an error code.
    #[error("Channel closed (code {code}): {reason}")]
    ChannelClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the server refused the credential.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::Authentication { .. } => true,
            Self::Api { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => matches!(status, 502..=504),
            Self::ChannelConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status code, if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_status_classification() {
        let not_found = Error::Api {
            status: 404,
            message: "Lnurldevice does not exist.".into(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_transient());
        assert_eq!(not_found.status(), Some(404));

        let forbidden = Error::Api {
            status: 403,
            message: "Invalid adminkey.".into(),
        };
        assert!(forbidden.is_auth_error());

        let gateway = Error::Api {
            status: 502,
            message: String::new(),
        };
        assert!(gateway.is_transient());
    }

    #[test]
    fn channel_connect_is_transient() {
        assert!(Error::ChannelConnect("refused".into()).is_transient());
        assert!(
            !Error::ChannelClosed {
                code: 1011,
                reason: "internal".into()
            }
            .is_transient()
        );
    }
}
