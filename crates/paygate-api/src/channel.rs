//! Per-device real-time channel.
//!
//! The server exposes one WebSocket endpoint per device. Hardware connects
//! to it to receive payment triggers; the console connects with the
//! `browser` role (which the server does not count as hardware presence) to
//! learn that a payment just happened. Inbound frames carry no structure the
//! console relies on: any text frame is a "payment received" signal.
//!
//! Unlike a long-lived event feed this channel does not reconnect on its
//! own. The stream ends after the first close or failure and the owner
//! decides whether to reopen.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//! use paygate_api::channel::{self, ChannelEvent, ChannelRole};
//! use tokio_util::sync::CancellationToken;
//!
//! let url = channel::channel_url(&base, "dev1", ChannelRole::Browser)?;
//! let mut events = channel::connect(url, CancellationToken::new());
//! while let Some(event) = events.next().await {
//!     if let ChannelEvent::Message(_) = event {
//!         println!("payment received");
//!     }
//! }
//! ```

use futures_util::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::{ApiClient, push_ids};
use crate::error::Error;

// ── Endpoint ─────────────────────────────────────────────────────────

/// Who is on the other end of the channel, as reported to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// The operator console. Tagged with `?type=browser` so the server does
    /// not list the device as hardware-connected.
    Browser,
    /// The device controller itself. This is the URL operators copy into
    /// firmware configuration.
    Hardware,
}

/// Build the channel endpoint for a device from the extension root URL.
///
/// `http` maps to `ws` and `https` to `wss`; host, port and path prefix are
/// preserved.
pub fn channel_url(base: &Url, device_id: &str, role: ChannelRole) -> Result<Url, Error> {
    if device_id.is_empty() || device_id.contains('/') {
        return Err(Error::ChannelConnect(format!(
            "invalid device id for channel endpoint: {device_id:?}"
        )));
    }

    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(Error::ChannelConnect(format!(
                "unsupported scheme for channel endpoint: {other}"
            )));
        }
    };
    let host = base
        .host_str()
        .ok_or_else(|| Error::ChannelConnect(format!("no host in {base}")))?;
    let prefix = base.path().trim_end_matches('/');
    let authority = match base.port() {
        Some(p) => format!("{host}:{p}"),
        None => host.to_owned(),
    };

    let mut url = Url::parse(&format!("{scheme}://{authority}{prefix}/api/v1/ws"))?;
    push_ids(&mut url, &[device_id])?;
    if role == ChannelRole::Browser {
        url.set_query(Some("type=browser"));
    }
    Ok(url)
}

impl ApiClient {
    /// Channel endpoint for a device, derived from this client's root URL.
    pub fn channel_url(&self, device_id: &str, role: ChannelRole) -> Result<Url, Error> {
        channel_url(self.base_url(), device_id, role)
    }
}

// ── Events ───────────────────────────────────────────────────────────

/// Lifecycle and payload events produced by [`connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Handshake completed.
    Opened,
    /// Inbound text frame. The console treats any message as a payment signal.
    Message(String),
    /// Channel closed: remote close frame, stream end, or local cancellation.
    Closed { code: Option<u16>, reason: String },
    /// Handshake or read failure. Always the last event.
    Failed(String),
}

impl ChannelEvent {
    /// `true` for events after which the stream yields nothing more.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed { .. } | Self::Failed(_))
    }
}

/// Boxed event stream returned by [`connect`].
pub type ChannelStream = BoxStream<'static, ChannelEvent>;

// ── Connection lifecycle ─────────────────────────────────────────────

enum Step {
    Cancelled,
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

/// Open a channel and stream its events.
///
/// The handshake runs lazily on first poll. The stream always ends with
/// exactly one terminal event ([`ChannelEvent::Closed`] or
/// [`ChannelEvent::Failed`]). Cancelling `cancel` sends a close frame when
/// the socket is up and yields `Closed`.
pub fn connect(url: Url, cancel: CancellationToken) -> ChannelStream {
    async_stream::stream! {
        tracing::info!(url = %url, "opening device channel");

        let handshake = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = tokio_tungstenite::connect_async(url.as_str()) => Some(result),
        };

        let ws_stream = match handshake {
            None => {
                yield ChannelEvent::Closed { code: None, reason: "cancelled".into() };
                return;
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "device channel handshake failed");
                yield ChannelEvent::Failed(e.to_string());
                return;
            }
            Some(Ok((ws_stream, _response))) => ws_stream,
        };

        tracing::info!("device channel open");
        yield ChannelEvent::Opened;

        let (mut write, mut read) = ws_stream.split();

        loop {
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => Step::Cancelled,
                frame = read.next() => Step::Frame(frame),
            };

            match step {
                Step::Cancelled => {
                    let _ = write.send(Message::Close(None)).await;
                    yield ChannelEvent::Closed { code: None, reason: "closed by console".into() };
                    break;
                }
                Step::Frame(Some(Ok(Message::Text(text)))) => {
                    tracing::debug!(len = text.len(), "device channel message");
                    yield ChannelEvent::Message(text.as_str().to_owned());
                }
                Step::Frame(Some(Ok(Message::Close(frame)))) => {
                    let (code, reason) = frame.map_or((None, String::new()), |cf| {
                        (Some(u16::from(cf.code)), cf.reason.as_str().to_owned())
                    });
                    tracing::info!(?code, %reason, "device channel close frame received");
                    yield ChannelEvent::Closed { code, reason };
                    break;
                }
                Step::Frame(Some(Err(e))) => {
                    tracing::warn!(error = %e, "device channel read failed");
                    yield ChannelEvent::Failed(e.to_string());
                    break;
                }
                Step::Frame(None) => {
                    tracing::info!("device channel stream ended");
                    yield ChannelEvent::Closed { code: None, reason: String::new() };
                    break;
                }
                Step::Frame(Some(Ok(_))) => {
                    // Binary, Ping, Pong, Frame: tungstenite answers pings itself.
                }
            }
        }
    }
    .boxed()
}

// ── Tests ────────────────────────────────────────────────────────────
