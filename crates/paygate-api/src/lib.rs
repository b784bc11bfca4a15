// paygate-api: Async Rust client for the payment-gated device switch API (REST + real-time channel)

pub mod catalog;
pub mod channel;
pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod transport;

pub use channel::{ChannelEvent, ChannelRole, ChannelStream};
pub use client::ApiClient;
pub use error::Error;
pub use models::{ApiDevice, ApiSwitch, ConnectionStatus};
pub use transport::{TlsMode, TransportConfig};
