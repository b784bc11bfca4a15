// ── Dialog controllers ──
//
// Four independent modal state machines. Each holds a working copy taken
// when it opens; none of them hold references into the store.

mod channel_info;
mod delete;
mod editor;
mod qr;

pub use channel_info::ChannelInfoDialog;
pub use delete::DeleteDialog;
pub use editor::{
    DEFAULT_AVAILABLE_START, DEFAULT_AVAILABLE_STOP, DEFAULT_TIMEOUT_SECS, DEFAULT_TIMEZONE,
    DeviceDraft, DeviceEditor, is_valid_hhmm,
};
pub use qr::{PaymentView, QrDialog};
