// ── Delete confirmation ──

use serde::Serialize;

use crate::model::{Device, DeviceId};

/// A staged deletion awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteDialog {
    pub device_id: DeviceId,
    pub title: String,
    /// Owning wallet; its admin key authorizes the delete.
    pub wallet: String,
    pub switch_count: usize,
}

impl DeleteDialog {
    pub fn prompt(&self) -> String {
        let noun = if self.switch_count == 1 { "switch" } else { "switches" };
        format!(
            "Delete device \"{}\" and its {} {noun}?",
            self.title, self.switch_count
        )
    }
}

impl From<&Device> for DeleteDialog {
    fn from(device: &Device) -> Self {
        Self {
            device_id: device.id.clone(),
            title: device.title.clone(),
            wallet: device.wallet.clone(),
            switch_count: device.switch_count(),
        }
    }
}
