// ── Channel URL dialog ──
//
// Read-only display of the endpoint a device's hardware should dial.
// Opening it never touches the console's own channel.

use paygate_api::{ApiClient, ChannelRole};
use serde::Serialize;
use url::Url;

use crate::error::CoreError;
use crate::model::{Device, DeviceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelInfoDialog {
    pub device_id: DeviceId,
    pub title: String,
    /// Hardware-role endpoint (no `type=browser` tag).
    pub hardware_url: Url,
}

impl ChannelInfoDialog {
    pub fn new(device: &Device, client: &ApiClient) -> Result<Self, CoreError> {
        Ok(Self {
            device_id: device.id.clone(),
            title: device.title.clone(),
            hardware_url: client.channel_url(device.id.as_str(), ChannelRole::Hardware)?,
        })
    }
}
