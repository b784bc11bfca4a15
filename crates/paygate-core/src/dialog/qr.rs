// ── Payment (QR) dialog ──
//
// Shows the payment link for one saved switch. Opening the dialog is what
// binds the console's channel to the device; the console owns that side
// effect, this type only holds the view state.

use paygate_api::ApiClient;
use serde::Serialize;
use url::Url;

use crate::error::CoreError;
use crate::model::{Currency, Device, DeviceId, Switch, SwitchId};

/// What the dialog renders for the selected switch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentView {
    pub device_id: DeviceId,
    pub device_title: String,
    pub switch_id: SwitchId,
    pub label: String,
    pub amount: f64,
    pub currency: Currency,
    pub lnurl: String,
    /// Server-rendered QR image, with a cache-busting query.
    pub qrcode_url: Url,
}

/// Open payment dialog over a copy of the device.
#[derive(Debug, Clone)]
pub struct QrDialog {
    device: Device,
    payment: PaymentView,
}

impl QrDialog {
    /// Validate the request and derive the first payment view.
    ///
    /// Without `requested`, the first switch is used and must be saved.
    pub fn open(
        device: Device,
        requested: Option<&SwitchId>,
        client: &ApiClient,
        cache_buster: i64,
    ) -> Result<Self, CoreError> {
        if device.switches.is_empty() {
            return Err(CoreError::validation(format!(
                "device {:?} has no switches",
                device.title
            )));
        }
        let payment = payment_view(&device, requested, client, cache_buster)?;
        Ok(Self { device, payment })
    }

    /// Show another switch of the same device. The channel is unaffected.
    pub fn select_switch(
        &mut self,
        switch_id: &SwitchId,
        client: &ApiClient,
        cache_buster: i64,
    ) -> Result<&PaymentView, CoreError> {
        self.payment = payment_view(&self.device, Some(switch_id), client, cache_buster)?;
        Ok(&self.payment)
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device.id
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn payment(&self) -> &PaymentView {
        &self.payment
    }

    /// Switches that can be selected.
    pub fn selectable(&self) -> impl Iterator<Item = &Switch> {
        self.device.switches.iter().filter(|s| s.is_persisted())
    }
}

fn payment_view(
    device: &Device,
    requested: Option<&SwitchId>,
    client: &ApiClient,
    cache_buster: i64,
) -> Result<PaymentView, CoreError> {
    let found = match requested {
        Some(id) => device
            .switches
            .iter()
            .enumerate()
            .find(|(_, s)| s.id.as_ref() == Some(id)),
        None => device.switches.iter().enumerate().next(),
    };

    let not_saved = || {
        CoreError::validation(match requested {
            Some(id) => format!("switch {id} not found or not saved yet"),
            None => "save the device before showing a payment code".to_owned(),
        })
    };
    let (index, switch) = found.ok_or_else(not_saved)?;
    let (Some(switch_id), Some(lnurl)) = (switch.id.as_ref(), switch.lnurl.as_ref()) else {
        return Err(not_saved());
    };

    let qrcode_url = client.qrcode_url(device.id.as_str(), switch_id.as_str(), cache_buster)?;
    Ok(PaymentView {
        device_id: device.id.clone(),
        device_title: device.title.clone(),
        switch_id: switch_id.clone(),
        label: switch.display_label(index + 1),
        amount: switch.amount,
        currency: device.currency.clone(),
        lnurl: lnurl.clone(),
        qrcode_url,
    })
}
