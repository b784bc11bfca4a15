//! Device command handlers.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tabled::Tabled;
use tokio::sync::broadcast::error::RecvError;

use paygate_api::ChannelRole;
use paygate_core::tracker::status_text;
use paygate_core::{
    ChannelState, Connectivity, Console, Currency, Device, DeviceDraft, DeviceId, LinkStatus,
    PaymentView, Switch, SwitchId, TrackerEvent,
};

use crate::cli::{DeviceFields, DevicesArgs, DevicesCommand, GlobalOpts, OutputFormat, SwitchSpec};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Wallet")]
    wallet: String,
    #[tabled(rename = "Currency")]
    currency: String,
    #[tabled(rename = "Hours")]
    hours: String,
    #[tabled(rename = "Switches")]
    switches: usize,
    #[tabled(rename = "Link")]
    link: String,
}

#[derive(Tabled)]
struct SwitchRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "GPIO")]
    gpio: String,
}

/// A device as listed: the record plus its link status.
#[derive(Serialize)]
struct ListedDevice {
    #[serde(flatten)]
    device: Arc<Device>,
    link: LinkStatus,
}

fn device_row(listed: &ListedDevice, color: bool) -> DeviceRow {
    let d = &listed.device;
    DeviceRow {
        id: d.id.to_string(),
        title: d.title.clone(),
        wallet: d.wallet.clone(),
        currency: d.currency.to_string(),
        hours: d.hours(),
        switches: d.switch_count(),
        link: output::paint_link(listed.link, color),
    }
}

fn switch_rows(device: &Device) -> Vec<SwitchRow> {
    device
        .switches
        .iter()
        .enumerate()
        .map(|(i, sw)| SwitchRow {
            position: i + 1,
            id: sw.id.as_ref().map_or_else(|| "-".into(), ToString::to_string),
            label: sw.display_label(i + 1),
            amount: format!("{} {}", sw.amount, device.currency),
            gpio: format!("pin {} / {} ms", sw.gpio_pin, sw.gpio_duration),
        })
        .collect()
}

fn detail(d: &Arc<Device>, link: LinkStatus, color: bool) -> String {
    let mut lines = vec![
        format!("ID:         {}", d.id),
        format!("Title:      {}", d.title),
        format!("Wallet:     {}", d.wallet),
        format!("Currency:   {}", d.currency),
        format!("Timezone:   {}", d.timezone),
        format!("Hours:      {}", d.hours()),
        format!("Timeout:    {}s", d.timeout),
        format!(
            "Max/day:    {}",
            if d.maxperday == 0 {
                "unlimited".to_owned()
            } else {
                d.maxperday.to_string()
            }
        ),
        format!("Link:       {}", output::paint_link(link, color)),
    ];
    if let Some(url) = &d.closed_url {
        lines.push(format!("Closed URL: {url}"));
    }
    if let Some(url) = &d.wait_url {
        lines.push(format!("Wait URL:   {url}"));
    }
    if !d.switches.is_empty() {
        lines.push(String::new());
        lines.push(output::render_table(&switch_rows(d)));
    }
    lines.join("\n")
}

fn payment_detail(p: &PaymentView) -> String {
    [
        format!("Device:  {} ({})", p.device_title, p.device_id),
        format!("Switch:  {} ({})", p.label, p.switch_id),
        format!("Amount:  {} {}", p.amount, p.currency),
        format!("LNURL:   {}", p.lnurl),
        format!("QR code: {}", p.qrcode_url),
    ]
    .join("\n")
}

// ── Draft input ─────────────────────────────────────────────────────

/// Device fields read from `--from-file`. Absent keys keep the draft value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeviceFile {
    title: Option<String>,
    wallet: Option<String>,
    currency: Option<String>,
    timezone: Option<String>,
    available_start: Option<String>,
    available_stop: Option<String>,
    timeout: Option<u64>,
    maxperday: Option<u32>,
    closed_url: Option<String>,
    wait_url: Option<String>,
    switches: Option<Vec<Switch>>,
}

impl DeviceFile {
    fn load(path: &Path) -> Result<Self, CliError> {
        util::read_json_file(path)
    }

    fn apply(self, draft: &mut DeviceDraft) {
        if let Some(v) = self.title {
            draft.title = v;
        }
        if let Some(v) = self.wallet {
            draft.wallet = Some(v);
        }
        if let Some(v) = self.currency {
            draft.currency = Currency::from(v);
        }
        if let Some(v) = self.timezone {
            draft.timezone = v;
        }
        if let Some(v) = self.available_start {
            draft.available_start = v;
        }
        if let Some(v) = self.available_stop {
            draft.available_stop = v;
        }
        if let Some(v) = self.timeout {
            draft.timeout = v;
        }
        if let Some(v) = self.maxperday {
            draft.maxperday = v;
        }
        if self.closed_url.is_some() {
            draft.closed_url = self.closed_url;
        }
        if self.wait_url.is_some() {
            draft.wait_url = self.wait_url;
        }
        if let Some(switches) = self.switches {
            draft.switches = switches;
        }
    }
}

/// Merge file contents, then flags, over the open draft.
fn apply_fields(draft: &mut DeviceDraft, fields: DeviceFields, file: Option<DeviceFile>) {
    if let Some(file) = file {
        file.apply(draft);
    }
    if let Some(v) = fields.title {
        draft.title = v;
    }
    if let Some(v) = fields.wallet {
        draft.wallet = Some(v);
    }
    if let Some(v) = fields.currency {
        draft.currency = Currency::from(v);
    }
    if let Some(v) = fields.timezone {
        draft.timezone = v;
    }
    if let Some(v) = fields.start {
        draft.available_start = v;
    }
    if let Some(v) = fields.stop {
        draft.available_stop = v;
    }
    if let Some(v) = fields.timeout {
        draft.timeout = v;
    }
    if let Some(v) = fields.max_per_day {
        draft.maxperday = v;
    }
    if fields.closed_url.is_some() {
        draft.closed_url = fields.closed_url;
    }
    if fields.wait_url.is_some() {
        draft.wait_url = fields.wait_url;
    }
    for spec in fields.switches {
        let position = draft.add_switch();
        if let Some(sw) = draft.switches.last_mut() {
            apply_switch_spec(sw, spec, position);
        }
    }
}

fn apply_switch_spec(sw: &mut Switch, spec: SwitchSpec, position: usize) {
    sw.amount = spec.amount;
    sw.gpio_pin = spec.pin;
    sw.gpio_duration = spec.duration_ms;
    sw.label = Some(spec.label.unwrap_or_else(|| format!("Switch {position}")));
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    console: &Console,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut notices = console.notices();
    let result = run(console, args, global).await;
    util::drain_notices(&mut notices, global);
    result
}

#[allow(clippy::too_many_lines)]
async fn run(console: &Console, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);

    match args.command {
        DevicesCommand::List { wallet, filter } => {
            console.reload_devices().await?;
            if let Err(e) = console.refresh_connectivity().await {
                tracing::warn!(error = %e, "connectivity unavailable, listing all as offline");
            }
            let view = console.view(&util::view_query(wallet.as_deref(), filter.as_deref()));
            let connectivity = console.connectivity();
            let listed = listed(&view.visible, &connectivity);

            let mut out = output::render_list(
                global.output,
                &listed,
                |l| device_row(l, color),
                |l| l.device.id.to_string(),
            )?;
            if global.output == OutputFormat::Table {
                let t = view.totals;
                out.push_str(&format!(
                    "\n{} devices, {} switches, {} connected, {} offline",
                    t.devices, t.switches, t.connected, t.offline
                ));
            }
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let id = DeviceId::from(device);
            let device = console.fetch_device(&id).await?;
            if let Err(e) = console.refresh_connectivity().await {
                tracing::warn!(error = %e, "connectivity unavailable");
            }
            let link = console.connectivity().link_status(&id);
            let out = output::render_single(
                global.output,
                &device,
                |d| detail(d, link, color),
                |d| d.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Create { mut fields } => {
            let file = fields.from_file.take().map(|p| DeviceFile::load(&p)).transpose()?;
            console.open_device_editor(None)?;
            console.edit_draft(|draft| apply_fields(draft, fields, file))?;
            let saved = submit(console).await?;
            print_saved(&saved, global, color)
        }

        DevicesCommand::Update {
            device,
            mut fields,
            clear_switches,
        } => {
            let file = fields.from_file.take().map(|p| DeviceFile::load(&p)).transpose()?;
            let id = DeviceId::from(device);
            console.fetch_device(&id).await?;
            console.open_device_editor(Some(&id))?;
            console.edit_draft(|draft| {
                if clear_switches {
                    draft.switches.clear();
                }
                apply_fields(draft, fields, file);
            })?;
            let saved = submit(console).await?;
            print_saved(&saved, global, color)
        }

        DevicesCommand::Delete { device } => {
            let id = DeviceId::from(device);
            console.fetch_device(&id).await?;
            let dialog = console.delete_device(&id)?;
            if !util::confirm(&dialog.prompt(), "devices delete", global.yes)? {
                console.cancel_delete();
                return Ok(());
            }
            // Success is reported through the console's notice.
            console.confirm_delete_device().await?;
            Ok(())
        }

        DevicesCommand::Qr {
            device,
            switch,
            once,
            no_follow,
        } => {
            let id = DeviceId::from(device);
            console.fetch_device(&id).await?;
            let switch = switch.map(SwitchId::from);
            let result = follow_payment(console, &id, switch.as_ref(), once, no_follow, global).await;
            console.close_qr_dialog();
            result
        }

        DevicesCommand::ChannelUrl { device } => {
            let id = DeviceId::from(device);
            console.fetch_device(&id).await?;
            let info = console.open_channel_info(&id)?;
            console.close_channel_info();
            let out = output::render_single(
                global.output,
                &info,
                |i| format!("{}\n{}", i.title, i.hardware_url),
                |i| i.hardware_url.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

fn listed(devices: &[Arc<Device>], connectivity: &Connectivity) -> Vec<ListedDevice> {
    devices
        .iter()
        .map(|d| ListedDevice {
            device: Arc::clone(d),
            link: connectivity.link_status(&d.id),
        })
        .collect()
}

/// Submit the open editor, closing it when the server refuses the draft.
async fn submit(console: &Console) -> Result<Arc<Device>, CliError> {
    match console.submit_device_editor().await {
        Ok(device) => Ok(device),
        Err(e) => {
            console.close_device_editor();
            Err(e.into())
        }
    }
}

fn print_saved(device: &Arc<Device>, global: &GlobalOpts, color: bool) -> Result<(), CliError> {
    let out = output::render_single(
        global.output,
        device,
        |d| detail(d, LinkStatus::Offline, color),
        |d| d.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Show the payment view and, unless `no_follow`, relay channel status
/// until interrupted, the first payment (`once`), or a channel failure.
async fn follow_payment(
    console: &Console,
    id: &DeviceId,
    switch: Option<&SwitchId>,
    once: bool,
    no_follow: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let mut status = console.channel_status();
    let mut events = console.channel_events();

    let view = console.open_qr_dialog(id, switch)?;
    let out = output::render_single(global.output, &view, payment_detail, |p| p.lnurl.clone())?;
    output::print_output(&out, global.quiet);

    if no_follow || !console.tracker().is_supported() {
        return Ok(());
    }
    let current = status.borrow_and_update().clone();
    if current.state == ChannelState::Errored {
        return Err(channel_failed(console, id, status_text::CHANNEL_ERROR.into()));
    }
    if let (Some(message), false) = (current.message.as_deref(), global.quiet) {
        eprintln!("{}", paint_status(current.state, message, color));
    }

    loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => return Ok(()),

            changed = status.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let current = status.borrow_and_update().clone();
                if let (Some(message), false) = (current.message.as_deref(), global.quiet) {
                    eprintln!("{}", paint_status(current.state, message, color));
                }
            }

            event = events.recv() => match event {
                Ok(TrackerEvent::PaymentReceived(paid)) if once && paid == *id => return Ok(()),
                Ok(TrackerEvent::Errored { device_id, message }) if device_id == *id => {
                    return Err(channel_failed(console, id, message));
                }
                Ok(TrackerEvent::Closed(closed)) if closed == *id => return Ok(()),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

fn channel_failed(console: &Console, id: &DeviceId, reason: String) -> CliError {
    let url = console
        .client()
        .channel_url(id.as_str(), ChannelRole::Browser)
        .map_or_else(|_| id.to_string(), |u| u.to_string());
    CliError::ConnectionFailed { url, reason }
}

fn paint_status(state: ChannelState, message: &str, color: bool) -> String {
    use owo_colors::OwoColorize;

    if !color {
        return message.to_owned();
    }
    match state {
        ChannelState::Open if message == status_text::PAYMENT_RECEIVED => {
            message.green().bold().to_string()
        }
        ChannelState::Open => message.green().to_string(),
        ChannelState::Errored => message.red().to_string(),
        _ => message.dimmed().to_string(),
    }
}
