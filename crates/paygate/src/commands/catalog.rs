//! Server-provided choice lists for the device form.

use tabled::Tabled;

use paygate_core::Console;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct TimezoneRow {
    #[tabled(rename = "Timezone")]
    name: String,
}

#[derive(Tabled)]
struct CurrencyRow {
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
}

pub async fn timezones(console: &Console, global: &GlobalOpts) -> Result<(), CliError> {
    let zones = console.timezones().await;
    let out = output::render_list(
        global.output,
        &zones,
        |z| TimezoneRow { name: z.clone() },
        Clone::clone,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn currencies(console: &Console, global: &GlobalOpts) -> Result<(), CliError> {
    let currencies = console.currencies().await;
    let out = output::render_list(
        global.output,
        &currencies,
        |c| CurrencyRow {
            code: c.code().to_owned(),
            kind: if c.is_fiat() { "fiat" } else { "sats" },
        },
        |c| c.code().to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
