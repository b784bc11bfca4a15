//! Command dispatch: bridges CLI args to the console and output formatting.

pub mod catalog;
pub mod config_cmd;
pub mod devices;
pub mod status;
pub mod util;
pub mod watch;

use paygate_core::Console;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, console: &Console, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(console, args, global).await,
        Command::Status(args) => status::handle(console, &args, global).await,
        Command::Watch(args) => watch::handle(console, &args, global).await,
        Command::Wallets => status::wallets(console, global).await,
        Command::Timezones => catalog::timezones(console, global).await,
        Command::Currencies => catalog::currencies(console, global).await,
        // Handled before a console is built
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not need a server connection".into(),
        )),
    }
}
