//! Version report.

use std::io::Write;

use crate::{commands::CommandContext, exit::Status};

/// Version of the command-line front end.
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Print the front end and engine versions.
pub fn run(context: &CommandContext, console: &mut dyn Write) -> anyhow::Result<Status> {
    writeln!(console, "ildecomp: {CLI_VERSION}")?;
    writeln!(console, "ildecomp engine: {}", context.engine.version)?;
    Ok(Status::Success)
}
