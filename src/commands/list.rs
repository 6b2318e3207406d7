//! Entity listing.

use std::io::Write;

use anyhow::Context;

use crate::{
    commands::{common::load_module, CommandContext},
    exit::Status,
    metadata::typesystem::strip_arity,
    output::OutputTarget,
};

/// Write `<Kind> <FullName>` for every top-level type of a selected kind, in declaration
/// order.
pub fn run(context: &CommandContext, console: &mut dyn Write) -> anyhow::Result<Status> {
    let kinds = context.invocation.entity_kinds();
    let module = load_module(context)?;

    let mut out = OutputTarget::open(&context.route, console).context("failed to open the list output")?;
    for definition in module.top_level_types().filter(|definition| kinds.contains(&definition.kind)) {
        writeln!(out, "{} {}", definition.kind, strip_arity(&definition.reflection_name()))?;
    }
    out.finish()?;
    Ok(Status::Success)
}
