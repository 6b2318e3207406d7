//! Single-file decompilation of the module or one type.

use std::io::Write;

use anyhow::Context;

use crate::{
    commands::{
        common::{debug_info, load_module, resolver},
        CommandContext,
    },
    engine::DecompileContext,
    exit::Status,
    metadata::typesystem::FullTypeName,
    output::OutputTarget,
};

/// Decompile the module, or the type named with `--type`, as one C# text.
pub fn run(context: &CommandContext, console: &mut dyn Write) -> anyhow::Result<Status> {
    let module = load_module(context)?;
    let resolver = resolver(context, &module);
    let debug_info = debug_info(context, &module)?;
    let decompile_context = DecompileContext {
        module: &module,
        settings: context.settings,
        resolver: resolver.as_ref(),
        debug_info: debug_info.as_ref(),
    };

    let decompiler = context.engine.decompiler.as_ref();
    let source = match &context.invocation.type_name {
        Some(name) => decompiler
            .decompile_type(&decompile_context, &FullTypeName::new(name))
            .with_context(|| format!("failed to decompile type {name}"))?,
        None => decompiler
            .decompile_module(&decompile_context)
            .with_context(|| format!("failed to decompile {}", context.input.display()))?,
    };

    let mut out = OutputTarget::open(&context.route, console).context("failed to open the output")?;
    out.write_all(source.text.as_bytes())?;
    out.finish()?;
    Ok(Status::Success)
}
