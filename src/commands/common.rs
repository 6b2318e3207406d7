//! Helpers shared by the mode handlers.

use std::path::Path;

use anyhow::Context;
use log::debug;

use crate::{
    app::PdbInput,
    commands::CommandContext,
    engine::{symbols::DebugInfo, AssemblyResolver, SymbolProvider},
    module::Module,
    Result,
};

/// Load the input module through the engine's loader.
pub fn load_module(context: &CommandContext) -> anyhow::Result<Module> {
    context
        .engine
        .loader
        .load(context.input)
        .with_context(|| format!("failed to load assembly: {}", context.input.display()))
}

/// Build the reference resolver for `module` from the `-r` search paths.
pub fn resolver(context: &CommandContext, module: &Module) -> Box<dyn AssemblyResolver> {
    (context.engine.resolver)(module, &context.invocation.reference_paths)
}

/// Attach symbols to `module` as requested.
///
/// Auto-discovery yields `None` when no symbol file is found; an explicit file that
/// cannot be used is an error.
///
/// # Errors
/// Returns the provider's error for unreadable, unknown or mismatched symbol files.
pub fn load_debug_info(
    module: &Module,
    input: &PdbInput,
    provider: &dyn SymbolProvider,
) -> Result<Option<DebugInfo>> {
    let info = match input {
        PdbInput::Absent => None,
        PdbInput::AutoDiscover => provider.load_symbols(module)?,
        PdbInput::Explicit(path) => Some(provider.from_file(module, path)?),
    };

    match &info {
        Some(info) => debug!("Using {}", info.description()),
        None if *input != PdbInput::Absent => debug!("No symbols found for {}", module.name),
        None => {}
    }
    Ok(info)
}

/// [`load_debug_info`] for the handler's input, with context attached.
pub fn debug_info(context: &CommandContext, module: &Module) -> anyhow::Result<Option<DebugInfo>> {
    load_debug_info(module, &context.invocation.pdb_input(), context.engine.symbols.as_ref())
        .with_context(|| format!("failed to load symbols for {}", context.input.display()))
}

/// The file name of `path` for display.
pub fn file_display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().to_string(),
    )
}
