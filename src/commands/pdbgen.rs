//! Portable PDB generation.

use std::io::Write;

use anyhow::Context;

use crate::{
    commands::{
        common::{debug_info, load_module, resolver},
        CommandContext,
    },
    engine::DecompileContext,
    exit::Status,
    output::OutputTarget,
};

/// Write a PDB matching the decompiled sources of the input.
///
/// A module without an `RSDS` CodeView debug entry cannot be correlated with a PDB; that
/// is a data error and no file is created.
pub fn run(context: &CommandContext, console: &mut dyn Write) -> anyhow::Result<Status> {
    let module = load_module(context)?;
    match module.codeview() {
        None => {
            return Ok(Status::DataError(format!(
                "Cannot create PDB file for {}, because it does not contain a PE Debug Directory Entry of type 'CodeView'.",
                context.input.display()
            )));
        }
        Some(entry) if entry.pdb_id().is_none() => {
            return Ok(Status::DataError(format!(
                "Cannot create PDB file for {}, because its CodeView debug entry is not an RSDS record.",
                context.input.display()
            )));
        }
        Some(_) => {}
    }

    let resolver = resolver(context, &module);
    let debug_info = debug_info(context, &module)?;
    let decompile_context = DecompileContext {
        module: &module,
        settings: context.settings,
        resolver: resolver.as_ref(),
        debug_info: debug_info.as_ref(),
    };

    let mut out = OutputTarget::open(&context.route, console).context("failed to create the PDB file")?;
    context
        .engine
        .pdb
        .write_pdb(&decompile_context, context.engine.decompiler.as_ref(), &mut out)
        .with_context(|| format!("failed to generate a PDB for {}", context.input.display()))?;
    out.finish()?;
    Ok(Status::Success)
}
