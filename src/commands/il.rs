//! IL disassembly.

use std::io::Write;

use anyhow::Context;

use crate::{
    commands::{
        common::{debug_info, load_module},
        CommandContext,
    },
    engine::{CancellationToken, DisassemblerOptions},
    exit::Status,
    output::OutputTarget,
};

/// Write the module as ILAsm text.
pub fn run(context: &CommandContext, console: &mut dyn Write) -> anyhow::Result<Status> {
    let module = load_module(context)?;
    let debug_info = debug_info(context, &module)?;
    let options = DisassemblerOptions {
        debug_info: debug_info.as_ref(),
        show_sequence_points: context.invocation.il_sequence_points,
    };

    let mut out = OutputTarget::open(&context.route, console).context("failed to open the IL output")?;
    writeln!(out, "// IL code: {}", module.name)?;
    context
        .engine
        .disassembler
        .write_module_contents(&mut out, &module, &options, &CancellationToken::new())
        .with_context(|| format!("failed to disassemble {}", context.input.display()))?;
    out.finish()?;
    Ok(Status::Success)
}
