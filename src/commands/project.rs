//! Whole-project decompilation and checksum runs.

use std::{fs, io::Write, time::Instant};

use anyhow::{bail, Context};

use crate::{
    commands::{
        common::{debug_info, file_display_name, load_module, resolver},
        CommandContext,
    },
    engine::{checksum::ChecksumCalculator, DecompileContext},
    exit::Status,
    output::OutputRoute,
};

/// Decompile the input as a project, printing progress when `whole_project` is set and the
/// checksum when one is enabled.
pub fn run(context: &CommandContext, whole_project: bool, console: &mut dyn Write) -> anyhow::Result<Status> {
    let OutputRoute::Directory(directory) = &context.route else {
        bail!("project output needs a directory, got {:?}", context.route);
    };
    let file = file_display_name(context.input);

    if whole_project {
        fs::create_dir_all(directory)
            .with_context(|| format!("failed to create output directory: {}", directory.display()))?;
        write!(console, "Decompiling {file}... ")?;
        console.flush()?;
    }

    let started = Instant::now();
    let module = load_module(context)?;
    let resolver = resolver(context, &module);
    let debug_info = debug_info(context, &module)?;

    let mut checksum = ChecksumCalculator::new(&context.settings.checksum)
        .context("failed to create the checksum log")?;
    let decompile_context = DecompileContext {
        module: &module,
        settings: context.settings,
        resolver: resolver.as_ref(),
        debug_info: debug_info.as_ref(),
    };
    context
        .engine
        .project
        .decompile_project(&decompile_context, directory, checksum.as_mut())
        .with_context(|| format!("failed to decompile {} into {}", file, directory.display()))?;

    if whole_project {
        writeln!(console, "ok.")?;
        writeln!(console, "Used time: {:.2} sec", started.elapsed().as_secs_f64())?;
    }

    if let Some(checksum) = checksum {
        let hash = checksum.finish().context("failed to finish the checksum log")?;
        writeln!(console, "'{file}' checksum:")?;
        writeln!(console, "    '{hash}'")?;
    }
    Ok(Status::Success)
}
