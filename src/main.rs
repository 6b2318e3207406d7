use std::{
    io::{self, Write},
    process::ExitCode,
};

use clap::Parser;
use ildecomp::{
    app::{normalize_args, Invocation},
    dispatch,
    engine::Engine,
};

fn main() -> ExitCode {
    let invocation = Invocation::parse_from(normalize_args(std::env::args_os()));

    // ildecomp info+ on stderr; --verbose enables debug; RUST_LOG overrides
    let level = if invocation.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("ildecomp", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let stdout = io::stdout();
    let mut console = stdout.lock();
    let report = dispatch::run(&invocation, &Engine::native(), &mut console);
    let _ = console.flush();

    if let Some(error) = &report.error {
        eprintln!("{error}");
    }
    report.code.into()
}
