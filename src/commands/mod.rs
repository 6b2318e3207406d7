//! Mode handlers.
//!
//! Every handler receives a [`CommandContext`] and the console, runs one operating mode to
//! completion and reports a [`Status`](crate::exit::Status). Failures propagate as
//! `anyhow` errors with the file or operation attached as context.

pub mod common;
pub mod decompile;
pub mod il;
pub mod list;
pub mod pdbgen;
pub mod project;
pub mod version;

use std::path::Path;

use crate::{app::Invocation, engine::{DecompilerSettings, Engine}, output::OutputRoute};

/// What a handler works with.
pub struct CommandContext<'a> {
    /// The parsed command line
    pub invocation: &'a Invocation,
    /// The input assembly
    pub input: &'a Path,
    /// Settings of this run
    pub settings: &'a DecompilerSettings,
    /// Where the results go
    pub route: OutputRoute,
    /// The engine collaborators
    pub engine: &'a Engine,
}
