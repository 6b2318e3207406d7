// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # ildecomp
//!
//! A command-line front end for analysing .NET assemblies: decompile a single type or a
//! whole module to C#, write a buildable project, list declared entities, dump IL,
//! compute a content checksum of the decompiled project, or generate a portable PDB that
//! maps the decompiled sources back to the assembly.
//!
//! ## Architecture
//!
//! The crate is split in two layers:
//!
//! - The **command layer** decides what to do. [`app`] binds the command line,
//!   [`dispatch`] resolves the flags to exactly one operating mode, [`settings`] and
//!   [`output`] derive the decompiler settings and the output destination, and
//!   [`commands`] holds one handler per mode. [`exit`] maps the outcome to a process exit
//!   code.
//! - The **engine** does the work. [`engine`] defines the collaborator traits the handlers
//!   call and ships a native implementation on top of the PE container ([`file`]), the
//!   ECMA-335 metadata reader ([`metadata`]), the loaded module model ([`module`]) and
//!   the CIL decoder ([`disassembler`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use clap::Parser;
//! use ildecomp::{app::Invocation, dispatch, engine::Engine};
//!
//! let invocation = Invocation::parse_from(["ildecomp", "Sample.dll", "--list", "c,i"]);
//! let mut console = std::io::stdout();
//! let report = dispatch::run(&invocation, &Engine::native(), &mut console);
//! std::process::exit(i32::from(report.code.0));
//! ```
//!
//! ## Error Handling
//!
//! Everything below the command layer returns [`Result<T, Error>`](Result). The handlers
//! wrap those errors with `anyhow` context naming the file or operation that failed.
//!
//! ```rust,no_run
//! use ildecomp::{module::Module, Error};
//!
//! match Module::from_file(std::path::Path::new("Broken.dll")) {
//!     Ok(module) => println!("Loaded {}", module.name),
//!     Err(Error::NotSupported) => println!("File format not supported"),
//!     Err(Error::Malformed { message, .. }) => println!("Malformed file: {}", message),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Standards Compliance
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Official CLI specification
//! - [Portable PDB v1.0](https://github.com/dotnet/runtime/blob/main/docs/design/specs/PortablePdb-Metadata.md) - Debug symbol format
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// PE container access: mapped or in-memory images, debug directory, byte parsing helpers
pub mod file;

/// CIL instruction decoding based on ECMA-335 Partition III
pub mod disassembler;

/// ECMA-335 metadata: header, streams, tables, signatures, type system and writers
pub mod metadata;

/// A loaded .NET module with its resolved declarations
pub mod module;

/// Collaborator traits and the native decompilation engine
pub mod engine;

/// Command-line surface
pub mod app;

/// Mode handlers
pub mod commands;

/// Mode selection and dispatch
pub mod dispatch;

/// Exit codes and reports
pub mod exit;

/// Output routing
pub mod output;

/// Settings derived from the command line
pub mod settings;

/// `ildecomp` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `ildecomp` Error type
///
/// The error type of the engine layer: container parsing, metadata decoding, rendering and
/// symbol loading.
pub use error::Error;

/// Cursor over metadata blobs and method bodies.
pub use file::parser::Parser;

/// A loaded PE image.
pub use file::File;
