//! Error types for the ildecomp engine.
//!
//! Everything below the command layer reports failures through [`Error`]. The command
//! layer wraps these into `anyhow` errors with context naming the file or operation that
//! failed, and the dispatcher maps whatever escapes into a process exit code.
//!
//! # Error Categories
//!
//! - **Container errors** - [`Error::Malformed`], [`Error::OutOfBounds`], [`Error::Empty`],
//!   [`Error::NotSupported`] and [`Error::GoblinErr`] cover PE and metadata parsing
//! - **I/O errors** - [`Error::FileError`] and [`Error::XmlError`] wrap failures while
//!   reading inputs or writing outputs
//! - **Engine errors** - [`Error::TypeNotFound`], [`Error::InvalidSymbols`],
//!   [`Error::RecursionLimit`] and [`Error::Cancelled`]

use std::path::PathBuf;

use thiserror::Error;

/// The generic Error type, which provides coverage for all errors this library can
/// potentially return.
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// Created through `malformed_error!`, which records the source location that
    /// detected the problem.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The input is a valid PE file, but not a .NET assembly.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Other errors that don't fit other categories.
    #[error("{0}")]
    Error(String),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// Error while writing the project file.
    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    /// A type requested by name does not exist in the module.
    #[error("Type '{0}' was not found in the module")]
    TypeNotFound(String),

    /// A symbol file could not be used for the module.
    #[error("Cannot use symbols from '{}': {reason}", path.display())]
    InvalidSymbols {
        /// Path of the rejected symbol file
        path: PathBuf,
        /// Why the file was rejected
        reason: String,
    },

    /// Reached the maximum recursion level allowed - {0}
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// The operation was cancelled through its cancellation token.
    #[error("The operation was cancelled")]
    Cancelled,
}
