//! ECMA-335 metadata reading.
//!
//! This module contains the metadata layer the native engine is built on: the CLR header,
//! the metadata root with its stream directory, the heaps, the tables stream and the
//! signature decoder. On top of the raw rows it provides the owned type system the
//! renderers work with.
//!
//! # Key Components
//!
//! - [`cor20header`] - The CLR header locating metadata and the entry point
//! - [`root`] - The metadata root and its stream headers
//! - [`streams`] - `#Strings`, `#Blob`, `#GUID` and the `#~` tables stream
//! - [`tables`] - Table layouts, coded indexes and raw rows
//! - [`signatures`] - Type, method and field signature decoding
//! - [`method`] - Method flags, body headers and exception clauses
//! - [`typesystem`] - Types, fields and methods of a loaded module
//! - [`identity`] - Assembly names, versions and public key tokens
//! - [`framework`] - Target framework monikers
//! - [`token`] - Metadata table row references used throughout .NET
//! - [`writer`] - Heap, table and root builders for emitted metadata images
//!
//! # Reference
//! - [ECMA-335 Partition II](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

/// Implementation of the Header of CIL
pub mod cor20header;
/// Target framework detection
pub mod framework;
/// Assembly identities
pub mod identity;
/// Implementation of the MethodHeader of CIL
pub mod method;
/// Implementation of the root metadata structure
pub mod root;
/// Implementation of method and type signatures
pub mod signatures;
/// Implementation of the metadata streams (tables and heaps)
pub mod streams;
/// Implementation of the .NET metadata tables
pub mod tables;
/// Commonly used metadata token type
pub mod token;
/// Owned type system of a loaded module
pub mod typesystem;
/// Metadata image writing
pub mod writer;
