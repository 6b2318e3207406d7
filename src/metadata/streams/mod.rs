//! Metadata streams.
//!
//! - **`#~` / `#-`** - the metadata tables, see [`TablesHeader`]
//! - **`#Strings`** - null-terminated UTF-8 identifiers, see [`Strings`]
//! - **`#Blob`** - length-prefixed binary data such as signatures, see [`Blob`]
//! - **`#GUID`** - 16-byte GUIDs addressed by 1-based index, see [`Guid`]
//! - **`#US`** - UTF-16 string literals loaded by `ldstr`, see [`UserStrings`]
//!
//! The `#Pdb` stream of portable PDBs is handled by the symbol reader.
//!
//! # References
//! - ECMA-335 6th Edition, Partition II, Section 24.2.2 - Stream Headers

mod blob;
mod guid;
mod streamheader;
mod strings;
mod tablesheader;
mod userstrings;

pub use blob::Blob;
pub use guid::Guid;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tablesheader::TablesHeader;
pub use userstrings::UserStrings;
