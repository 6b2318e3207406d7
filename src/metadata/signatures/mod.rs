//! Signature blobs.
//!
//! Method, field and type signatures are stored in the `#Blob` heap as a compact
//! prefix encoding of `ELEMENT_TYPE_*` codes, compressed integers and compressed type
//! tokens. [`SignatureParser`] decodes them into [`TypeSignature`] trees. Names are
//! resolved later by the type system, which knows the module's `TypeDef`, `TypeRef` and
//! `TypeSpec` tables.
//!
//! Custom modifiers (`modreq`/`modopt`) are consumed and dropped; none of the renderers
//! print them.
//!
//! # Reference
//! - [ECMA-335 II.23.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

mod parser;
mod types;

pub use parser::SignatureParser;
pub use types::*;
