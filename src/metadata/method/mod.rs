//! Method attributes, body headers and exception clauses.
//!
//! # Key Types
//! - [`MethodAccessFlags`], [`MethodModifiers`]: `MethodDef.Flags` split into access and modifiers
//! - [`MethodImplFlags`]: `MethodDef.ImplFlags`
//! - [`MethodBody`]: tiny and fat method bodies with their IL code
//! - [`ExceptionHandler`]: exception handling clauses of a fat body

mod body;

use bitflags::bitflags;

pub use body::MethodBody;

/// Mask of the member access bits in `MethodDef.Flags` and `Field.Flags`.
pub const MEMBER_ACCESS_MASK: u16 = 0x0007;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Member access, the low three bits of method and field flags
    pub struct MethodAccessFlags: u16 {
        /// Member not referenceable
        const COMPILER_CONTROLLED = 0x0000;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in the assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by sub-types anywhere, plus anyone in the assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
    }
}

impl MethodAccessFlags {
    /// Extract the access bits from raw member flags.
    #[must_use]
    pub fn from_member_flags(flags: u16) -> Self {
        Self::from_bits_truncate(flags & MEMBER_ACCESS_MASK)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Method modifiers, the remaining bits of `MethodDef.Flags`
    pub struct MethodModifiers: u16 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method may not be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method can only be overridden if also accessible
        const STRICT = 0x0200;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// Runtime checks the name encoding
        const RTSPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
        /// Method has security associated with it
        const HAS_SECURITY = 0x4000;
        /// Method calls another method containing security code
        const REQUIRE_SEC_OBJECT = 0x8000;
    }
}

impl MethodModifiers {
    /// Extract the modifier bits from raw method flags.
    #[must_use]
    pub fn from_method_flags(flags: u16) -> Self {
        Self::from_bits_truncate(flags & !MEMBER_ACCESS_MASK)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Method implementation flags, `MethodDef.ImplFlags`
    pub struct MethodImplFlags: u16 {
        /// Implementation is native code
        const NATIVE = 0x0001;
        /// Implementation is provided by the runtime
        const RUNTIME = 0x0003;
        /// Implementation is unmanaged
        const UNMANAGED = 0x0004;
        /// Method cannot be inlined
        const NO_INLINING = 0x0008;
        /// Method is single threaded through the body
        const SYNCHRONIZED = 0x0020;
        /// Signature is exported exactly as declared
        const PRESERVE_SIG = 0x0080;
        /// Implementation is internal to the runtime
        const INTERNAL_CALL = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Method body header flags
    pub struct MethodBodyFlags: u16 {
        /// Tiny header
        const TINY_FORMAT = 0x2;
        /// Fat header
        const FAT_FORMAT = 0x3;
        /// Extra data sections follow the code
        const MORE_SECTS = 0x8;
        /// Zero-initialize locals
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Method data section flags
    pub struct SectionFlags: u8 {
        /// Exception handling table
        const EHTABLE = 0x1;
        /// Reserved
        const OPT_ILTABLE = 0x2;
        /// Fat section layout
        const FAT_FORMAT = 0x40;
        /// Another section follows
        const MORE_SECTS = 0x80;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Exception clause kinds
    pub struct ExceptionHandlerFlags: u16 {
        /// Typed exception clause
        const EXCEPTION = 0x0000;
        /// Exception filter and handler clause
        const FILTER = 0x0001;
        /// Finally clause
        const FINALLY = 0x0002;
        /// Fault clause
        const FAULT = 0x0004;
    }
}

/// One exception handling clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// Clause kind
    pub flags: ExceptionHandlerFlags,
    /// Offset of the protected block
    pub try_offset: u32,
    /// Length of the protected block
    pub try_length: u32,
    /// Offset of the handler
    pub handler_offset: u32,
    /// Length of the handler
    pub handler_length: u32,
    /// Catch type token for typed clauses, filter offset for filter clauses
    pub class_token_or_filter: u32,
}

impl ExceptionHandler {
    /// The ILAsm keyword of this clause kind.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        if self.flags.contains(ExceptionHandlerFlags::FINALLY) {
            "finally"
        } else if self.flags.contains(ExceptionHandlerFlags::FAULT) {
            "fault"
        } else if self.flags.contains(ExceptionHandlerFlags::FILTER) {
            "filter"
        } else {
            "catch"
        }
    }
}
