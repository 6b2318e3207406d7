use crate::metadata::token::Token;

/// `ELEMENT_TYPE_*` constants of signature blobs (ECMA-335 II.23.1.16)
#[allow(non_snake_case, missing_docs)]
pub mod ELEMENT_TYPE {
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    pub const PTR: u8 = 0x0f;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1b;
    pub const OBJECT: u8 = 0x1c;
    pub const SZARRAY: u8 = 0x1d;
    pub const MVAR: u8 = 0x1e;
    pub const CMOD_REQD: u8 = 0x1f;
    pub const CMOD_OPT: u8 = 0x20;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
}

/// A decoded type signature.
#[derive(Debug, Clone, PartialEq, Default)]
#[allow(missing_docs)]
pub enum TypeSignature {
    #[default]
    Unknown,
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    String,
    /// Unmanaged pointer to the inner type
    Ptr(Box<TypeSignature>),
    /// Managed reference to the inner type
    ByRef(Box<TypeSignature>),
    /// A value type, as `TypeDef`, `TypeRef` or `TypeSpec` token
    ValueType(Token),
    /// A reference type, as `TypeDef`, `TypeRef` or `TypeSpec` token
    Class(Token),
    /// Generic parameter of the enclosing type (`!n`)
    GenericParamType(u32),
    /// General multi-dimensional array
    Array(SignatureArray),
    /// Instantiation of a generic type with type arguments
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    TypedByRef,
    /// Native signed integer
    I,
    /// Native unsigned integer
    U,
    /// Function pointer
    FnPtr(Box<SignatureMethod>),
    Object,
    /// Single-dimensional, zero-based array
    SzArray(Box<TypeSignature>),
    /// Generic parameter of the enclosing method (`!!n`)
    GenericParamMethod(u32),
    /// Pinned local variable type
    Pinned(Box<TypeSignature>),
}

/// A general array shape.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureArray {
    /// Element type
    pub base: Box<TypeSignature>,
    /// Number of dimensions
    pub rank: u32,
}

/// A method parameter or return type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureParameter {
    /// Passed by reference (`ref`/`out`)
    pub by_ref: bool,
    /// The parameter type
    pub base: TypeSignature,
}

/// A method signature (`MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureMethod {
    /// Instance method (`HASTHIS`)
    pub has_this: bool,
    /// Explicit `this` parameter (`EXPLICITTHIS`)
    pub explicit_this: bool,
    /// Variable argument list (`VARARG`)
    pub vararg: bool,
    /// Number of generic parameters, 0 for non-generic methods
    pub param_count_generic: u32,
    /// The return type
    pub return_type: SignatureParameter,
    /// The fixed parameters
    pub params: Vec<SignatureParameter>,
}

/// A field signature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureField {
    /// The field type
    pub base: TypeSignature,
}
