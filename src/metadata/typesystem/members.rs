use bitflags::bitflags;

use crate::metadata::{
    method::{MethodAccessFlags, MethodBody, MethodImplFlags, MethodModifiers},
    signatures::{SignatureMethod, TypeSignature},
    token::Token,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Field modifiers, `Field.Flags` without the access bits
    pub struct FieldAttributes: u16 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is a compile time constant
        const LITERAL = 0x0040;
        /// Reserved, field does not have to be serialized
        const NOT_SERIALIZED = 0x0080;
        /// Field has an RVA
        const HAS_FIELD_RVA = 0x0100;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime checks the name encoding
        const RTSPECIAL_NAME = 0x0400;
        /// Field has marshalling information
        const HAS_FIELD_MARSHAL = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
        /// Field has a default value
        const HAS_DEFAULT = 0x8000;
    }
}

/// A field declaration.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    /// `Field` token
    pub token: Token,
    /// Field name
    pub name: String,
    /// Raw `Field.Flags`
    pub flags: u16,
    /// Field type
    pub signature: TypeSignature,
}

impl FieldDefinition {
    /// Access bits of the field.
    #[must_use]
    pub fn access(&self) -> MethodAccessFlags {
        MethodAccessFlags::from_member_flags(self.flags)
    }

    /// Modifier bits of the field.
    #[must_use]
    pub fn attributes(&self) -> FieldAttributes {
        FieldAttributes::from_bits_truncate(self.flags)
    }

    /// Whether this is the `value__` backing field of an enum.
    #[must_use]
    pub fn is_enum_value_field(&self) -> bool {
        self.name == "value__" && self.attributes().contains(FieldAttributes::RTSPECIAL_NAME)
    }
}

/// A named parameter of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDefinition {
    /// 1-based position, 0 names the return value
    pub sequence: u16,
    /// Parameter name
    pub name: String,
    /// Raw `Param.Flags`
    pub flags: u16,
}

impl ParamDefinition {
    /// `[out]` parameter.
    pub const OUT: u16 = 0x0002;
}

/// A method declaration.
#[derive(Debug, Clone)]
pub struct MethodDefinition {
    /// `MethodDef` token
    pub token: Token,
    /// Method name
    pub name: String,
    /// Raw `MethodDef.Flags`
    pub flags: u16,
    /// Raw `MethodDef.ImplFlags`
    pub impl_flags: u16,
    /// RVA of the body, 0 if there is none
    pub rva: u32,
    /// Decoded signature
    pub signature: SignatureMethod,
    /// Named parameters from the `Param` table
    pub params: Vec<ParamDefinition>,
    /// Generic parameter names, in position order
    pub generic_params: Vec<String>,
    /// The method body, if the method has IL code
    pub body: Option<MethodBody>,
}

impl MethodDefinition {
    /// Access bits of the method.
    #[must_use]
    pub fn access(&self) -> MethodAccessFlags {
        MethodAccessFlags::from_member_flags(self.flags)
    }

    /// Modifier bits of the method.
    #[must_use]
    pub fn modifiers(&self) -> MethodModifiers {
        MethodModifiers::from_method_flags(self.flags)
    }

    /// Implementation flags of the method.
    #[must_use]
    pub fn impl_attributes(&self) -> MethodImplFlags {
        MethodImplFlags::from_bits_truncate(self.impl_flags)
    }

    /// Whether the method is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers().contains(MethodModifiers::STATIC)
    }

    /// Whether this is an instance constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == ".ctor"
    }

    /// Whether this is the type initializer.
    #[must_use]
    pub fn is_type_initializer(&self) -> bool {
        self.name == ".cctor"
    }

    /// Name of the parameter at the 0-based `index`, or a generated name if the `Param`
    /// table has none.
    #[must_use]
    pub fn param_name(&self, index: usize) -> String {
        let sequence = index + 1;
        self.params
            .iter()
            .find(|param| usize::from(param.sequence) == sequence)
            .filter(|param| !param.name.is_empty())
            .map_or_else(|| format!("P_{index}"), |param| param.name.clone())
    }

    /// Whether the parameter at the 0-based `index` is marked `[out]`.
    #[must_use]
    pub fn is_out_param(&self, index: usize) -> bool {
        self.params
            .iter()
            .any(|param| usize::from(param.sequence) == index + 1 && param.flags & ParamDefinition::OUT != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(params: Vec<ParamDefinition>) -> MethodDefinition {
        MethodDefinition {
            token: Token::new(0x0600_0001),
            name: "Run".to_string(),
            flags: 0x0096,
            impl_flags: 0,
            rva: 0,
            signature: SignatureMethod::default(),
            params,
            generic_params: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn param_names() {
        let method = method(vec![
            ParamDefinition {
                sequence: 0,
                name: String::new(),
                flags: 0,
            },
            ParamDefinition {
                sequence: 2,
                name: "count".to_string(),
                flags: ParamDefinition::OUT,
            },
        ]);

        assert_eq!(method.param_name(0), "P_0");
        assert_eq!(method.param_name(1), "count");
        assert!(method.is_out_param(1));
        assert!(!method.is_out_param(0));
        assert!(method.is_static());
        assert_eq!(method.access(), MethodAccessFlags::PUBLIC);
    }

    #[test]
    fn enum_value_field() {
        let field = FieldDefinition {
            token: Token::new(0x0400_0001),
            name: "value__".to_string(),
            flags: 0x0606,
            signature: TypeSignature::I4,
        };
        assert!(field.is_enum_value_field());
        assert!(!field.attributes().contains(FieldAttributes::STATIC));
    }
}
