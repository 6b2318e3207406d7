//! Type names as C# and ILAsm spell them.
//!
//! Both renderers print types from three sources: decoded [`TypeSignature`] trees, raw
//! type tokens from IL operands and base types, and the declarations themselves. The
//! rules differ per language:
//!
//! | Construct            | C#                   | ILAsm                                  |
//! |----------------------|----------------------|----------------------------------------|
//! | `System.Int32`       | `int`                | `int32`                                |
//! | reference type       | `System.Text.Encoder`| ``class [System.Runtime]System.Text.Encoder`` |
//! | nested type          | `Outer.Inner`        | `Outer/Inner`                          |
//! | generic instance     | `List<int>`          | ``class [Asm]System.Collections.Generic.List`1<int32>`` |
//! | generic parameter    | `T`                  | `!T`, `!!T`                            |
//! | managed reference    | `ref int`            | `int32&`                               |

use crate::metadata::{
    signatures::{SignatureMethod, TypeSignature},
    tables::TableId,
    token::Token,
    typesystem::{strip_arity, MethodDefinition, TypeDefinition, TypeReference},
};

use super::Module;

/// Resolution scope chains deeper than this are treated as cyclic.
const MAX_NESTING: usize = 64;

/// The language to spell type names in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStyle {
    /// C# source syntax
    CSharp,
    /// ILAsm syntax
    ILAsm,
}

/// Names of the generic parameters in scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericContext<'a> {
    /// Parameters of the declaring type
    pub type_params: &'a [String],
    /// Parameters of the method
    pub method_params: &'a [String],
}

impl<'a> GenericContext<'a> {
    /// The parameters visible inside `definition`.
    #[must_use]
    pub fn for_type(definition: &'a TypeDefinition) -> Self {
        GenericContext {
            type_params: &definition.generic_params,
            method_params: &[],
        }
    }

    /// The parameters visible inside `method` of `definition`.
    #[must_use]
    pub fn for_method(definition: &'a TypeDefinition, method: &'a MethodDefinition) -> Self {
        GenericContext {
            type_params: &definition.generic_params,
            method_params: &method.generic_params,
        }
    }
}

/// The C# keyword for a built-in type, by reflection name.
fn csharp_keyword(full_name: &str) -> Option<&'static str> {
    Some(match full_name {
        "System.Void" => "void",
        "System.Object" => "object",
        "System.String" => "string",
        "System.Boolean" => "bool",
        "System.Char" => "char",
        "System.SByte" => "sbyte",
        "System.Byte" => "byte",
        "System.Int16" => "short",
        "System.UInt16" => "ushort",
        "System.Int32" => "int",
        "System.UInt32" => "uint",
        "System.Int64" => "long",
        "System.UInt64" => "ulong",
        "System.Single" => "float",
        "System.Double" => "double",
        "System.Decimal" => "decimal",
        "System.IntPtr" => "nint",
        "System.UIntPtr" => "nuint",
        _ => return None,
    })
}

fn primitive(signature: &TypeSignature, style: NameStyle) -> Option<&'static str> {
    let (csharp, ilasm) = match signature {
        TypeSignature::Void => ("void", "void"),
        TypeSignature::Boolean => ("bool", "bool"),
        TypeSignature::Char => ("char", "char"),
        TypeSignature::I1 => ("sbyte", "int8"),
        TypeSignature::U1 => ("byte", "uint8"),
        TypeSignature::I2 => ("short", "int16"),
        TypeSignature::U2 => ("ushort", "uint16"),
        TypeSignature::I4 => ("int", "int32"),
        TypeSignature::U4 => ("uint", "uint32"),
        TypeSignature::I8 => ("long", "int64"),
        TypeSignature::U8 => ("ulong", "uint64"),
        TypeSignature::R4 => ("float", "float32"),
        TypeSignature::R8 => ("double", "float64"),
        TypeSignature::String => ("string", "string"),
        TypeSignature::Object | TypeSignature::Unknown => ("object", "object"),
        TypeSignature::I => ("nint", "native int"),
        TypeSignature::U => ("nuint", "native unsigned int"),
        TypeSignature::TypedByRef => ("TypedReference", "typedref"),
        _ => return None,
    };

    Some(match style {
        NameStyle::CSharp => csharp,
        NameStyle::ILAsm => ilasm,
    })
}

fn generic_param(names: &[String], index: u32, fallback: &str) -> String {
    match names.get(index as usize) {
        Some(name) if !name.is_empty() => name.clone(),
        _ => format!("{fallback}{index}"),
    }
}

impl Module {
    /// The name of a type signature.
    #[must_use]
    pub fn signature_name(
        &self,
        signature: &TypeSignature,
        style: NameStyle,
        context: &GenericContext,
    ) -> String {
        if let Some(name) = primitive(signature, style) {
            return name.to_string();
        }

        match (signature, style) {
            (TypeSignature::Ptr(inner), _) => {
                format!("{}*", self.signature_name(inner, style, context))
            }
            (TypeSignature::ByRef(inner), NameStyle::CSharp) => {
                format!("ref {}", self.signature_name(inner, style, context))
            }
            (TypeSignature::ByRef(inner), NameStyle::ILAsm) => {
                format!("{}&", self.signature_name(inner, style, context))
            }
            (TypeSignature::Pinned(inner), NameStyle::CSharp) => {
                self.signature_name(inner, style, context)
            }
            (TypeSignature::Pinned(inner), NameStyle::ILAsm) => {
                format!("{} pinned", self.signature_name(inner, style, context))
            }
            (TypeSignature::SzArray(inner), _) => {
                format!("{}[]", self.signature_name(inner, style, context))
            }
            (TypeSignature::Array(array), _) => format!(
                "{}[{}]",
                self.signature_name(&array.base, style, context),
                ",".repeat(array.rank.saturating_sub(1) as usize)
            ),
            (TypeSignature::GenericParamType(index), NameStyle::CSharp) => {
                generic_param(context.type_params, *index, "T")
            }
            (TypeSignature::GenericParamType(index), NameStyle::ILAsm) => {
                format!("!{}", generic_param(context.type_params, *index, ""))
            }
            (TypeSignature::GenericParamMethod(index), NameStyle::CSharp) => {
                generic_param(context.method_params, *index, "M")
            }
            (TypeSignature::GenericParamMethod(index), NameStyle::ILAsm) => {
                format!("!!{}", generic_param(context.method_params, *index, ""))
            }
            (TypeSignature::Class(token), NameStyle::CSharp)
            | (TypeSignature::ValueType(token), NameStyle::CSharp) => {
                self.type_token_name(*token, style, context)
            }
            (TypeSignature::Class(token), NameStyle::ILAsm) => {
                self.prefixed_token_name("class", *token, context)
            }
            (TypeSignature::ValueType(token), NameStyle::ILAsm) => {
                self.prefixed_token_name("valuetype", *token, context)
            }
            (TypeSignature::GenericInst(base, arguments), _) => {
                self.generic_instance_name(base, arguments, style, context)
            }
            (TypeSignature::FnPtr(method), NameStyle::CSharp) => {
                let mut parts: Vec<String> = method
                    .params
                    .iter()
                    .map(|param| self.parameter_name(param.by_ref, &param.base, style, context))
                    .collect();
                parts.push(self.parameter_name(
                    method.return_type.by_ref,
                    &method.return_type.base,
                    style,
                    context,
                ));
                format!("delegate*<{}>", parts.join(", "))
            }
            (TypeSignature::FnPtr(method), NameStyle::ILAsm) => format!(
                "method {} *({})",
                self.parameter_name(
                    method.return_type.by_ref,
                    &method.return_type.base,
                    style,
                    context
                ),
                self.parameter_list(method, style, context)
            ),
            _ => "object".to_string(),
        }
    }

    /// The name of a parameter or return type, including its by-ref marker.
    #[must_use]
    pub fn parameter_name(
        &self,
        by_ref: bool,
        base: &TypeSignature,
        style: NameStyle,
        context: &GenericContext,
    ) -> String {
        let name = self.signature_name(base, style, context);
        match (by_ref, style) {
            (false, _) => name,
            (true, NameStyle::CSharp) => format!("ref {name}"),
            (true, NameStyle::ILAsm) => format!("{name}&"),
        }
    }

    /// The comma separated parameter types of a method signature.
    #[must_use]
    pub fn parameter_list(
        &self,
        method: &SignatureMethod,
        style: NameStyle,
        context: &GenericContext,
    ) -> String {
        method
            .params
            .iter()
            .map(|param| self.parameter_name(param.by_ref, &param.base, style, context))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The name of a `TypeDef`, `TypeRef` or `TypeSpec` token, without the ILAsm
    /// `class`/`valuetype` prefix.
    #[must_use]
    pub fn type_token_name(&self, token: Token, style: NameStyle, context: &GenericContext) -> String {
        if let Some(definition) = self.type_def(token) {
            return self.type_def_name(definition, style);
        }
        if let Some(reference) = self.type_ref(token) {
            return self.type_ref_name(reference, style);
        }
        if let Some(specification) = self.type_spec(token) {
            return self.signature_name(specification, style, context);
        }

        format!("{token}")
    }

    /// The fully qualified name of a declared type.
    ///
    /// C# joins nesting with `.` and drops the arity suffix; ILAsm joins with `/` and keeps
    /// it.
    #[must_use]
    pub fn type_def_name(&self, definition: &TypeDefinition, style: NameStyle) -> String {
        let mut parts = vec![definition];
        let mut current = definition;
        while let Some(enclosing) = current.enclosing_type.and_then(|token| self.type_def(token)) {
            if parts.len() >= MAX_NESTING {
                break;
            }
            parts.push(enclosing);
            current = enclosing;
        }
        parts.reverse();

        let outermost = parts[0];
        match style {
            NameStyle::CSharp => {
                let full = outermost.reflection_name();
                if let Some(keyword) = csharp_keyword(&full) {
                    return keyword.to_string();
                }

                let mut name = if outermost.namespace.is_empty() {
                    String::new()
                } else {
                    format!("{}.", outermost.namespace)
                };
                name.push_str(
                    &parts
                        .iter()
                        .map(|part| part.display_name())
                        .collect::<Vec<_>>()
                        .join("."),
                );
                name
            }
            NameStyle::ILAsm => {
                let mut name = outermost.reflection_name();
                for nested in &parts[1..] {
                    name.push('/');
                    name.push_str(&nested.name);
                }
                name
            }
        }
    }

    /// The fully qualified name of a referenced type; ILAsm names carry the
    /// `[Assembly]` scope.
    #[must_use]
    pub fn type_ref_name(&self, reference: &TypeReference, style: NameStyle) -> String {
        self.type_ref_name_at(reference, style, 0)
    }

    fn type_ref_name_at(&self, reference: &TypeReference, style: NameStyle, depth: usize) -> String {
        let scope = reference.resolution_scope;
        let enclosing = if scope.tag == TableId::TypeRef && depth < MAX_NESTING {
            self.type_ref(scope.token)
        } else {
            None
        };

        match (enclosing, style) {
            (Some(outer), NameStyle::CSharp) => format!(
                "{}.{}",
                self.type_ref_name_at(outer, style, depth + 1),
                strip_arity(&reference.name)
            ),
            (Some(outer), NameStyle::ILAsm) => format!(
                "{}/{}",
                self.type_ref_name_at(outer, style, depth + 1),
                reference.name
            ),
            (None, NameStyle::CSharp) => {
                let full = reference.reflection_name();
                match csharp_keyword(&full) {
                    Some(keyword) => keyword.to_string(),
                    None => strip_arity(&full).to_string(),
                }
            }
            (None, NameStyle::ILAsm) => match scope.tag {
                TableId::AssemblyRef if !scope.is_null() => {
                    match self.references.get(scope.row as usize - 1) {
                        Some(assembly) => {
                            format!("[{}]{}", assembly.name, reference.reflection_name())
                        }
                        None => reference.reflection_name(),
                    }
                }
                TableId::ModuleRef if !scope.is_null() => {
                    format!("[.module {}]{}", scope.row, reference.reflection_name())
                }
                _ => reference.reflection_name(),
            },
        }
    }

    fn prefixed_token_name(&self, prefix: &str, token: Token, context: &GenericContext) -> String {
        if token.table() == TableId::TypeSpec as u8 {
            return self.type_token_name(token, NameStyle::ILAsm, context);
        }

        format!(
            "{prefix} {}",
            self.type_token_name(token, NameStyle::ILAsm, context)
        )
    }

    fn generic_instance_name(
        &self,
        base: &TypeSignature,
        arguments: &[TypeSignature],
        style: NameStyle,
        context: &GenericContext,
    ) -> String {
        let arguments: Vec<String> = arguments
            .iter()
            .map(|argument| self.signature_name(argument, style, context))
            .collect();

        let base_name = self.signature_name(base, style, context);
        if style == NameStyle::CSharp && base_name == "System.Nullable" && arguments.len() == 1 {
            return format!("{}?", arguments[0]);
        }

        format!("{base_name}<{}>", arguments.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{
        metadata::signatures::{SignatureArray, SignatureParameter},
        test::{AssemblyBuilder, TYPEREF_LIST, TYPEREF_NULLABLE, TYPEREF_OBJECT},
    };

    fn module() -> Module {
        let image = AssemblyBuilder::new("Sample")
            .class("Sample", "Program")
            .nested_class("Inner")
            .build();
        Module::from_mem(Path::new("Sample.dll"), image).unwrap()
    }

    fn typeref(row: u32) -> Token {
        Token::from_parts(0x01, row)
    }

    #[test]
    fn primitives() {
        let module = module();
        let context = GenericContext::default();

        let cases = [
            (TypeSignature::I4, "int", "int32"),
            (TypeSignature::U1, "byte", "uint8"),
            (TypeSignature::R8, "double", "float64"),
            (TypeSignature::I, "nint", "native int"),
            (TypeSignature::TypedByRef, "TypedReference", "typedref"),
            (TypeSignature::Object, "object", "object"),
        ];
        for (signature, csharp, ilasm) in cases {
            assert_eq!(module.signature_name(&signature, NameStyle::CSharp, &context), csharp);
            assert_eq!(module.signature_name(&signature, NameStyle::ILAsm, &context), ilasm);
        }
    }

    #[test]
    fn composed() {
        let module = module();
        let context = GenericContext::default();

        let array = TypeSignature::Array(SignatureArray {
            base: Box::new(TypeSignature::I4),
            rank: 2,
        });
        assert_eq!(module.signature_name(&array, NameStyle::CSharp, &context), "int[,]");
        assert_eq!(module.signature_name(&array, NameStyle::ILAsm, &context), "int32[,]");

        let pointer = TypeSignature::Ptr(Box::new(TypeSignature::U1));
        assert_eq!(module.signature_name(&pointer, NameStyle::CSharp, &context), "byte*");

        let by_ref = TypeSignature::ByRef(Box::new(TypeSignature::String));
        assert_eq!(module.signature_name(&by_ref, NameStyle::CSharp, &context), "ref string");
        assert_eq!(module.signature_name(&by_ref, NameStyle::ILAsm, &context), "string&");

        let pinned = TypeSignature::Pinned(Box::new(TypeSignature::SzArray(Box::new(
            TypeSignature::Char,
        ))));
        assert_eq!(module.signature_name(&pinned, NameStyle::ILAsm, &context), "char[] pinned");
    }

    #[test]
    fn references() {
        let module = module();
        let context = GenericContext::default();

        let object = TypeSignature::Class(typeref(TYPEREF_OBJECT));
        assert_eq!(module.signature_name(&object, NameStyle::CSharp, &context), "object");
        assert_eq!(
            module.signature_name(&object, NameStyle::ILAsm, &context),
            "class [System.Runtime]System.Object"
        );

        let list = TypeSignature::GenericInst(
            Box::new(TypeSignature::Class(typeref(TYPEREF_LIST))),
            vec![TypeSignature::I4],
        );
        assert_eq!(
            module.signature_name(&list, NameStyle::CSharp, &context),
            "System.Collections.Generic.List<int>"
        );
        assert_eq!(
            module.signature_name(&list, NameStyle::ILAsm, &context),
            "class [System.Runtime]System.Collections.Generic.List`1<int32>"
        );

        let nullable = TypeSignature::GenericInst(
            Box::new(TypeSignature::ValueType(typeref(TYPEREF_NULLABLE))),
            vec![TypeSignature::Boolean],
        );
        assert_eq!(module.signature_name(&nullable, NameStyle::CSharp, &context), "bool?");
        assert_eq!(
            module.signature_name(&nullable, NameStyle::ILAsm, &context),
            "valuetype [System.Runtime]System.Nullable`1<bool>"
        );
    }

    #[test]
    fn declared_and_nested() {
        let module = module();
        let inner = &module.types[2];

        assert_eq!(module.type_def_name(inner, NameStyle::CSharp), "Sample.Program.Inner");
        assert_eq!(module.type_def_name(inner, NameStyle::ILAsm), "Sample.Program/Inner");
        assert_eq!(
            module.type_token_name(inner.token, NameStyle::ILAsm, &GenericContext::default()),
            "Sample.Program/Inner"
        );
        assert_eq!(
            module.type_token_name(Token::new(0x0200_0099), NameStyle::CSharp, &GenericContext::default()),
            "0x02000099"
        );
    }

    #[test]
    fn generic_parameters() {
        let module = module();
        let type_params = vec!["TKey".to_string()];
        let method_params = vec![String::new()];
        let context = GenericContext {
            type_params: &type_params,
            method_params: &method_params,
        };

        let key = TypeSignature::GenericParamType(0);
        assert_eq!(module.signature_name(&key, NameStyle::CSharp, &context), "TKey");
        assert_eq!(module.signature_name(&key, NameStyle::ILAsm, &context), "!TKey");

        let unnamed = TypeSignature::GenericParamMethod(0);
        assert_eq!(module.signature_name(&unnamed, NameStyle::CSharp, &context), "M0");
        assert_eq!(module.signature_name(&unnamed, NameStyle::ILAsm, &context), "!!0");

        let missing = TypeSignature::GenericParamType(3);
        assert_eq!(module.signature_name(&missing, NameStyle::CSharp, &context), "T3");
    }

    #[test]
    fn method_lists() {
        let module = module();
        let signature = SignatureMethod {
            has_this: true,
            return_type: SignatureParameter {
                by_ref: false,
                base: TypeSignature::Void,
            },
            params: vec![
                SignatureParameter {
                    by_ref: false,
                    base: TypeSignature::I4,
                },
                SignatureParameter {
                    by_ref: true,
                    base: TypeSignature::String,
                },
            ],
            ..SignatureMethod::default()
        };

        let context = GenericContext::default();
        assert_eq!(
            module.parameter_list(&signature, NameStyle::CSharp, &context),
            "int, ref string"
        );
        assert_eq!(
            module.parameter_list(&signature, NameStyle::ILAsm, &context),
            "int32, string&"
        );

        let function = TypeSignature::FnPtr(Box::new(signature));
        assert_eq!(
            module.signature_name(&function, NameStyle::ILAsm, &context),
            "method void *(int32, string&)"
        );
        assert_eq!(
            module.signature_name(&function, NameStyle::CSharp, &context),
            "delegate*<int, ref string, void>"
        );
    }
}
