//! ILAsm rendering.
//!
//! [`ReflectionDisassembler`] prints a module the way ILAsm source reads: the assembly and
//! module manifest, then every type with its fields and methods, and every method body
//! decoded instruction by instruction. Operands are resolved against the module, so calls
//! show their full signatures and `ldstr` shows the literal.
//!
//! With sequence points requested and symbols attached, a `// Symbols:` header names the
//! symbol file and every instruction that starts a sequence point is preceded by a
//! `// sequence point:` comment.
//!
//! # Reference
//! - [ECMA-335 II.5-II.15 (ILAsm syntax)](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::{fmt::Write as _, io::Write};

use log::debug;

use crate::{
    disassembler::{decode_stream, Instruction, Label, Operand},
    engine::{csharp::literal, symbols::DebugInfo, CancellationToken, Disassembler, DisassemblerOptions},
    metadata::{
        method::{MethodAccessFlags, MethodImplFlags, MethodModifiers},
        signatures::{SignatureMethod, ELEMENT_TYPE},
        tables::TableId,
        token::Token,
        typesystem::{FieldAttributes, FieldDefinition, MethodDefinition, TypeAttributes, TypeDefinition},
    },
    module::{ConstantValue, GenericContext, MemberSignature, Module, NameStyle},
    Result,
};

fn access_keyword(access: MethodAccessFlags) -> &'static str {
    if access == MethodAccessFlags::PUBLIC {
        "public"
    } else if access == MethodAccessFlags::PRIVATE {
        "private"
    } else if access == MethodAccessFlags::FAMILY {
        "family"
    } else if access == MethodAccessFlags::ASSEM {
        "assembly"
    } else if access == MethodAccessFlags::FAM_AND_ASSEM {
        "famandassem"
    } else if access == MethodAccessFlags::FAM_OR_ASSEM {
        "famorassem"
    } else {
        "privatescope"
    }
}

fn type_header(definition: &TypeDefinition) -> String {
    let flags = definition.flags;
    let mut header = String::from(".class ");
    if flags & TypeAttributes::INTERFACE != 0 {
        header.push_str("interface ");
    }

    header.push_str(match definition.visibility() {
        TypeAttributes::PUBLIC => "public ",
        TypeAttributes::NESTED_PUBLIC => "nested public ",
        TypeAttributes::NESTED_PRIVATE => "nested private ",
        TypeAttributes::NESTED_FAMILY => "nested family ",
        TypeAttributes::NESTED_ASSEMBLY => "nested assembly ",
        TypeAttributes::NESTED_FAM_AND_ASSEM => "nested famandassem ",
        TypeAttributes::NESTED_FAM_OR_ASSEM => "nested famorassem ",
        _ => "private ",
    });
    header.push_str(match flags & TypeAttributes::LAYOUT_MASK {
        TypeAttributes::SEQUENTIAL_LAYOUT => "sequential ",
        TypeAttributes::EXPLICIT_LAYOUT => "explicit ",
        _ => "auto ",
    });
    header.push_str("ansi ");
    for (flag, keyword) in [
        (TypeAttributes::ABSTRACT, "abstract "),
        (TypeAttributes::SEALED, "sealed "),
        (TypeAttributes::SPECIAL_NAME, "specialname "),
        (TypeAttributes::IMPORT, "import "),
        (TypeAttributes::SERIALIZABLE, "serializable "),
        (TypeAttributes::BEFORE_FIELD_INIT, "beforefieldinit "),
    ] {
        if flags & flag != 0 {
            header.push_str(keyword);
        }
    }
    header
}

fn il_constant(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Boolean(value) => format!("bool({value})"),
        ConstantValue::Char(value) => format!("char(0x{value:04x})"),
        ConstantValue::Signed(value, element_type) => {
            let name = match *element_type {
                ELEMENT_TYPE::I1 => "int8",
                ELEMENT_TYPE::I2 => "int16",
                ELEMENT_TYPE::I8 => "int64",
                _ => "int32",
            };
            format!("{name}({value})")
        }
        ConstantValue::Unsigned(value, element_type) => {
            let name = match *element_type {
                ELEMENT_TYPE::U1 => "uint8",
                ELEMENT_TYPE::U2 => "uint16",
                ELEMENT_TYPE::U8 => "uint64",
                _ => "uint32",
            };
            format!("{name}({value})")
        }
        ConstantValue::R4(value) => format!("float32({value})"),
        ConstantValue::R8(value) => format!("float64({value})"),
        ConstantValue::String(value) => literal(&ConstantValue::String(value.clone())),
        ConstantValue::Null => "nullref".to_string(),
    }
}

/// Writes the ILAsm text of one module.
struct IlWriter<'a> {
    module: &'a Module,
    options: &'a DisassemblerOptions<'a>,
    cancel: &'a CancellationToken,
    out: &'a mut dyn Write,
    indent: usize,
}

impl<'a> IlWriter<'a> {
    fn line(&mut self, content: &str) -> Result<()> {
        if content.is_empty() {
            writeln!(self.out)?;
        } else {
            writeln!(self.out, "{}{content}", "\t".repeat(self.indent))?;
        }
        Ok(())
    }

    fn symbols(&self) -> Option<&'a DebugInfo> {
        if self.options.show_sequence_points {
            self.options.debug_info
        } else {
            None
        }
    }

    fn manifest(&mut self) -> Result<()> {
        let module = self.module;
        for reference in &module.references {
            self.line(&format!(".assembly extern {}", reference.name))?;
            self.line("{")?;
            if let Some(token) = reference.public_key_token {
                let bytes: Vec<String> = token.iter().map(|byte| format!("{byte:02X}")).collect();
                self.line(&format!("\t.publickeytoken = ({} )", bytes.join(" ")))?;
            }
            self.line(&format!("\t.ver {}", reference.version.to_string().replace('.', ":")))?;
            self.line("}")?;
        }

        if let Some(identity) = &module.identity {
            self.line(&format!(".assembly {}", identity.name))?;
            self.line("{")?;
            self.line(&format!("\t.ver {}", identity.version.to_string().replace('.', ":")))?;
            self.line("}")?;
        }

        self.line(&format!(".module {}", module.name))?;
        if let Some(mvid) = module.mvid {
            self.line(&format!("// MVID: {{{}}}", mvid.to_string().to_ascii_uppercase()))?;
        }
        self.line(&format!(".imagebase 0x{:08x}", module.file().imagebase()))?;
        if let Some(symbols) = self.symbols() {
            self.line(&format!("// Symbols: {}", symbols.description()))?;
        }
        self.line("")
    }

    fn type_definition(&mut self, definition: &'a TypeDefinition) -> Result<()> {
        self.cancel.check()?;
        let module = self.module;
        let context = GenericContext::for_type(definition);

        let name = if definition.is_nested() {
            definition.name.clone()
        } else {
            definition.reflection_name()
        };
        let generics = if definition.generic_params.is_empty() {
            String::new()
        } else {
            format!("<{}>", definition.generic_params.join(", "))
        };
        self.line(&format!("{}{name}{generics}", type_header(definition)))?;
        if let Some(base) = &definition.base_type {
            self.line(&format!(
                "\textends {}",
                module.signature_name(base, NameStyle::ILAsm, &context).trim_start_matches("class ")
            ))?;
        }
        if !definition.interfaces.is_empty() {
            let interfaces: Vec<String> = definition
                .interfaces
                .iter()
                .map(|interface| {
                    module
                        .signature_name(interface, NameStyle::ILAsm, &context)
                        .trim_start_matches("class ")
                        .to_string()
                })
                .collect();
            self.line(&format!("\timplements {}", interfaces.join(",\n\t\t\t   ")))?;
        }

        self.line("{")?;
        self.indent += 1;
        for nested in module.nested_types(definition) {
            self.type_definition(nested)?;
            self.line("")?;
        }
        for field in &definition.fields {
            self.field(definition, field)?;
        }
        if !definition.fields.is_empty() && !definition.methods.is_empty() {
            self.line("")?;
        }
        for (index, method) in definition.methods.iter().enumerate() {
            if index > 0 {
                self.line("")?;
            }
            self.method(definition, method)?;
        }
        debug!("Disassembled {}", module.reflection_name(definition));
        self.indent -= 1;
        self.line(&format!("}} // end of class {name}"))
    }

    fn field(&mut self, definition: &TypeDefinition, field: &FieldDefinition) -> Result<()> {
        let attributes = field.attributes();
        let mut line = format!(".field {} ", access_keyword(field.access()));
        for (flag, keyword) in [
            (FieldAttributes::STATIC, "static "),
            (FieldAttributes::INIT_ONLY, "initonly "),
            (FieldAttributes::LITERAL, "literal "),
            (FieldAttributes::NOT_SERIALIZED, "notserialized "),
            (FieldAttributes::SPECIAL_NAME, "specialname "),
            (FieldAttributes::RTSPECIAL_NAME, "rtspecialname "),
        ] {
            if attributes.contains(flag) {
                line.push_str(keyword);
            }
        }

        let _ = write!(
            line,
            "{} {}",
            self.module
                .signature_name(&field.signature, NameStyle::ILAsm, &GenericContext::for_type(definition)),
            field.name
        );
        if let Some(value) = self.module.field_constant(field.token) {
            let _ = write!(line, " = {}", il_constant(value));
        }
        self.line(&line)
    }

    fn method_header(&self, definition: &TypeDefinition, method: &MethodDefinition) -> String {
        let context = GenericContext::for_method(definition, method);
        let modifiers = method.modifiers();

        let mut header = format!(".method {} ", access_keyword(method.access()));
        for (flag, keyword) in [
            (MethodModifiers::FINAL, "final "),
            (MethodModifiers::HIDE_BY_SIG, "hidebysig "),
            (MethodModifiers::SPECIAL_NAME, "specialname "),
            (MethodModifiers::RTSPECIAL_NAME, "rtspecialname "),
            (MethodModifiers::NEW_SLOT, "newslot "),
            (MethodModifiers::ABSTRACT, "abstract "),
            (MethodModifiers::STRICT, "strict "),
            (MethodModifiers::VIRTUAL, "virtual "),
            (MethodModifiers::STATIC, "static "),
            (MethodModifiers::PINVOKE_IMPL, "pinvokeimpl "),
        ] {
            if modifiers.contains(flag) {
                header.push_str(keyword);
            }
        }
        if method.signature.has_this {
            header.push_str("instance ");
        }
        if method.signature.vararg {
            header.push_str("vararg ");
        }

        let parameters: Vec<String> = method
            .signature
            .params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                let direction = if method.is_out_param(index) { "[out] " } else { "" };
                format!(
                    "{direction}{} {}",
                    self.module.parameter_name(param.by_ref, &param.base, NameStyle::ILAsm, &context),
                    method.param_name(index)
                )
            })
            .collect();
        let generics = if method.generic_params.is_empty() {
            String::new()
        } else {
            format!("<{}>", method.generic_params.join(", "))
        };

        let implementation = method.impl_attributes();
        let kind = if implementation.contains(MethodImplFlags::RUNTIME) {
            "runtime managed"
        } else if implementation.contains(MethodImplFlags::NATIVE) {
            "native unmanaged"
        } else {
            "cil managed"
        };

        let _ = write!(
            header,
            "{} {}{generics} ({}) {kind}",
            self.module.parameter_name(
                method.signature.return_type.by_ref,
                &method.signature.return_type.base,
                NameStyle::ILAsm,
                &context
            ),
            method.name,
            parameters.join(", ")
        );
        if implementation.contains(MethodImplFlags::INTERNAL_CALL) {
            header.push_str(" internalcall");
        }
        if implementation.contains(MethodImplFlags::PRESERVE_SIG) {
            header.push_str(" preservesig");
        }
        if implementation.contains(MethodImplFlags::SYNCHRONIZED) {
            header.push_str(" synchronized");
        }
        if implementation.contains(MethodImplFlags::NO_INLINING) {
            header.push_str(" noinlining");
        }
        header
    }

    fn method(&mut self, definition: &TypeDefinition, method: &MethodDefinition) -> Result<()> {
        self.cancel.check()?;
        let module = self.module;
        let context = GenericContext::for_method(definition, method);

        self.line(&self.method_header(definition, method))?;
        self.line("{")?;
        self.indent += 1;

        if module.entry_point == Some(method.token) {
            self.line(".entrypoint")?;
        }
        if let Some(body) = &method.body {
            self.line(&format!("// Method begins at RVA 0x{:x}", method.rva))?;
            self.line(&format!("// Code size {} (0x{:x})", body.code.len(), body.code.len()))?;
            self.line(&format!(".maxstack {}", body.max_stack))?;

            if let Some(locals) = module.locals(body.local_var_sig_token) {
                let init = if body.is_init_local { "init " } else { "" };
                self.line(&format!(".locals {init}("))?;
                for (index, local) in locals.iter().enumerate() {
                    let separator = if index + 1 < locals.len() { "," } else { "" };
                    self.line(&format!(
                        "\t[{index}] {}{separator}",
                        module.signature_name(local, NameStyle::ILAsm, &context)
                    ))?;
                }
                self.line(")")?;
            }
            self.line("")?;

            let points = self
                .symbols()
                .map(|symbols| (symbols, symbols.sequence_points(method.token)));
            for instruction in decode_stream(&body.code)? {
                if let Some((symbols, points)) = points {
                    for point in points.iter().filter(|point| point.offset == instruction.offset) {
                        if point.is_hidden() {
                            self.line("// sequence point: hidden")?;
                        } else {
                            self.line(&format!(
                                "// sequence point: (line {}, col {}) to (line {}, col {}) in {}",
                                point.start_line,
                                point.start_column,
                                point.end_line,
                                point.end_column,
                                symbols.document_name(point.document).unwrap_or("?")
                            ))?;
                        }
                    }
                }
                self.line(&self.instruction(definition, method, &instruction))?;
            }

            for handler in &body.exception_handlers {
                let try_end = handler.try_offset + handler.try_length;
                let handler_end = handler.handler_offset + handler.handler_length;
                let clause = match handler.kind_name() {
                    "catch" => format!(
                        "catch {}",
                        module.type_token_name(
                            Token::new(handler.class_token_or_filter),
                            NameStyle::ILAsm,
                            &context
                        )
                    ),
                    "filter" => format!("filter {}", Label(handler.class_token_or_filter)),
                    kind => kind.to_string(),
                };
                self.line(&format!(
                    ".try {} to {} {clause} handler {} to {}",
                    Label(handler.try_offset),
                    Label(try_end),
                    Label(handler.handler_offset),
                    Label(handler_end)
                ))?;
            }
        }

        self.indent -= 1;
        self.line(&format!(
            "}} // end of method {}::{}",
            definition.display_name(),
            method.name
        ))
    }

    fn instruction(&self, definition: &TypeDefinition, method: &MethodDefinition, instruction: &Instruction) -> String {
        let mnemonic = instruction.mnemonic();
        let operand = match &instruction.operand {
            Operand::None => return format!("{}: {mnemonic}", Label(instruction.offset)),
            Operand::Int(value) => value.to_string(),
            Operand::UInt(index) => self.variable(method, mnemonic, *index),
            Operand::Float32(value) => value.to_string(),
            Operand::Float64(value) => value.to_string(),
            Operand::Target(target) => Label(*target).to_string(),
            Operand::Switch(targets) => format!(
                "({})",
                targets
                    .iter()
                    .map(|target| Label(*target).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Operand::Token(token) => self.token(definition, method, mnemonic, *token),
        };
        format!("{}: {mnemonic} {operand}", Label(instruction.offset))
    }

    fn variable(&self, method: &MethodDefinition, mnemonic: &str, index: u16) -> String {
        if mnemonic.contains("arg") {
            let mut position = usize::from(index);
            if method.signature.has_this {
                if position == 0 {
                    return "0".to_string();
                }
                position -= 1;
            }
            if position < method.signature.params.len() {
                return method.param_name(position);
            }
            index.to_string()
        } else if mnemonic.contains("loc") {
            format!("V_{index}")
        } else {
            index.to_string()
        }
    }

    fn token(&self, definition: &TypeDefinition, method: &MethodDefinition, mnemonic: &str, token: Token) -> String {
        let module = self.module;
        let context = GenericContext::for_method(definition, method);

        if token.table() == 0x70 {
            return match module.user_string(token) {
                Some(value) => literal(&ConstantValue::String(value)),
                None => format!("{token}"),
            };
        }

        let prefix = if mnemonic == "ldtoken" {
            match token.table() {
                0x04 => "field ",
                0x06 | 0x2B => "method ",
                0x0A => match module.member_ref(token).map(|member| &member.signature) {
                    Some(MemberSignature::Field(_)) => "field ",
                    _ => "method ",
                },
                _ => "",
            }
        } else {
            ""
        };

        let body = match token.table() {
            0x04 => self.field_name(token),
            0x06 | 0x0A | 0x2B => self.method_name(token),
            0x01 | 0x02 | 0x1B => Some(module.type_token_name(token, NameStyle::ILAsm, &context)),
            _ => None,
        };
        format!("{prefix}{}", body.unwrap_or_else(|| format!("{token}")))
    }

    fn field_name(&self, token: Token) -> Option<String> {
        let module = self.module;
        match token.table() {
            0x04 => {
                let (owner, field) = module.field_def(token)?;
                Some(format!(
                    "{} {}::{}",
                    module.signature_name(&field.signature, NameStyle::ILAsm, &GenericContext::for_type(owner)),
                    module.type_def_name(owner, NameStyle::ILAsm),
                    field.name
                ))
            }
            0x0A => {
                let member = module.member_ref(token)?;
                let MemberSignature::Field(signature) = &member.signature else {
                    return None;
                };
                Some(format!(
                    "{} {}::{}",
                    module.signature_name(signature, NameStyle::ILAsm, &GenericContext::default()),
                    self.parent_name(member.parent.token, member.parent.tag),
                    member.name
                ))
            }
            _ => None,
        }
    }

    fn parent_name(&self, parent: Token, table: TableId) -> String {
        match table {
            TableId::TypeRef | TableId::TypeDef | TableId::TypeSpec => self
                .module
                .type_token_name(parent, NameStyle::ILAsm, &GenericContext::default())
                .trim_start_matches("class ")
                .to_string(),
            _ => format!("{parent}"),
        }
    }

    fn signature_text(&self, owner: &str, name: &str, generics: &str, signature: &SignatureMethod, context: &GenericContext) -> String {
        let module = self.module;
        let instance = if signature.has_this { "instance " } else { "" };
        format!(
            "{instance}{} {owner}::{name}{generics}({})",
            module.parameter_name(
                signature.return_type.by_ref,
                &signature.return_type.base,
                NameStyle::ILAsm,
                context
            ),
            module.parameter_list(signature, NameStyle::ILAsm, context)
        )
    }

    fn method_name(&self, token: Token) -> Option<String> {
        self.method_name_with(token, "")
    }

    fn method_name_with(&self, token: Token, generics: &str) -> Option<String> {
        let module = self.module;
        match token.table() {
            0x06 => {
                let (owner, method) = module.method_def(token)?;
                Some(self.signature_text(
                    &module.type_def_name(owner, NameStyle::ILAsm),
                    &method.name,
                    generics,
                    &method.signature,
                    &GenericContext::for_method(owner, method),
                ))
            }
            0x0A => {
                let member = module.member_ref(token)?;
                let MemberSignature::Method(signature) = &member.signature else {
                    return self.field_name(token);
                };
                Some(self.signature_text(
                    &self.parent_name(member.parent.token, member.parent.tag),
                    &member.name,
                    generics,
                    signature,
                    &GenericContext::default(),
                ))
            }
            0x2B => {
                let specification = module.method_spec(token)?;
                let arguments: Vec<String> = specification
                    .arguments
                    .iter()
                    .map(|argument| module.signature_name(argument, NameStyle::ILAsm, &GenericContext::default()))
                    .collect();
                self.method_name_with(specification.method, &format!("<{}>", arguments.join(", ")))
            }
            _ => None,
        }
    }
}

/// The native IL renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReflectionDisassembler;

impl Disassembler for ReflectionDisassembler {
    fn write_module_contents(
        &self,
        out: &mut dyn Write,
        module: &Module,
        options: &DisassemblerOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut writer = IlWriter {
            module,
            options,
            cancel,
            out,
            indent: 0,
        };

        writer.manifest()?;
        for definition in module.top_level_types() {
            writer.type_definition(definition)?;
            writer.line("")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{test::AssemblyBuilder, Error};

    fn sample() -> Module {
        let image = AssemblyBuilder::new("Sample")
            .class("Sample", "Program")
            .field("count")
            .method("Main", true)
            .entry_point()
            .method("Run", false)
            .nested_class("Inner")
            .enumeration("Sample", "Color", &["Red", "Green"])
            .interface("Sample", "IService")
            .method("Start", false)
            .build();
        Module::from_mem(Path::new("Sample.dll"), image).unwrap()
    }

    fn render(module: &Module, options: &DisassemblerOptions) -> Result<String> {
        let mut out = Vec::new();
        ReflectionDisassembler.write_module_contents(&mut out, module, options, &CancellationToken::new())?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn manifest_and_types() {
        let module = sample();
        let text = render(&module, &DisassemblerOptions::default()).unwrap();

        assert!(text.starts_with(".assembly extern System.Runtime\n{\n\t.publickeytoken = (B0 3F 5F 7F 11 D5 0A 3A )\n\t.ver 8:0:0:0\n}\n"));
        assert!(text.contains(".assembly Sample\n{\n\t.ver 1:0:0:0\n}\n.module Sample.dll\n"));
        assert!(text.contains(".class public auto ansi beforefieldinit Sample.Program\n\textends [System.Runtime]System.Object\n{\n"));
        assert!(text.contains("\t.class nested public auto ansi beforefieldinit Inner\n"));
        assert!(text.contains("\t} // end of class Inner\n"));
        assert!(text.contains("\t.field public int32 count\n"));
        assert!(text.contains(".field public static literal valuetype Sample.Color Red = int32(0)\n"));
        assert!(text.contains(".field public specialname rtspecialname int32 value__\n"));
        assert!(text.contains(".class interface public auto ansi abstract Sample.IService\n"));
        assert!(text.contains("\t.method public hidebysig newslot abstract virtual instance void Start () cil managed\n"));
        assert!(text.contains("} // end of class Sample.Program\n"));
        assert!(!text.contains("// Symbols:"));
    }

    #[test]
    fn method_bodies() {
        let module = sample();
        let text = render(&module, &DisassemblerOptions::default()).unwrap();

        assert!(text.contains("\t.method public hidebysig static void Main () cil managed\n\t{\n\t\t.entrypoint\n\t\t// Method begins at RVA 0x"));
        assert!(text.contains("\t\t// Code size 11 (0xb)\n\t\t.maxstack 8\n"));
        assert!(text.contains("\t\tIL_0000: ldstr \"Hello\"\n"));
        assert!(text.contains(
            "\t\tIL_0005: call void [System.Console]System.Console::WriteLine(string)\n"
        ));
        assert!(text.contains("\t\tIL_000a: ret\n\t} // end of method Program::Main\n"));
        assert!(text.contains(".method public hidebysig instance void Run () cil managed\n"));
    }

    #[test]
    fn cancelled() {
        let module = sample();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut out = Vec::new();
        let result = ReflectionDisassembler.write_module_contents(
            &mut out,
            &module,
            &DisassemblerOptions::default(),
            &cancel,
        );
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn constants() {
        assert_eq!(il_constant(&ConstantValue::Signed(-1, ELEMENT_TYPE::I8)), "int64(-1)");
        assert_eq!(il_constant(&ConstantValue::Unsigned(255, ELEMENT_TYPE::U1)), "uint8(255)");
        assert_eq!(il_constant(&ConstantValue::Char(0x41)), "char(0x0041)");
        assert_eq!(il_constant(&ConstantValue::String("a".to_string())), "\"a\"");
        assert_eq!(il_constant(&ConstantValue::Null), "nullref");
    }
}
