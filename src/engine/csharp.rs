//! Declaration-level C# rendering.
//!
//! [`CSharpDecompiler`] prints the declarations of a module as C# source: namespaces,
//! types with their modifiers, base types and generic parameters, fields with constant
//! values, and method signatures. Method bodies are stubs (`throw null;`), so the output
//! reads like a reference assembly.
//!
//! Every rendered method is recorded in [`DecompiledSource::method_spans`] with the line and
//! columns of its declaration, which is what the portable PDB writer maps the method to.

use std::fmt::Write as _;

use log::debug;

use crate::{
    engine::{DecompileContext, Decompiler, LanguageVersion},
    metadata::{
        method::{MethodAccessFlags, MethodImplFlags, MethodModifiers},
        token::Token,
        typesystem::{FieldAttributes, FullTypeName, MethodDefinition, TypeAttributes, TypeDefinition, TypeKind},
    },
    module::{ConstantValue, GenericContext, Module, NameStyle},
    Error, Result,
};

/// Position of a method declaration in rendered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSpan {
    /// `MethodDef` token
    pub method: Token,
    /// 1-based line
    pub line: u32,
    /// 1-based first column
    pub start_column: u32,
    /// 1-based column after the declaration
    pub end_column: u32,
}

/// Rendered C# source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecompiledSource {
    /// The source text
    pub text: String,
    /// Declaration positions of the rendered methods
    pub method_spans: Vec<MethodSpan>,
}

/// Line oriented source builder with tab indentation.
#[derive(Default)]
struct SourceWriter {
    text: String,
    line: u32,
    indent: usize,
    spans: Vec<MethodSpan>,
}

impl SourceWriter {
    fn line(&mut self, content: &str) {
        if !content.is_empty() {
            for _ in 0..self.indent {
                self.text.push('\t');
            }
        }
        self.text.push_str(content);
        self.text.push('\n');
        self.line += 1;
    }

    fn method_line(&mut self, method: Token, content: &str) {
        let start_column = self.indent as u32 + 1;
        self.spans.push(MethodSpan {
            method,
            line: self.line + 1,
            start_column,
            end_column: start_column + content.chars().count() as u32,
        });
        self.line(content);
    }

    fn open(&mut self) {
        self.line("{");
        self.indent += 1;
    }

    fn close(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
    }

    fn finish(self) -> DecompiledSource {
        DecompiledSource {
            text: self.text,
            method_spans: self.spans,
        }
    }
}

fn escape(text: &str, quote: char) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            c if c == quote => {
                escaped.push('\\');
                escaped.push(c);
            }
            c if c.is_control() => {
                let _ = write!(escaped, "\\u{:04X}", c as u32);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// A C# literal for a metadata constant.
#[must_use]
pub fn literal(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Boolean(value) => value.to_string(),
        ConstantValue::Char(value) => match char::from_u32(u32::from(*value)) {
            Some(c) => format!("'{}'", escape(&c.to_string(), '\'')),
            None => format!("'\\u{value:04X}'"),
        },
        ConstantValue::Signed(value, _) => value.to_string(),
        ConstantValue::Unsigned(value, element_type) => match element_type {
            0x09 => format!("{value}u"),
            0x0B => format!("{value}uL"),
            _ => value.to_string(),
        },
        ConstantValue::R4(value) if value.is_nan() => "float.NaN".to_string(),
        ConstantValue::R4(value) if value.is_infinite() => {
            (if *value > 0.0 { "float.PositiveInfinity" } else { "float.NegativeInfinity" }).to_string()
        }
        ConstantValue::R4(value) => format!("{value}f"),
        ConstantValue::R8(value) if value.is_nan() => "double.NaN".to_string(),
        ConstantValue::R8(value) if value.is_infinite() => {
            (if *value > 0.0 { "double.PositiveInfinity" } else { "double.NegativeInfinity" }).to_string()
        }
        ConstantValue::R8(value) if value.fract() == 0.0 => format!("{value:.1}"),
        ConstantValue::R8(value) => value.to_string(),
        ConstantValue::String(value) => format!("\"{}\"", escape(value, '"')),
        ConstantValue::Null => "null".to_string(),
    }
}

fn member_access(access: MethodAccessFlags) -> &'static str {
    if access == MethodAccessFlags::PUBLIC {
        "public"
    } else if access == MethodAccessFlags::FAMILY {
        "protected"
    } else if access == MethodAccessFlags::ASSEM {
        "internal"
    } else if access == MethodAccessFlags::FAM_OR_ASSEM {
        "protected internal"
    } else if access == MethodAccessFlags::FAM_AND_ASSEM {
        "private protected"
    } else {
        "private"
    }
}

fn type_access(definition: &TypeDefinition) -> &'static str {
    match definition.visibility() {
        TypeAttributes::PUBLIC | TypeAttributes::NESTED_PUBLIC => "public",
        TypeAttributes::NESTED_PRIVATE => "private",
        TypeAttributes::NESTED_FAMILY => "protected",
        TypeAttributes::NESTED_FAM_AND_ASSEM => "private protected",
        TypeAttributes::NESTED_FAM_OR_ASSEM => "protected internal",
        _ => "internal",
    }
}

fn generic_list(names: &[String], fallback: &str) -> String {
    if names.is_empty() {
        return String::new();
    }

    let names: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            if name.is_empty() {
                format!("{fallback}{index}")
            } else {
                name.clone()
            }
        })
        .collect();
    format!("<{}>", names.join(", "))
}

/// Renders declarations of one module.
struct Renderer<'a> {
    module: &'a Module,
    language: LanguageVersion,
    out: SourceWriter,
}

impl<'a> Renderer<'a> {
    fn new(context: &DecompileContext<'a>) -> Self {
        Renderer {
            module: context.module,
            language: context.settings.language_version,
            out: SourceWriter::default(),
        }
    }

    fn header(&mut self) {
        let module = self.module;
        self.out.line(&format!("// {}", module.name));
        if let Some(identity) = &module.identity {
            self.out.line(&format!("// {identity}"));
        }
        self.out.line(&format!("// Target framework: {}", module.target_framework.moniker()));
        self.out.line("");
    }

    /// Render `types` grouped by namespace, namespaces in order of first appearance.
    fn namespaces(&mut self, types: &[&'a TypeDefinition]) {
        let mut namespaces: Vec<(&str, Vec<&TypeDefinition>)> = Vec::new();
        for &definition in types {
            let namespace = self.namespace_of(definition);
            match namespaces.iter_mut().find(|(name, _)| *name == namespace) {
                Some((_, members)) => members.push(definition),
                None => namespaces.push((namespace, vec![definition])),
            }
        }

        for (index, (namespace, members)) in namespaces.iter().enumerate() {
            if index > 0 {
                self.out.line("");
            }
            if namespace.is_empty() {
                self.types(members);
            } else {
                self.out.line(&format!("namespace {namespace}"));
                self.out.open();
                self.types(members);
                self.out.close();
            }
        }
    }

    fn namespace_of(&self, definition: &'a TypeDefinition) -> &'a str {
        let mut current = definition;
        let mut depth = 0;
        while let Some(enclosing) = current.enclosing_type.and_then(|token| self.module.type_def(token)) {
            depth += 1;
            if depth > 64 {
                break;
            }
            current = enclosing;
        }
        &current.namespace
    }

    fn types(&mut self, types: &[&'a TypeDefinition]) {
        for (index, definition) in types.iter().enumerate() {
            if index > 0 {
                self.out.line("");
            }
            self.type_definition(definition);
        }
    }

    fn type_definition(&mut self, definition: &'a TypeDefinition) {
        if definition.kind == TypeKind::Delegate {
            self.delegate(definition);
            return;
        }

        let mut declaration = String::from(type_access(definition));
        match definition.kind {
            TypeKind::Class if definition.is_static_class() && self.language >= LanguageVersion::CSharp2 => {
                declaration.push_str(" static");
            }
            TypeKind::Class if definition.is_static_class() => declaration.push_str(" sealed"),
            TypeKind::Class if definition.flags & TypeAttributes::ABSTRACT != 0 => {
                declaration.push_str(" abstract");
            }
            TypeKind::Class if definition.flags & TypeAttributes::SEALED != 0 => {
                declaration.push_str(" sealed");
            }
            _ => {}
        }

        let keyword = match definition.kind {
            TypeKind::Interface => "interface",
            TypeKind::Struct => "struct",
            TypeKind::Enum => "enum",
            _ => "class",
        };
        let _ = write!(
            declaration,
            " {keyword} {}{}",
            definition.display_name(),
            generic_list(&definition.generic_params, "T")
        );

        let bases = self.base_list(definition);
        if !bases.is_empty() {
            let _ = write!(declaration, " : {}", bases.join(", "));
        }

        self.out.line(&declaration);
        self.out.open();
        if definition.kind == TypeKind::Enum {
            self.enum_members(definition);
        } else {
            self.members(definition);
        }
        self.out.close();
    }

    fn base_list(&self, definition: &TypeDefinition) -> Vec<String> {
        let context = GenericContext::for_type(definition);
        let mut bases = Vec::new();

        match definition.kind {
            TypeKind::Class => {
                if let Some(base) = &definition.base_type {
                    let name = self.module.signature_name(base, NameStyle::CSharp, &context);
                    if name != "object" {
                        bases.push(name);
                    }
                }
            }
            TypeKind::Enum => {
                let underlying = definition
                    .fields
                    .iter()
                    .find(|field| field.is_enum_value_field())
                    .map(|field| self.module.signature_name(&field.signature, NameStyle::CSharp, &context));
                if let Some(underlying) = underlying.filter(|name| name != "int") {
                    bases.push(underlying);
                }
                return bases;
            }
            _ => {}
        }

        bases.extend(
            definition
                .interfaces
                .iter()
                .map(|interface| self.module.signature_name(interface, NameStyle::CSharp, &context)),
        );
        bases
    }

    fn enum_members(&mut self, definition: &TypeDefinition) {
        let members: Vec<String> = definition
            .fields
            .iter()
            .filter(|field| !field.is_enum_value_field())
            .map(|field| match self.module.field_constant(field.token) {
                Some(value) => format!("{} = {}", field.name, literal(value)),
                None => field.name.clone(),
            })
            .collect();

        let count = members.len();
        for (index, member) in members.into_iter().enumerate() {
            if index + 1 < count {
                self.out.line(&format!("{member},"));
            } else {
                self.out.line(&member);
            }
        }
    }

    fn members(&mut self, definition: &'a TypeDefinition) {
        let context = GenericContext::for_type(definition);
        let mut first = true;

        for field in &definition.fields {
            let attributes = field.attributes();
            let mut line = String::new();
            if definition.kind != TypeKind::Interface {
                line.push_str(member_access(field.access()));
                line.push(' ');
            }

            let constant = if attributes.contains(FieldAttributes::LITERAL) {
                self.module.field_constant(field.token)
            } else {
                None
            };
            if constant.is_some() {
                line.push_str("const ");
            } else {
                if attributes.contains(FieldAttributes::STATIC) {
                    line.push_str("static ");
                }
                if attributes.contains(FieldAttributes::INIT_ONLY) {
                    line.push_str("readonly ");
                }
            }

            let _ = write!(
                line,
                "{} {}",
                self.module.signature_name(&field.signature, NameStyle::CSharp, &context),
                field.name
            );
            if let Some(value) = constant {
                let _ = write!(line, " = {}", literal(value));
            }
            line.push(';');
            self.out.line(&line);
            first = false;
        }

        for method in &definition.methods {
            if !first {
                self.out.line("");
            }
            first = false;
            self.method(definition, method);
        }

        let module = self.module;
        for nested in module.nested_types(definition) {
            if !first {
                self.out.line("");
            }
            first = false;
            self.type_definition(nested);
        }
    }

    fn parameters(&self, definition: &TypeDefinition, method: &MethodDefinition) -> String {
        let context = GenericContext::for_method(definition, method);
        let mut parameters: Vec<String> = method
            .signature
            .params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                let name = method.param_name(index);
                if param.by_ref {
                    let direction = if method.is_out_param(index) { "out" } else { "ref" };
                    format!(
                        "{direction} {} {name}",
                        self.module.signature_name(&param.base, NameStyle::CSharp, &context)
                    )
                } else {
                    format!(
                        "{} {name}",
                        self.module.signature_name(&param.base, NameStyle::CSharp, &context)
                    )
                }
            })
            .collect();
        if method.signature.vararg {
            parameters.push("__arglist".to_string());
        }
        parameters.join(", ")
    }

    fn method(&mut self, definition: &TypeDefinition, method: &MethodDefinition) {
        let context = GenericContext::for_method(definition, method);
        let modifiers = method.modifiers();
        let in_interface = definition.kind == TypeKind::Interface;

        let mut line = String::new();
        if method.is_type_initializer() {
            line.push_str("static ");
        } else if !in_interface {
            line.push_str(member_access(method.access()));
            line.push(' ');
            if modifiers.contains(MethodModifiers::STATIC) {
                line.push_str("static ");
            }
        } else if modifiers.contains(MethodModifiers::STATIC) {
            line.push_str("static ");
        }

        let is_abstract = modifiers.contains(MethodModifiers::ABSTRACT);
        if !in_interface {
            if is_abstract {
                line.push_str("abstract ");
            } else if modifiers.contains(MethodModifiers::VIRTUAL) {
                if !modifiers.contains(MethodModifiers::NEW_SLOT) {
                    if modifiers.contains(MethodModifiers::FINAL) {
                        line.push_str("sealed ");
                    }
                    line.push_str("override ");
                } else if !modifiers.contains(MethodModifiers::FINAL) {
                    line.push_str("virtual ");
                }
            }
        }

        let implemented_elsewhere = modifiers.contains(MethodModifiers::PINVOKE_IMPL)
            || method.impl_attributes().contains(MethodImplFlags::INTERNAL_CALL)
            || (method.rva == 0 && !is_abstract && !in_interface);
        if implemented_elsewhere {
            line.push_str("extern ");
        }

        if method.is_constructor() || method.is_type_initializer() {
            line.push_str(definition.display_name());
        } else {
            let _ = write!(
                line,
                "{} {}{}",
                self.module.parameter_name(
                    method.signature.return_type.by_ref,
                    &method.signature.return_type.base,
                    NameStyle::CSharp,
                    &context
                ),
                method.name,
                generic_list(&method.generic_params, "M")
            );
        }
        let _ = write!(line, "({})", self.parameters(definition, method));

        let has_body = !is_abstract && !implemented_elsewhere && !(in_interface && method.rva == 0);
        if has_body {
            self.out.method_line(method.token, &line);
            self.out.open();
            if !method.is_constructor() && !method.is_type_initializer() {
                self.out.line("throw null;");
            }
            self.out.close();
        } else {
            line.push(';');
            self.out.method_line(method.token, &line);
        }
    }

    fn delegate(&mut self, definition: &TypeDefinition) {
        let context = GenericContext::for_type(definition);
        let mut line = format!("{} delegate ", type_access(definition));

        match definition.methods.iter().find(|method| method.name == "Invoke") {
            Some(invoke) => {
                let _ = write!(
                    line,
                    "{} {}{}({});",
                    self.module.parameter_name(
                        invoke.signature.return_type.by_ref,
                        &invoke.signature.return_type.base,
                        NameStyle::CSharp,
                        &context
                    ),
                    definition.display_name(),
                    generic_list(&definition.generic_params, "T"),
                    self.parameters(definition, invoke)
                );
                self.out.method_line(invoke.token, &line);
            }
            None => {
                let _ = write!(
                    line,
                    "void {}{}();",
                    definition.display_name(),
                    generic_list(&definition.generic_params, "T")
                );
                self.out.line(&line);
            }
        }
    }
}

/// Whether `definition` is rendered on its own.
///
/// `<Module>` is only rendered when it declares global members.
pub(crate) fn is_rendered(definition: &TypeDefinition) -> bool {
    !definition.is_module_type() || !definition.fields.is_empty() || !definition.methods.is_empty()
}

/// The native C# renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct CSharpDecompiler;

impl CSharpDecompiler {
    /// Render `types` (and their nested types) as one source file.
    ///
    /// # Errors
    /// Returns an error if a type has no valid name.
    pub fn decompile_types<'a>(
        context: &DecompileContext<'a>,
        types: &[&'a TypeDefinition],
    ) -> Result<DecompiledSource> {
        let mut renderer = Renderer::new(context);
        renderer.header();
        renderer.namespaces(types);
        Ok(renderer.out.finish())
    }
}

impl Decompiler for CSharpDecompiler {
    fn decompile_module(&self, context: &DecompileContext) -> Result<DecompiledSource> {
        let types: Vec<&TypeDefinition> = context
            .module
            .top_level_types()
            .filter(|definition| is_rendered(definition))
            .collect();
        debug!("Decompiling {} top-level types of {}", types.len(), context.module.name);
        Self::decompile_types(context, &types)
    }

    fn decompile_type(&self, context: &DecompileContext, name: &FullTypeName) -> Result<DecompiledSource> {
        let definition = context
            .module
            .find_type(name)
            .ok_or_else(|| Error::TypeNotFound(name.to_string()))?;
        debug!("Decompiling {}", context.module.reflection_name(definition));
        Self::decompile_types(context, &[definition])
    }
}
