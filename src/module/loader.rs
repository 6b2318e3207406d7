//! Builds a [`Module`] from the metadata of a PE image.
//!
//! Loading reads each table the type system needs once, in dependency order: type
//! references and type specifications first (type names and base types refer to them),
//! then fields, methods and parameters, then the type definitions that own them, and
//! finally the side tables that annotate types (nesting, generic parameters, interfaces,
//! constants, custom attributes).
//!
//! `FieldPtr` and `MethodPtr` indirections of uncompressed (`#-`) metadata are honoured
//! when splitting the field and method lists between their owning types.
//!
//! # Reference
//! - [ECMA-335 II.22 and II.24](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::{collections::HashMap, ops::Range, path::PathBuf};

use log::{debug, warn};

use crate::{
    file::{parser::Parser, File},
    metadata::{
        cor20header::Cor20Header,
        framework::TargetFramework,
        identity::{AssemblyIdentity, AssemblyVersion},
        method::MethodBody,
        root::Root,
        signatures::{SignatureParser, TypeSignature, ELEMENT_TYPE},
        streams::{Blob, Guid, Strings, TablesHeader},
        tables::{
            AssemblyRaw, AssemblyRefRaw, CodedIndex, ConstantRaw, CustomAttributeRaw, FieldPtrRaw,
            FieldRaw, GenericParamRaw, InterfaceImplRaw, MemberRefRaw, MethodDefRaw,
            MethodPtrRaw, MethodSpecRaw, ModuleRaw, NestedClassRaw, ParamRaw, RowReadable,
            StandAloneSigRaw, TableId, TypeDefRaw, TypeRefRaw, TypeSpecRaw,
        },
        token::Token,
        typesystem::{
            FieldDefinition, MethodDefinition, ParamDefinition, TypeDefinition, TypeKind,
            TypeReference,
        },
    },
    Error::OutOfBounds,
    Result,
};

use super::{ConstantValue, MemberReference, MemberSignature, MethodSpecification, Module};

const TARGET_FRAMEWORK_ATTRIBUTE: &str = "System.Runtime.Versioning.TargetFrameworkAttribute";

/// `MethodDef.ImplFlags` code type mask; 0 means IL.
const CODE_TYPE_MASK: u16 = 0x0003;

/// Load the module metadata of `file`, which the returned module keeps alive.
pub(super) fn load(file: File, path: PathBuf) -> Result<Module> {
    let debug_entries = match file.debug_entries() {
        Ok(entries) => entries,
        Err(error) => {
            warn!(
                "Ignoring malformed debug directory of {}: {error}",
                path.display()
            );
            Vec::new()
        }
    };

    let contents = Contents::read(&file)?;
    debug!(
        "Loaded {} - {} types, {} type references, {} member references",
        path.display(),
        contents.types.len(),
        contents.type_refs.len(),
        contents.member_refs.len()
    );

    Ok(Module {
        file,
        path,
        name: contents.name,
        mvid: contents.mvid,
        runtime_version: contents.runtime_version,
        identity: contents.identity,
        references: contents.references,
        target_framework: contents.target_framework,
        debug_entries,
        entry_point: contents.entry_point,
        table_rows: contents.table_rows,
        types: contents.types,
        type_refs: contents.type_refs,
        type_specs: contents.type_specs,
        member_refs: contents.member_refs,
        method_specs: contents.method_specs,
        local_signatures: contents.local_signatures,
        field_constants: contents.field_constants,
        user_strings: contents.user_strings,
        method_owners: contents.method_owners,
        field_owners: contents.field_owners,
    })
}

/// The metadata heaps of one module.
struct Heaps<'a> {
    strings: Option<Strings<'a>>,
    blob: Option<Blob<'a>>,
    guid: Option<Guid<'a>>,
    user_strings: &'a [u8],
}

impl<'a> Heaps<'a> {
    fn new(root: &Root, meta: &'a [u8]) -> Result<Heaps<'a>> {
        Ok(Heaps {
            strings: root
                .stream_data(meta, "#Strings")
                .map(Strings::from)
                .transpose()?,
            blob: root.stream_data(meta, "#Blob").map(Blob::from).transpose()?,
            guid: root.stream_data(meta, "#GUID").map(Guid::from).transpose()?,
            user_strings: root.stream_data(meta, "#US").unwrap_or_default(),
        })
    }

    fn string(&self, index: u32) -> Result<String> {
        if index == 0 {
            return Ok(String::new());
        }

        match &self.strings {
            Some(strings) => Ok(strings.get(index as usize)?.to_string()),
            None => Err(malformed_error!("Metadata has no #Strings heap")),
        }
    }

    fn blob(&self, index: u32) -> Result<&'a [u8]> {
        if index == 0 {
            return Ok(&[]);
        }

        match &self.blob {
            Some(blob) => blob.get(index as usize),
            None => Err(malformed_error!("Metadata has no #Blob heap")),
        }
    }

    fn guid(&self, index: u32) -> Option<uguid::Guid> {
        self.guid.as_ref()?.get(index as usize).ok()
    }
}

/// All rows of the table of `T`, empty if the table is absent.
fn rows<T: RowReadable>(tables: &TablesHeader) -> Result<Vec<T>> {
    match tables.table::<T>()? {
        Some(table) => table.iter().collect(),
        None => Ok(Vec::new()),
    }
}

/// The logical member list `start..next` of a type, clamped to the table.
fn member_range(start: u32, next: Option<u32>, count: usize) -> Range<u32> {
    let limit = u32::try_from(count).unwrap_or(u32::MAX).saturating_add(1);
    let end = next.unwrap_or(limit).min(limit);
    start.max(1).min(end)..end
}

/// Map a logical member index through an optional pointer table.
fn physical(pointers: &[u32], index: u32) -> u32 {
    if pointers.is_empty() {
        index
    } else {
        pointers.get(index as usize - 1).copied().unwrap_or(0)
    }
}

/// The signature of a `TypeDefOrRef` coded index.
fn type_of(index: &CodedIndex, type_specs: &[TypeSignature]) -> TypeSignature {
    match index.tag {
        TableId::TypeSpec => type_specs
            .get((index.row as usize).wrapping_sub(1))
            .cloned()
            .unwrap_or_default(),
        _ => TypeSignature::Class(index.token),
    }
}

fn reflection_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// Everything the module owns besides the image.
struct Contents {
    name: String,
    mvid: Option<uguid::Guid>,
    runtime_version: String,
    identity: Option<AssemblyIdentity>,
    references: Vec<AssemblyIdentity>,
    target_framework: TargetFramework,
    entry_point: Option<Token>,
    table_rows: Vec<(TableId, u32)>,
    types: Vec<TypeDefinition>,
    type_refs: Vec<TypeReference>,
    type_specs: Vec<TypeSignature>,
    member_refs: Vec<MemberReference>,
    method_specs: Vec<MethodSpecification>,
    local_signatures: Vec<Option<Vec<TypeSignature>>>,
    field_constants: Vec<(Token, ConstantValue)>,
    user_strings: Vec<u8>,
    method_owners: Vec<(usize, usize)>,
    field_owners: Vec<(usize, usize)>,
}

impl Contents {
    fn read(file: &File) -> Result<Contents> {
        let (clr_rva, clr_size) = file.clr()?;
        let clr_offset = file.rva_to_offset(clr_rva)?;
        let header = Cor20Header::read(file.data_slice(clr_offset, clr_size)?)?;

        let meta_offset = file.rva_to_offset(header.meta_data_rva as usize)?;
        let meta = file.data_slice(meta_offset, header.meta_data_size as usize)?;
        let root = Root::read(meta)?;
        let heaps = Heaps::new(&root, meta)?;

        let Some(tables_data) = root.tables_data(meta) else {
            return Err(malformed_error!("Metadata does not contain a tables stream"));
        };
        let tables = TablesHeader::from(tables_data)?;
        debug!(
            "Metadata {} with {} tables, {} streams",
            root.version,
            tables.table_count(),
            root.stream_headers.len()
        );

        let module = rows::<ModuleRaw>(&tables)?;
        let (name, mvid) = match module.first() {
            Some(row) => (heaps.string(row.name)?, heaps.guid(row.mvid)),
            None => return Err(malformed_error!("Metadata does not contain a Module row")),
        };

        let identity = match rows::<AssemblyRaw>(&tables)?.first() {
            Some(row) => Some(AssemblyIdentity::from_row(
                &heaps.string(row.name)?,
                AssemblyVersion::new(
                    row.major_version,
                    row.minor_version,
                    row.build_number,
                    row.revision_number,
                ),
                &heaps.string(row.culture)?,
                row.flags,
                heaps.blob(row.public_key)?,
            )),
            None => None,
        };

        let references = rows::<AssemblyRefRaw>(&tables)?
            .iter()
            .map(|row| {
                Ok(AssemblyIdentity::from_row(
                    &heaps.string(row.name)?,
                    AssemblyVersion::new(
                        row.major_version,
                        row.minor_version,
                        row.build_number,
                        row.revision_number,
                    ),
                    &heaps.string(row.culture)?,
                    row.flags,
                    heaps.blob(row.public_key_or_token)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let type_refs = rows::<TypeRefRaw>(&tables)?
            .iter()
            .map(|row| {
                Ok(TypeReference {
                    token: TypeRefRaw::token(row.rid),
                    resolution_scope: row.resolution_scope,
                    namespace: heaps.string(row.type_namespace)?,
                    name: heaps.string(row.type_name)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let type_specs = rows::<TypeSpecRaw>(&tables)?
            .iter()
            .map(|row| {
                let blob = heaps.blob(row.signature)?;
                Ok(match SignatureParser::new(blob).parse_type_spec() {
                    Ok(signature) => signature,
                    Err(error) => {
                        warn!("Invalid TypeSpec signature in row {}: {error}", row.rid);
                        TypeSignature::Unknown
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let member_refs = rows::<MemberRefRaw>(&tables)?
            .iter()
            .map(|row| {
                let blob = heaps.blob(row.signature)?;
                let mut parser = SignatureParser::new(blob);
                let signature = if blob.first() == Some(&0x06) {
                    MemberSignature::Field(parser.parse_field_signature()?.base)
                } else {
                    MemberSignature::Method(parser.parse_method_signature()?)
                };

                Ok(MemberReference {
                    token: MemberRefRaw::token(row.rid),
                    parent: row.class,
                    name: heaps.string(row.name)?,
                    signature,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let method_specs = rows::<MethodSpecRaw>(&tables)?
            .iter()
            .map(|row| {
                let blob = heaps.blob(row.instantiation)?;
                Ok(MethodSpecification {
                    token: MethodSpecRaw::token(row.rid),
                    method: row.method.token,
                    arguments: SignatureParser::new(blob).parse_method_spec_signature()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let local_signatures = rows::<StandAloneSigRaw>(&tables)?
            .iter()
            .map(|row| {
                let blob = heaps.blob(row.signature)?;
                if blob.first() != Some(&0x07) {
                    return Ok(None);
                }

                Ok(match SignatureParser::new(blob).parse_local_var_signature() {
                    Ok(locals) => Some(locals),
                    Err(error) => {
                        warn!("Invalid local signature in row {}: {error}", row.rid);
                        None
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let builder = TypeBuilder {
            file,
            heaps: &heaps,
            tables: &tables,
            type_refs: &type_refs,
            type_specs: &type_specs,
        };
        let (types, method_owners, field_owners) = builder.types()?;
        let field_constants = builder.field_constants()?;

        let target_framework = builder
            .target_framework(&member_refs)?
            .unwrap_or_else(|| TargetFramework::from_runtime_version(&root.version));

        let entry_point = header
            .entry_point()
            .filter(|token| token.table() == TableId::MethodDef as u8);

        Ok(Contents {
            name,
            mvid,
            runtime_version: root.version.clone(),
            identity,
            references,
            target_framework,
            entry_point,
            table_rows: tables.table_summary(),
            types,
            type_refs,
            type_specs,
            member_refs,
            method_specs,
            local_signatures,
            field_constants,
            user_strings: heaps.user_strings.to_vec(),
            method_owners,
            field_owners,
        })
    }
}

/// Resolves `TypeDef` rows and the rows they own into [`TypeDefinition`]s.
struct TypeBuilder<'a> {
    file: &'a File,
    heaps: &'a Heaps<'a>,
    tables: &'a TablesHeader<'a>,
    type_refs: &'a [TypeReference],
    type_specs: &'a [TypeSignature],
}

type Owners = Vec<(usize, usize)>;

impl TypeBuilder<'_> {
    fn types(&self) -> Result<(Vec<TypeDefinition>, Owners, Owners)> {
        let type_rows = rows::<TypeDefRaw>(self.tables)?;
        let field_rows = rows::<FieldRaw>(self.tables)?;
        let method_rows = rows::<MethodDefRaw>(self.tables)?;
        let param_rows = rows::<ParamRaw>(self.tables)?;
        let field_pointers: Vec<u32> = rows::<FieldPtrRaw>(self.tables)?
            .iter()
            .map(|row| row.field)
            .collect();
        let method_pointers: Vec<u32> = rows::<MethodPtrRaw>(self.tables)?
            .iter()
            .map(|row| row.method)
            .collect();

        let generic_params = self.generic_params()?;
        let names = type_rows
            .iter()
            .map(|row| {
                Ok((
                    self.heaps.string(row.type_namespace)?,
                    self.heaps.string(row.type_name)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let field_count = if field_pointers.is_empty() {
            field_rows.len()
        } else {
            field_pointers.len()
        };
        let method_count = if method_pointers.is_empty() {
            method_rows.len()
        } else {
            method_pointers.len()
        };

        let mut types = Vec::with_capacity(type_rows.len());
        let mut method_owners = vec![(usize::MAX, 0); method_rows.len()];
        let mut field_owners = vec![(usize::MAX, 0); field_rows.len()];

        for (index, row) in type_rows.iter().enumerate() {
            let next = type_rows.get(index + 1);
            let (namespace, name) = names[index].clone();
            let token = TypeDefRaw::token(row.rid);

            let mut fields = Vec::new();
            for logical in member_range(row.field_list, next.map(|n| n.field_list), field_count) {
                let rid = physical(&field_pointers, logical);
                let field_row = field_rows
                    .get((rid as usize).wrapping_sub(1))
                    .ok_or(OutOfBounds)?;

                if let Some(owner) = field_owners.get_mut(rid as usize - 1) {
                    *owner = (index, fields.len());
                }
                fields.push(self.field(field_row)?);
            }

            let mut methods = Vec::new();
            for logical in member_range(row.method_list, next.map(|n| n.method_list), method_count) {
                let rid = physical(&method_pointers, logical);
                let method_index = (rid as usize).wrapping_sub(1);
                let method_row = method_rows.get(method_index).ok_or(OutOfBounds)?;
                let next_params = method_rows.get(method_index + 1).map(|n| n.param_list);

                if let Some(owner) = method_owners.get_mut(method_index) {
                    *owner = (index, methods.len());
                }

                let mut method = self.method(method_row, &param_rows, next_params)?;
                method.generic_params = generic_params
                    .get(&MethodDefRaw::token(rid))
                    .cloned()
                    .unwrap_or_default();
                methods.push(method);
            }

            let base_type = if row.extends.is_null() {
                None
            } else {
                Some(type_of(&row.extends, self.type_specs))
            };
            let base_name = match row.extends.tag {
                _ if row.extends.is_null() => None,
                TableId::TypeDef => names
                    .get(row.extends.row as usize - 1)
                    .map(|(ns, n)| reflection_name(ns, n)),
                TableId::TypeRef => self
                    .type_refs
                    .get(row.extends.row as usize - 1)
                    .map(TypeReference::reflection_name),
                _ => None,
            };

            types.push(TypeDefinition {
                token,
                flags: row.flags,
                kind: TypeKind::classify(
                    row.flags,
                    &reflection_name(&namespace, &name),
                    base_name.as_deref(),
                ),
                namespace,
                name,
                base_type,
                interfaces: Vec::new(),
                generic_params: generic_params.get(&token).cloned().unwrap_or_default(),
                fields,
                methods,
                enclosing_type: None,
                nested_types: Vec::new(),
            });
        }

        for row in rows::<NestedClassRaw>(self.tables)? {
            let enclosing = TypeDefRaw::token(row.enclosing_class);
            match types.get_mut((row.nested_class as usize).wrapping_sub(1)) {
                Some(nested) if row.nested_class != row.enclosing_class => {
                    nested.enclosing_type = Some(enclosing);
                }
                _ => {
                    warn!("Ignoring invalid NestedClass row {}", row.rid);
                    continue;
                }
            }
            if let Some(outer) = types.get_mut((row.enclosing_class as usize).wrapping_sub(1)) {
                outer.nested_types.push(TypeDefRaw::token(row.nested_class));
            }
        }
        for definition in &mut types {
            definition.nested_types.sort();
        }

        for row in rows::<InterfaceImplRaw>(self.tables)? {
            if let Some(definition) = types.get_mut((row.class as usize).wrapping_sub(1)) {
                definition
                    .interfaces
                    .push(type_of(&row.interface, self.type_specs));
            }
        }

        Ok((types, method_owners, field_owners))
    }

    fn field(&self, row: &FieldRaw) -> Result<FieldDefinition> {
        let blob = self.heaps.blob(row.signature)?;
        Ok(FieldDefinition {
            token: FieldRaw::token(row.rid),
            name: self.heaps.string(row.name)?,
            flags: row.flags,
            signature: SignatureParser::new(blob).parse_field_signature()?.base,
        })
    }

    fn method(
        &self,
        row: &MethodDefRaw,
        param_rows: &[ParamRaw],
        next_params: Option<u32>,
    ) -> Result<MethodDefinition> {
        let name = self.heaps.string(row.name)?;
        let blob = self.heaps.blob(row.signature)?;
        let signature = SignatureParser::new(blob).parse_method_signature()?;

        let params = member_range(row.param_list, next_params, param_rows.len())
            .filter_map(|rid| param_rows.get(rid as usize - 1))
            .map(|param| {
                Ok(ParamDefinition {
                    sequence: param.sequence,
                    name: self.heaps.string(param.name)?,
                    flags: param.flags,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let body = if row.rva != 0 && row.impl_flags & CODE_TYPE_MASK == 0 {
            match self.method_body(row.rva) {
                Ok(body) => Some(body),
                Err(error) => {
                    warn!("Skipping body of method {name} at RVA 0x{:x}: {error}", row.rva);
                    None
                }
            }
        } else {
            None
        };

        Ok(MethodDefinition {
            token: MethodDefRaw::token(row.rid),
            name,
            flags: row.flags,
            impl_flags: row.impl_flags,
            rva: row.rva,
            signature,
            params,
            generic_params: Vec::new(),
            body,
        })
    }

    fn method_body(&self, rva: u32) -> Result<MethodBody> {
        let offset = self.file.rva_to_offset(rva as usize)?;
        let data = self.file.data().get(offset..).ok_or(OutOfBounds)?;
        MethodBody::from(data)
    }

    /// Generic parameter names per owning `TypeDef` or `MethodDef`, in position order.
    fn generic_params(&self) -> Result<HashMap<Token, Vec<String>>> {
        let mut by_owner: HashMap<Token, Vec<(u16, String)>> = HashMap::new();
        for row in rows::<GenericParamRaw>(self.tables)? {
            by_owner
                .entry(row.owner.token)
                .or_default()
                .push((row.number, self.heaps.string(row.name)?));
        }

        Ok(by_owner
            .into_iter()
            .map(|(owner, mut params)| {
                params.sort_by_key(|(number, _)| *number);
                (owner, params.into_iter().map(|(_, name)| name).collect())
            })
            .collect())
    }

    fn field_constants(&self) -> Result<Vec<(Token, ConstantValue)>> {
        let mut constants = Vec::new();
        for row in rows::<ConstantRaw>(self.tables)? {
            if row.parent.tag != TableId::Field {
                continue;
            }

            match decode_constant(row.element_type, self.heaps.blob(row.value)?) {
                Ok(value) => constants.push((row.parent.token, value)),
                Err(error) => warn!("Invalid constant in row {}: {error}", row.rid),
            }
        }

        Ok(constants)
    }

    /// The framework named by the assembly's `TargetFrameworkAttribute`.
    fn target_framework(&self, member_refs: &[MemberReference]) -> Result<Option<TargetFramework>> {
        for row in rows::<CustomAttributeRaw>(self.tables)? {
            if row.parent.tag != TableId::Assembly || row.constructor.tag != TableId::MemberRef {
                continue;
            }

            let Some(constructor) = member_refs.get((row.constructor.row as usize).wrapping_sub(1))
            else {
                continue;
            };
            let is_target_framework = constructor.parent.tag == TableId::TypeRef
                && self
                    .type_refs
                    .get((constructor.parent.row as usize).wrapping_sub(1))
                    .is_some_and(|reference| {
                        reference.reflection_name() == TARGET_FRAMEWORK_ATTRIBUTE
                    });
            if !is_target_framework {
                continue;
            }

            let mut parser = Parser::new(self.heaps.blob(row.value)?);
            if parser.read_le::<u16>()? != 0x0001 {
                return Err(malformed_error!(
                    "Invalid custom attribute prolog in row {}",
                    row.rid
                ));
            }

            if let Some(value) = parser.read_ser_string()? {
                debug!("Target framework attribute: {value}");
                return Ok(TargetFramework::from_attribute(&value));
            }
        }

        Ok(None)
    }
}

/// Decode a `Constant` value blob of type `element_type`.
fn decode_constant(element_type: u8, data: &[u8]) -> Result<ConstantValue> {
    let mut parser = Parser::new(data);
    Ok(match element_type {
        ELEMENT_TYPE::BOOLEAN => ConstantValue::Boolean(parser.read_le::<u8>()? != 0),
        ELEMENT_TYPE::CHAR => ConstantValue::Char(parser.read_le::<u16>()?),
        ELEMENT_TYPE::I1 => ConstantValue::Signed(i64::from(parser.read_le::<i8>()?), element_type),
        ELEMENT_TYPE::I2 => {
            ConstantValue::Signed(i64::from(parser.read_le::<i16>()?), element_type)
        }
        ELEMENT_TYPE::I4 => {
            ConstantValue::Signed(i64::from(parser.read_le::<i32>()?), element_type)
        }
        ELEMENT_TYPE::I8 => ConstantValue::Signed(parser.read_le::<i64>()?, element_type),
        ELEMENT_TYPE::U1 => {
            ConstantValue::Unsigned(u64::from(parser.read_le::<u8>()?), element_type)
        }
        ELEMENT_TYPE::U2 => {
            ConstantValue::Unsigned(u64::from(parser.read_le::<u16>()?), element_type)
        }
        ELEMENT_TYPE::U4 => {
            ConstantValue::Unsigned(u64::from(parser.read_le::<u32>()?), element_type)
        }
        ELEMENT_TYPE::U8 => ConstantValue::Unsigned(parser.read_le::<u64>()?, element_type),
        ELEMENT_TYPE::R4 => ConstantValue::R4(parser.read_le::<f32>()?),
        ELEMENT_TYPE::R8 => ConstantValue::R8(parser.read_le::<f64>()?),
        ELEMENT_TYPE::STRING => {
            let units: Vec<u16> = data
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            ConstantValue::String(String::from_utf16_lossy(&units))
        }
        ELEMENT_TYPE::CLASS => ConstantValue::Null,
        _ => {
            return Err(malformed_error!(
                "Unsupported constant type - {}",
                element_type
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges() {
        assert_eq!(member_range(1, Some(3), 5), 1..3);
        assert_eq!(member_range(3, None, 5), 3..6);
        assert_eq!(member_range(6, None, 5), 6..6);
        assert_eq!(member_range(4, Some(9), 5), 4..6);
        assert_eq!(member_range(0, Some(1), 0), 1..1);
        assert!(member_range(5, Some(2), 5).is_empty());
    }

    #[test]
    fn pointer_tables() {
        assert_eq!(physical(&[], 4), 4);
        assert_eq!(physical(&[3, 1, 2], 1), 3);
        assert_eq!(physical(&[3, 1, 2], 3), 2);
    }

    #[test]
    fn constants() {
        assert_eq!(
            decode_constant(ELEMENT_TYPE::I4, &[0xFE, 0xFF, 0xFF, 0xFF]).unwrap(),
            ConstantValue::Signed(-2, ELEMENT_TYPE::I4)
        );
        assert_eq!(
            decode_constant(ELEMENT_TYPE::U1, &[0xFF]).unwrap(),
            ConstantValue::Unsigned(255, ELEMENT_TYPE::U1)
        );
        assert_eq!(
            decode_constant(ELEMENT_TYPE::BOOLEAN, &[0x01]).unwrap(),
            ConstantValue::Boolean(true)
        );
        assert_eq!(
            decode_constant(ELEMENT_TYPE::STRING, &[0x68, 0x00, 0x69, 0x00]).unwrap(),
            ConstantValue::String("hi".to_string())
        );
        assert_eq!(
            decode_constant(ELEMENT_TYPE::CLASS, &[0, 0, 0, 0]).unwrap(),
            ConstantValue::Null
        );
        assert!(decode_constant(ELEMENT_TYPE::I8, &[0x01]).is_err());
        assert!(decode_constant(ELEMENT_TYPE::OBJECT, &[]).is_err());
    }
}
