//! Portable PDB generation for decompiled sources.
//!
//! [`PortablePdbWriter`] decompiles every top-level type into its own document (named like
//! the file the project writer would create for it) and maps each rendered method to the
//! line and columns of its declaration. The result is a standalone portable PDB metadata
//! image: the `#Pdb` stream carries the id taken from the module's CodeView entry, so
//! debuggers accept it for exactly that build.
//!
//! Only the `Document` and `MethodDebugInformation` tables are written. Every `MethodDef`
//! row gets a `MethodDebugInformation` row; methods without a rendered declaration keep
//! an empty one.
//!
//! # Reference
//! - [Portable PDB v1.0](https://github.com/dotnet/runtime/blob/main/docs/design/specs/PortablePdb-Metadata.md)

use std::{collections::HashMap, io::Write};

use log::debug;
use sha2::{Digest, Sha256};

use crate::{
    engine::{project::source_paths, DecompileContext, Decompiler, PdbWriter},
    file::io::{write_compressed_uint, write_le},
    metadata::{
        tables::TableId,
        typesystem::FullTypeName,
        writer::{write_root, BlobBuilder, GuidBuilder, StringsBuilder, TablesBuilder, UserStringsBuilder},
    },
    Error, Result,
};

/// `Document.HashAlgorithm` for SHA-256.
pub const HASH_ALGORITHM_SHA256: uguid::Guid = uguid::guid!("8829d00f-11b8-4213-878b-770e8597ac16");

/// `Document.Language` for C#.
pub const LANGUAGE_CSHARP: uguid::Guid = uguid::guid!("3f5162f8-07c6-11d3-9053-00c04fa302a1");

/// Metadata version string of portable PDBs.
pub const PDB_VERSION: &str = "PDB v1.0";

/// First table id that belongs to the debug tables rather than the type system.
const FIRST_DEBUG_TABLE: u8 = TableId::Document as u8;

/// Encode a document name blob: the `/` separator followed by the blob index of each part.
///
/// # Errors
/// Returns an error if the blob heap overflows.
pub fn document_name(blobs: &mut BlobBuilder, name: &str) -> Result<u32> {
    let mut encoded = vec![b'/'];
    for part in name.split('/') {
        let index = if part.is_empty() { 0 } else { blobs.add(part.as_bytes())? };
        write_compressed_uint(&mut encoded, index)?;
    }
    blobs.add(&encoded)
}

/// Encode the sequence points of one declaration: a single visible point covering
/// `start_column..end_column` of `line`, at IL offset 0.
///
/// # Errors
/// Returns an error if the span is empty.
pub fn declaration_points(line: u32, start_column: u32, end_column: u32) -> Result<Vec<u8>> {
    if end_column <= start_column {
        return Err(malformed_error!(
            "Empty declaration span {}..{} on line {}",
            start_column,
            end_column,
            line
        ));
    }

    let mut blob = Vec::new();
    // LocalSignature, IL offset, ΔLines
    write_compressed_uint(&mut blob, 0)?;
    write_compressed_uint(&mut blob, 0)?;
    write_compressed_uint(&mut blob, 0)?;
    write_compressed_uint(&mut blob, end_column - start_column)?;
    write_compressed_uint(&mut blob, line)?;
    write_compressed_uint(&mut blob, start_column)?;
    Ok(blob)
}

fn pdb_stream(id: &[u8; 20], entry_point: u32, external_rows: &[(TableId, u32)]) -> Vec<u8> {
    let mut data = id.to_vec();
    write_le::<u32>(&mut data, entry_point);

    let mut referenced = 0_u64;
    for (table, _) in external_rows {
        referenced |= 1 << (*table as u8);
    }
    write_le::<u64>(&mut data, referenced);
    for (_, rows) in external_rows {
        write_le::<u32>(&mut data, *rows);
    }
    data
}

/// The native portable PDB writer.
#[derive(Debug, Default, Clone, Copy)]
pub struct PortablePdbWriter;

impl PortablePdbWriter {
    /// Build the PDB image for the module of `context`.
    ///
    /// # Errors
    /// Returns an error if the module has no CodeView entry or a type cannot be rendered.
    pub fn build(context: &DecompileContext, decompiler: &dyn Decompiler) -> Result<Vec<u8>> {
        let module = context.module;
        let id = module
            .codeview()
            .and_then(|entry| entry.pdb_id())
            .ok_or_else(|| Error::Error(format!("{} has no CodeView debug entry", module.file_name())))?;

        let strings = StringsBuilder::default();
        let mut guids = GuidBuilder::default();
        let mut blobs = BlobBuilder::default();
        let user_strings = UserStringsBuilder::default();
        let mut tables = TablesBuilder::default();

        let hash_algorithm = guids.add(HASH_ALGORITHM_SHA256);
        let language = guids.add(LANGUAGE_CSHARP);

        let mut points: HashMap<u32, (u32, Vec<u8>)> = HashMap::new();
        for (path, definition) in source_paths(module) {
            let name = FullTypeName::new(&module.reflection_name(definition));
            let source = decompiler.decompile_type(context, &name)?;

            let hash = Sha256::digest(source.text.as_bytes());
            let values = vec![
                document_name(&mut blobs, &path)?,
                hash_algorithm,
                blobs.add(&hash)?,
                language,
            ];
            let document = tables.add_row(TableId::Document, values)?;

            for span in &source.method_spans {
                let blob = declaration_points(span.line, span.start_column, span.end_column)?;
                points.insert(span.method.row(), (document, blob));
            }
        }

        let methods = module.row_count(TableId::MethodDef);
        for row in 1..=methods {
            let values = match points.remove(&row) {
                Some((document, blob)) => vec![document, blobs.add(&blob)?],
                None => vec![0, 0],
            };
            tables.add_row(TableId::MethodDebugInformation, values)?;
        }
        debug!(
            "PDB for {}: {} documents, {} methods",
            module.name,
            tables.row_count(TableId::Document),
            methods
        );

        let mut external_rows: Vec<(TableId, u32)> = module
            .table_rows
            .iter()
            .filter(|(table, rows)| (*table as u8) < FIRST_DEBUG_TABLE && *rows > 0)
            .copied()
            .collect();
        external_rows.sort_by_key(|(table, _)| *table as u8);

        let entry_point = module.entry_point.map_or(0, |token| token.value());
        let pdb = pdb_stream(&id, entry_point, &external_rows);
        let table_stream = tables.build(strings.data(), guids.data(), blobs.data(), &external_rows, 0)?;

        write_root(
            PDB_VERSION,
            &[
                ("#Pdb", &pdb),
                ("#~", &table_stream),
                ("#Strings", strings.data()),
                ("#US", user_strings.data()),
                ("#GUID", guids.data()),
                ("#Blob", blobs.data()),
            ],
        )
    }
}

impl PdbWriter for PortablePdbWriter {
    fn write_pdb(&self, context: &DecompileContext, decompiler: &dyn Decompiler, out: &mut dyn Write) -> Result<()> {
        let image = Self::build(context, decompiler)?;
        out.write_all(&image)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{
        engine::{
            csharp::CSharpDecompiler,
            resolver::SearchPathResolver,
            symbols::{read_symbols, SymbolFormat},
            DecompilerSettings,
        },
        metadata::token::Token,
        module::Module,
        test::AssemblyBuilder,
    };

    fn sample(codeview: bool) -> Module {
        let mut builder = AssemblyBuilder::new("Sample");
        if codeview {
            builder = builder.with_codeview();
        }
        let image = builder
            .class("Sample", "Program")
            .method("Main", true)
            .method("Run", false)
            .interface("Sample.Api", "IService")
            .method("Start", false)
            .build();
        Module::from_mem(Path::new("Sample.dll"), image).unwrap()
    }

    fn write(module: &Module) -> Result<Vec<u8>> {
        let settings = DecompilerSettings::default();
        let resolver = SearchPathResolver::default();
        let context = DecompileContext {
            module,
            settings: &settings,
            resolver: &resolver,
            debug_info: None,
        };
        let mut out = Vec::new();
        PortablePdbWriter.write_pdb(&context, &CSharpDecompiler, &mut out)?;
        Ok(out)
    }

    #[test]
    fn round_trip() {
        let module = sample(true);
        let image = write(&module).unwrap();
        let info = read_symbols(Path::new("Sample.pdb"), &image).unwrap();

        assert_eq!(info.format, SymbolFormat::Portable);
        assert_eq!(info.id, module.codeview().and_then(|entry| entry.pdb_id()));
        assert_eq!(info.documents, vec!["Sample/Program.cs", "Sample.Api/IService.cs"]);

        for row in 1..=3 {
            let points = info.sequence_points(Token::new(0x0600_0000 | row));
            assert_eq!(points.len(), 1, "method {row}");
            assert!(points[0].start_line > 1);
            assert!(points[0].end_column > points[0].start_column);
            assert_eq!(points[0].offset, 0);
        }
        assert_eq!(info.sequence_points(Token::new(0x0600_0001))[0].document, 1);
        assert_eq!(info.sequence_points(Token::new(0x0600_0003))[0].document, 2);
    }

    #[test]
    fn requires_codeview() {
        assert!(write(&sample(false)).is_err());
    }

    #[test]
    fn encodings() {
        assert_eq!(declaration_points(12, 9, 33).unwrap(), [0, 0, 0, 24, 12, 9]);
        assert!(declaration_points(1, 5, 5).is_err());

        let mut blobs = BlobBuilder::default();
        let index = document_name(&mut blobs, "Sample/Program.cs").unwrap();
        let data = blobs.data();
        let name_start = index as usize + 1;
        assert_eq!(data[name_start], b'/');
        assert_eq!(data[index as usize], 3);
    }
}
