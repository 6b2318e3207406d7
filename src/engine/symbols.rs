//! Debug symbol loading.
//!
//! Two symbol formats are recognised: portable PDBs, which are metadata images with a
//! `#Pdb` stream, and Windows PDBs in the MSF container format. Portable PDBs are read
//! completely: their documents and the sequence points of every method become part of
//! [`DebugInfo`]. Windows PDBs are accepted as a symbol source but carry no sequence points.
//!
//! A portable PDB belongs to a module if the first 16 bytes of its PDB id equal the GUID of
//! the module's CodeView debug entry.
//!
//! # Reference
//! - [Portable PDB v1.0: Format Specification](https://github.com/dotnet/runtime/blob/main/docs/design/specs/PortablePdb-Metadata.md)

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    engine::SymbolProvider,
    file::{io::read_le_at, parser::Parser},
    metadata::{
        root::Root,
        streams::{Blob, TablesHeader},
        tables::{DocumentRaw, MethodDebugInformationRaw},
        token::Token,
    },
    module::Module,
    Error, Result,
};

/// Header of a Windows PDB (MSF 7.0 container).
pub const MSF_MAGIC: &[u8] = b"Microsoft C/C++ MSF 7.00\r\n\x1ADS\0\0\0";

/// Start line of a hidden sequence point.
pub const HIDDEN_LINE: u32 = 0x00FE_EFEE;

/// Container format of a symbol file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolFormat {
    /// Portable PDB
    Portable,
    /// Windows PDB
    Windows,
}

/// Source position of an IL offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePoint {
    /// IL offset in the method body
    pub offset: u32,
    /// `Document` row the lines refer to
    pub document: u32,
    /// First line, [`HIDDEN_LINE`] for hidden points
    pub start_line: u32,
    /// First column
    pub start_column: u32,
    /// Last line
    pub end_line: u32,
    /// Column after the last character
    pub end_column: u32,
}

impl SequencePoint {
    /// Whether the point hides its IL range from the debugger.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.start_line == HIDDEN_LINE
    }
}

/// Symbols attached to a module.
#[derive(Debug, Clone)]
pub struct DebugInfo {
    /// The symbol file
    pub path: PathBuf,
    /// Its format
    pub format: SymbolFormat,
    /// PDB id of portable PDBs: GUID followed by the timestamp
    pub id: Option<[u8; 20]>,
    /// Document names by `Document` row minus one
    pub documents: Vec<String>,
    methods: HashMap<u32, Vec<SequencePoint>>,
}

impl DebugInfo {
    /// Sequence points of the method with `token`, in IL order.
    #[must_use]
    pub fn sequence_points(&self, method: Token) -> &[SequencePoint] {
        self.methods
            .get(&method.row())
            .map_or(&[], Vec::as_slice)
    }

    /// Name of the `Document` row `document`.
    #[must_use]
    pub fn document_name(&self, document: u32) -> Option<&str> {
        self.documents
            .get((document as usize).checked_sub(1)?)
            .map(String::as_str)
    }

    /// Human readable source description for output headers.
    #[must_use]
    pub fn description(&self) -> String {
        let kind = match self.format {
            SymbolFormat::Portable => "portable PDB",
            SymbolFormat::Windows => "Windows PDB",
        };
        format!("{kind} {}", self.path.display())
    }
}

fn invalid(path: &Path, reason: impl Into<String>) -> Error {
    Error::InvalidSymbols {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Parse symbol file contents.
///
/// # Errors
/// Returns [`Error::InvalidSymbols`] if `data` is neither a portable nor a Windows PDB, or
/// the portable PDB is malformed.
pub fn read_symbols(path: &Path, data: &[u8]) -> Result<DebugInfo> {
    if data.starts_with(MSF_MAGIC) {
        debug!("{} is a Windows PDB; sequence points are not read", path.display());
        return Ok(DebugInfo {
            path: path.to_path_buf(),
            format: SymbolFormat::Windows,
            id: None,
            documents: Vec::new(),
            methods: HashMap::new(),
        });
    }

    let root = Root::read(data).map_err(|error| invalid(path, format!("unknown format ({error})")))?;
    let Some(pdb_stream) = root.stream_data(data, "#Pdb") else {
        return Err(invalid(path, "metadata without a #Pdb stream"));
    };
    read_portable(path, &root, data, pdb_stream)
        .map_err(|error| match error {
            Error::InvalidSymbols { .. } => error,
            other => invalid(path, other.to_string()),
        })
}

fn read_portable(path: &Path, root: &Root, data: &[u8], pdb_stream: &[u8]) -> Result<DebugInfo> {
    if pdb_stream.len() < 20 {
        return Err(invalid(path, "truncated #Pdb stream"));
    }
    let mut id = [0_u8; 20];
    id.copy_from_slice(&pdb_stream[..20]);
    let mut offset = 20;
    let entry_point = read_le_at::<u32>(pdb_stream, &mut offset)?;

    let blob = Blob::from(root.stream_data(data, "#Blob").unwrap_or(&[0]))?;
    let Some(tables_data) = root.tables_data(data) else {
        return Err(invalid(path, "metadata without a tables stream"));
    };
    let tables = TablesHeader::from(tables_data)?;

    let mut documents = Vec::new();
    if let Some(table) = tables.table::<DocumentRaw>()? {
        for row in table.iter() {
            documents.push(document_name(&blob, row?.name)?);
        }
    }

    let mut methods = HashMap::new();
    if let Some(table) = tables.table::<MethodDebugInformationRaw>()? {
        for row in table.iter() {
            let row = row?;
            if row.sequence_points == 0 {
                continue;
            }
            let points = decode_sequence_points(blob.get(row.sequence_points as usize)?, row.document)?;
            methods.insert(row.rid, points);
        }
    }

    debug!(
        "Portable PDB {} with {} documents, {} methods with sequence points, entry point 0x{:08x}",
        path.display(),
        documents.len(),
        methods.len(),
        entry_point
    );
    Ok(DebugInfo {
        path: path.to_path_buf(),
        format: SymbolFormat::Portable,
        id: Some(id),
        documents,
        methods,
    })
}

/// Decode a `Document.Name` blob: a separator followed by blob indexes of UTF-8 parts.
fn document_name(blob: &Blob, index: u32) -> Result<String> {
    let mut parser = Parser::new(blob.get(index as usize)?);
    let separator = parser.read_le::<u8>()?;

    let mut parts = Vec::new();
    while parser.has_more_data() {
        let part = parser.read_compressed_uint()?;
        parts.push(String::from_utf8_lossy(blob.get(part as usize)?).into_owned());
    }

    Ok(if separator == 0 {
        parts.concat()
    } else {
        parts.join(&char::from(separator).to_string())
    })
}

/// Decode a sequence points blob; `document` is the row's document, 0 if the blob names
/// the initial document itself.
///
/// # Errors
/// Returns an error if the blob is truncated or the deltas leave the valid range.
pub fn decode_sequence_points(data: &[u8], document: u32) -> Result<Vec<SequencePoint>> {
    let mut parser = Parser::new(data);
    let _local_signature = parser.read_compressed_uint()?;
    let mut document = if document == 0 {
        parser.read_compressed_uint()?
    } else {
        document
    };

    let mut points = Vec::new();
    let mut offset = 0_u32;
    let mut previous: Option<(u32, u32)> = None;
    while parser.has_more_data() {
        let delta_offset = parser.read_compressed_uint()?;
        if delta_offset == 0 && !points.is_empty() {
            document = parser.read_compressed_uint()?;
            continue;
        }
        offset = offset
            .checked_add(delta_offset)
            .ok_or_else(|| malformed_error!("IL offset overflow in sequence points"))?;

        let delta_lines = parser.read_compressed_uint()?;
        let delta_columns = if delta_lines == 0 {
            i64::from(parser.read_compressed_uint()?)
        } else {
            i64::from(parser.read_compressed_int()?)
        };

        if delta_lines == 0 && delta_columns == 0 {
            points.push(SequencePoint {
                offset,
                document,
                start_line: HIDDEN_LINE,
                start_column: 0,
                end_line: HIDDEN_LINE,
                end_column: 0,
            });
            continue;
        }

        let (start_line, start_column) = match previous {
            None => (parser.read_compressed_uint()?, parser.read_compressed_uint()?),
            Some((line, column)) => {
                let line = i64::from(line) + i64::from(parser.read_compressed_int()?);
                let column = i64::from(column) + i64::from(parser.read_compressed_int()?);
                (
                    u32::try_from(line).map_err(|_| malformed_error!("Negative line {}", line))?,
                    u32::try_from(column)
                        .map_err(|_| malformed_error!("Negative column {}", column))?,
                )
            }
        };
        previous = Some((start_line, start_column));

        let end_column = i64::from(start_column) + delta_columns;
        points.push(SequencePoint {
            offset,
            document,
            start_line,
            start_column,
            end_line: start_line.saturating_add(delta_lines),
            end_column: u32::try_from(end_column)
                .map_err(|_| malformed_error!("Negative column {}", end_column))?,
        });
    }

    Ok(points)
}

/// The file name part of a CodeView PDB path, which may use Windows separators.
fn codeview_file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// Symbol provider reading portable and Windows PDBs from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeSymbolProvider;

impl NativeSymbolProvider {
    /// Candidate symbol files of `module`, in lookup order.
    #[must_use]
    pub fn candidates(module: &Module) -> Vec<PathBuf> {
        let directory = module.path.parent().unwrap_or_else(|| Path::new(""));
        let mut candidates = Vec::new();

        if let Some(codeview) = module.codeview().and_then(|entry| entry.codeview.as_ref()) {
            if !codeview.path.is_empty() {
                candidates.push(PathBuf::from(&codeview.path));
                candidates.push(directory.join(codeview_file_name(&codeview.path)));
            }
        }
        if let Some(stem) = module.path.file_stem() {
            let mut name = stem.to_os_string();
            name.push(".pdb");
            candidates.push(directory.join(name));
        }

        candidates.dedup();
        candidates
    }
}

impl SymbolProvider for NativeSymbolProvider {
    fn load_symbols(&self, module: &Module) -> Result<Option<DebugInfo>> {
        for candidate in Self::candidates(module) {
            if candidate.is_file() {
                debug!("Found symbols for {} at {}", module.name, candidate.display());
                return self.from_file(module, &candidate).map(Some);
            }
        }

        debug!("No symbols found for {}", module.name);
        Ok(None)
    }

    fn from_file(&self, module: &Module, path: &Path) -> Result<DebugInfo> {
        let data = fs::read(path).map_err(|error| invalid(path, error.to_string()))?;
        let info = read_symbols(path, &data)?;

        let expected = module
            .codeview()
            .and_then(|entry| entry.codeview.as_ref())
            .map(|codeview| codeview.guid.to_bytes());
        if let (Some(expected), Some(id)) = (expected, info.id) {
            if id[..16] != expected {
                return Err(invalid(
                    path,
                    format!("PDB id does not match the CodeView entry of {}", module.name),
                ));
            }
        }

        Ok(info)
    }
}
