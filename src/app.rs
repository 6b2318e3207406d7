//! Command-line surface.
//!
//! [`Invocation`] is the complete flag set of one run. Paths are checked while binding
//! (input and symbol files must exist, output and reference directories must exist), so
//! the dispatcher only ever sees usable paths. Historical single-dash spellings such as
//! `-crc` or `-usepdb:<file>` are rewritten by [`normalize_args`] before parsing.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use clap::Parser;

use crate::{
    engine::{ChecksumAlgorithm, LanguageVersion},
    metadata::typesystem::TypeKind,
};

/// ildecomp - decompile, list, disassemble and generate PDBs for .NET assemblies
#[derive(Debug, Parser)]
#[command(name = "ildecomp", about, long_about = None, disable_version_flag = true)]
pub struct Invocation {
    /// Assembly to decompile.
    #[arg(value_name = "ASSEMBLY", value_parser = existing_file)]
    pub input: Option<PathBuf>,

    /// The output directory, if omitted decompiler output is written to standard out.
    #[arg(short = 'o', long = "outputdir", value_name = "DIRECTORY", value_parser = existing_directory)]
    pub output_dir: Option<PathBuf>,

    /// Decompile assembly as compilable project. If outputdir is omitted - saved to assembly folder.
    #[arg(short = 'p', long = "project")]
    pub project: bool,

    /// Calculate assembly internal checksum.
    #[arg(short = 'c', long = "crc")]
    pub checksum: bool,

    /// Write log on checksum calculation.
    #[arg(long = "crclog")]
    pub checksum_log: bool,

    /// Hash algorithm of the checksum.
    #[arg(long = "crc-algorithm", value_name = "ALGORITHM", default_value = "sha256")]
    pub checksum_algorithm: ChecksumAlgorithm,

    /// Decompile assembly into single file.
    #[arg(short = 'f', long = "file")]
    pub file: bool,

    /// The fully qualified name of the type to decompile.
    #[arg(short = 't', long = "type", value_name = "TYPE-NAME")]
    pub type_name: Option<String>,

    /// Show IL code.
    #[arg(long = "ilcode")]
    pub il: bool,

    /// Show IL with sequence points. Implies --ilcode.
    #[arg(long = "il-sequence-points")]
    pub il_sequence_points: bool,

    /// Generate PDB.
    #[arg(long = "genpdb")]
    pub genpdb: bool,

    /// Use PDB. Without a value the symbols are searched next to the assembly.
    #[arg(long = "usepdb", value_name = "PDB", require_equals = true, value_parser = existing_file)]
    pub usepdb: Option<Option<PathBuf>>,

    /// Lists all entities of the specified type(s). Valid types: c(lass), i(nterface), s(truct), d(elegate), e(num).
    #[arg(short = 'l', long = "list", value_name = "ENTITY-TYPE(S)", value_parser = parse_kinds)]
    pub list: Vec<KindSelection>,

    /// Show version of the decompiler engine used.
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    /// C# language version: CSharp1 .. CSharp12_0, Preview or Latest.
    #[arg(long = "languageversion", value_name = "VERSION", default_value = "Latest")]
    pub language_version: LanguageVersion,

    /// Path to a directory containing dependencies of the assembly that is being decompiled.
    #[arg(short = 'r', long = "referencepath", value_name = "PATH", value_parser = existing_directory)]
    pub reference_paths: Vec<PathBuf>,

    /// Remove dead code.
    #[arg(long = "no-dead-code")]
    pub no_dead_code: bool,

    /// Remove dead stores.
    #[arg(long = "no-dead-stores")]
    pub no_dead_stores: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(long)]
    pub verbose: bool,
}

/// Where symbols for the input come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdbInput {
    /// No symbols
    Absent,
    /// Search next to the module and at its CodeView path
    AutoDiscover,
    /// A given symbol file
    Explicit(PathBuf),
}

impl Invocation {
    /// The symbol source requested with `--usepdb`.
    #[must_use]
    pub fn pdb_input(&self) -> PdbInput {
        match &self.usepdb {
            None => PdbInput::Absent,
            Some(None) => PdbInput::AutoDiscover,
            Some(Some(path)) => PdbInput::Explicit(path.clone()),
        }
    }

    /// All selected entity kinds, over every `--list` occurrence.
    #[must_use]
    pub fn entity_kinds(&self) -> Vec<TypeKind> {
        let mut kinds = Vec::new();
        for kind in self.list.iter().flat_map(|selection| selection.0.iter()) {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }
}

/// The kinds named by one `--list` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSelection(pub Vec<TypeKind>);

/// Parse a `,` or `;` separated list of entity kinds.
///
/// # Errors
/// Returns a message naming the first unknown kind, or complaining about an empty list.
pub fn parse_kinds(value: &str) -> Result<KindSelection, String> {
    let mut kinds = Vec::new();
    for part in value.split([',', ';']).map(str::trim).filter(|part| !part.is_empty()) {
        let kind = match part.to_ascii_lowercase().as_str() {
            "c" | "class" => TypeKind::Class,
            "i" | "interface" => TypeKind::Interface,
            "s" | "struct" => TypeKind::Struct,
            "d" | "delegate" => TypeKind::Delegate,
            "e" | "enum" => TypeKind::Enum,
            _ => {
                return Err(format!(
                    "unknown entity type '{part}', valid types: c(lass), i(nterface), s(truct), d(elegate), e(num)"
                ))
            }
        };
        kinds.push(kind);
    }

    if kinds.is_empty() {
        Err("no entity type given".to_string())
    } else {
        Ok(KindSelection(kinds))
    }
}

fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    // FIFOs and `/dev/stdin` count; the loader reads them into memory.
    if path.exists() && !path.is_dir() {
        Ok(path)
    } else {
        Err(format!("The file '{value}' does not exist."))
    }
}

fn existing_directory(value: &str) -> Result<PathBuf, String> {
    let path = Path::new(value);
    if path.is_dir() {
        Ok(path.to_path_buf())
    } else {
        Err(format!("The directory '{value}' does not exist."))
    }
}

/// Rewrite the single-dash long options of the classic command line to their
/// double-dash forms. Arguments after `--` are left alone.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let mut escaped = false;
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if escaped {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                escaped = true;
                return arg;
            }

            let rewritten = match text {
                "-crc" => "--crc",
                "-crclog" => "--crclog",
                "-il" => "--ilcode",
                "-genpdb" => "--genpdb",
                "-usepdb" => "--usepdb",
                "-lv" => "--languageversion",
                _ => {
                    return match text.strip_prefix("-usepdb:") {
                        Some(path) => OsString::from(format!("--usepdb={path}")),
                        None => arg,
                    };
                }
            };
            OsString::from(rewritten)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation, clap::Error> {
        Invocation::try_parse_from(normalize_args(args.iter().copied()))
    }

    #[test]
    fn legacy_spellings() {
        let args = normalize_args(["ildecomp", "-crc", "-il", "-usepdb:a b.pdb", "-lv", "x", "--", "-il"]);
        assert_eq!(
            args,
            ["ildecomp", "--crc", "--ilcode", "--usepdb=a b.pdb", "--languageversion", "x", "--", "-il"]
                .map(OsString::from)
        );
    }

    #[test]
    fn kinds() {
        assert_eq!(
            parse_kinds("c;E, Interface").unwrap(),
            KindSelection(vec![TypeKind::Class, TypeKind::Enum, TypeKind::Interface])
        );
        assert!(parse_kinds("x").is_err());
        assert!(parse_kinds(",;").is_err());
    }

    #[test]
    fn binding() {
        let input = tempfile::NamedTempFile::new().unwrap();
        let input = input.path().to_str().unwrap();

        let invocation = parse(&[
            "ildecomp", input, "-l", "c", "-l", "e,c", "-usepdb", "-lv", "csharp7_3", "-crclog",
        ])
        .unwrap();
        assert_eq!(invocation.entity_kinds(), [TypeKind::Class, TypeKind::Enum]);
        assert_eq!(invocation.pdb_input(), PdbInput::AutoDiscover);
        assert_eq!(invocation.language_version, LanguageVersion::CSharp7_3);
        assert_eq!(invocation.checksum_algorithm, ChecksumAlgorithm::Sha256);
        assert!(invocation.checksum_log);

        let explicit = format!("-usepdb:{input}");
        let invocation = parse(&["ildecomp", input, &explicit]).unwrap();
        assert_eq!(invocation.pdb_input(), PdbInput::Explicit(PathBuf::from(input)));

        let invocation = parse(&["ildecomp"]).unwrap();
        assert!(invocation.input.is_none());
        assert_eq!(invocation.pdb_input(), PdbInput::Absent);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse(&["ildecomp", "/does/not/exist.dll"]).is_err());
        let directory = tempfile::tempdir().unwrap();
        assert!(parse(&["ildecomp", directory.path().to_str().unwrap()]).is_err());

        let input = tempfile::NamedTempFile::new().unwrap();
        let input = input.path().to_str().unwrap();
        assert!(parse(&["ildecomp", input, "-o", "/does/not/exist"]).is_err());
        assert!(parse(&["ildecomp", input, "-l", "q"]).is_err());
        assert!(parse(&["ildecomp", input, "-lv", "CSharp42"]).is_err());
        assert!(parse(&["ildecomp", input, "-usepdb:/does/not/exist.pdb"]).is_err());
    }
}
