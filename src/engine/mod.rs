//! The analysis engine behind the operating modes.
//!
//! The command layer never works with the metadata reader or the renderers directly. It
//! talks to the collaborator traits of this module, bundled into an [`Engine`]; the native
//! implementations live in the submodules and are wired by [`Engine::native`]. Tests swap
//! single collaborators to observe what the dispatcher hands them.
//!
//! # Key Components
//! - [`ModuleLoader`], [`AssemblyResolver`], [`SymbolProvider`] - Loading inputs
//! - [`Decompiler`], [`Disassembler`], [`ProjectDecompiler`], [`PdbWriter`] - Producing output
//! - [`DecompilerSettings`] - Immutable per-invocation settings
//! - [`checksum::ChecksumCalculator`] - The project checksum accumulator
//! - [`CancellationToken`] - Cooperative cancellation of long renderings

pub mod checksum;
pub mod csharp;
pub mod il;
pub mod pdb;
pub mod project;
pub mod resolver;
pub mod symbols;

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use strum::{Display, EnumIter, EnumString};

use crate::{
    engine::{checksum::ChecksumCalculator, csharp::DecompiledSource, symbols::DebugInfo},
    metadata::{identity::AssemblyIdentity, typesystem::FullTypeName},
    module::{Module, PeModuleLoader},
    Error, Result,
};

/// Version of the native engine.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// C# language version selected with `--languageversion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, EnumString, Display, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum LanguageVersion {
    /// C# 1.0
    CSharp1,
    /// C# 2.0, generics and static classes
    CSharp2,
    /// C# 3.0
    CSharp3,
    /// C# 4.0
    CSharp4,
    /// C# 5.0
    CSharp5,
    /// C# 6.0
    CSharp6,
    /// C# 7.0
    #[strum(to_string = "CSharp7", serialize = "CSharp7_0")]
    CSharp7,
    /// C# 7.1
    CSharp7_1,
    /// C# 7.2, `readonly struct`
    CSharp7_2,
    /// C# 7.3
    CSharp7_3,
    /// C# 8.0
    CSharp8_0,
    /// C# 9.0, native sized integers and function pointers
    CSharp9_0,
    /// C# 10.0
    CSharp10_0,
    /// C# 11.0
    CSharp11_0,
    /// C# 12.0
    CSharp12_0,
    /// Preview features
    Preview,
    /// The newest supported version
    #[default]
    Latest,
}

/// Hash algorithm of the project checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ChecksumAlgorithm {
    /// SHA-256, the default
    #[default]
    Sha256,
    /// SHA-1
    Sha1,
    /// MD5
    Md5,
}

/// Whether and how a project checksum is calculated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChecksumMode {
    /// No checksum
    #[default]
    Disabled,
    /// Checksum printed after the project run
    Enabled {
        /// The hash algorithm
        algorithm: ChecksumAlgorithm,
    },
    /// Checksum plus a per-entity log file
    EnabledWithLog {
        /// The hash algorithm
        algorithm: ChecksumAlgorithm,
        /// Where the log is written
        log_path: PathBuf,
    },
}

impl ChecksumMode {
    /// Whether a checksum is calculated at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ChecksumMode::Disabled)
    }
}

/// Settings shared by all operating modes; built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecompilerSettings {
    /// Target C# language version
    pub language_version: LanguageVersion,
    /// Drop unreachable code
    pub remove_dead_code: bool,
    /// Drop stores to locals that are never read
    pub remove_dead_stores: bool,
    /// Fail on unresolvable references instead of warning
    pub throw_on_assembly_resolve_errors: bool,
    /// Project checksum state
    pub checksum: ChecksumMode,
    /// Whether the project decompiler writes source files
    pub produce_source_code: bool,
}

/// Cooperative cancellation flag checked by long running renderers.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fail with [`Error::Cancelled`] once cancellation was requested.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] if the token was cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Everything a decompilation needs besides the output.
#[derive(Clone, Copy)]
pub struct DecompileContext<'a> {
    /// The loaded module
    pub module: &'a Module,
    /// Settings of this invocation
    pub settings: &'a DecompilerSettings,
    /// Resolver for referenced assemblies
    pub resolver: &'a dyn AssemblyResolver,
    /// Attached symbols, if any
    pub debug_info: Option<&'a DebugInfo>,
}

/// Options of an IL rendering.
#[derive(Clone, Copy, Default)]
pub struct DisassemblerOptions<'a> {
    /// Attached symbols, if any
    pub debug_info: Option<&'a DebugInfo>,
    /// Emit sequence point comments from the attached symbols
    pub show_sequence_points: bool,
}

/// Loads a module from disk.
pub trait ModuleLoader {
    /// Load the module at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a .NET module.
    fn load(&self, path: &Path) -> Result<Module>;
}

/// Finds referenced assemblies on disk.
pub trait AssemblyResolver {
    /// The file implementing `reference`, if one can be found.
    fn resolve(&self, reference: &AssemblyIdentity) -> Option<PathBuf>;

    /// Directories searched, in order.
    fn search_directories(&self) -> &[PathBuf];
}

/// Builds the resolver for a loaded module from the user's search paths.
pub type ResolverFactory = fn(&Module, &[PathBuf]) -> Box<dyn AssemblyResolver>;

/// Locates and validates debug symbols.
pub trait SymbolProvider {
    /// Discover symbols for `module` next to it or at its CodeView path; `None` if there
    /// are none.
    ///
    /// # Errors
    /// Returns an error if a discovered file cannot be used.
    fn load_symbols(&self, module: &Module) -> Result<Option<DebugInfo>>;

    /// Load the symbol file at `path` for `module`.
    ///
    /// # Errors
    /// Returns an error if the file is unreadable, of an unknown format or belongs to a
    /// different build of the module.
    fn from_file(&self, module: &Module, path: &Path) -> Result<DebugInfo>;
}

/// Renders C# source.
pub trait Decompiler {
    /// The whole module as one source text.
    ///
    /// # Errors
    /// Returns an error if a declaration cannot be rendered.
    fn decompile_module(&self, context: &DecompileContext) -> Result<DecompiledSource>;

    /// A single type, looked up by name.
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if the module declares no such type.
    fn decompile_type(&self, context: &DecompileContext, name: &FullTypeName) -> Result<DecompiledSource>;
}

/// Renders ILAsm text.
pub trait Disassembler {
    /// Write the module header, all types and all method bodies to `out`.
    ///
    /// # Errors
    /// Returns an error on I/O failure, malformed method bodies or cancellation.
    fn write_module_contents(
        &self,
        out: &mut dyn Write,
        module: &Module,
        options: &DisassemblerOptions,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Writes a buildable project.
pub trait ProjectDecompiler {
    /// Decompile into `directory`, feeding every generated file into `checksum`.
    ///
    /// Sources are only written when the settings ask for source code; otherwise the
    /// run only feeds the checksum.
    ///
    /// # Errors
    /// Returns an error if rendering or writing fails.
    fn decompile_project(
        &self,
        context: &DecompileContext,
        directory: &Path,
        checksum: Option<&mut ChecksumCalculator>,
    ) -> Result<()>;
}

/// Writes portable PDBs for decompiled sources.
pub trait PdbWriter {
    /// Decompile the module with `decompiler` and write the matching PDB to `out`.
    ///
    /// # Errors
    /// Returns an error if the module has no CodeView entry, rendering fails or writing fails.
    fn write_pdb(
        &self,
        context: &DecompileContext,
        decompiler: &dyn Decompiler,
        out: &mut dyn Write,
    ) -> Result<()>;
}

/// One implementation of every collaborator.
pub struct Engine {
    /// Module loading
    pub loader: Box<dyn ModuleLoader>,
    /// Resolver construction
    pub resolver: ResolverFactory,
    /// Symbol loading
    pub symbols: Box<dyn SymbolProvider>,
    /// C# rendering
    pub decompiler: Box<dyn Decompiler>,
    /// IL rendering
    pub disassembler: Box<dyn Disassembler>,
    /// Project writing
    pub project: Box<dyn ProjectDecompiler>,
    /// PDB writing
    pub pdb: Box<dyn PdbWriter>,
    /// Reported engine version
    pub version: &'static str,
}

impl Engine {
    /// The native engine.
    #[must_use]
    pub fn native() -> Self {
        Engine {
            loader: Box::new(PeModuleLoader),
            resolver: resolver::SearchPathResolver::factory,
            symbols: Box::new(symbols::NativeSymbolProvider),
            decompiler: Box::new(csharp::CSharpDecompiler),
            disassembler: Box::new(il::ReflectionDisassembler),
            project: Box::new(project::WholeProjectDecompiler),
            pdb: Box::new(pdb::PortablePdbWriter),
            version: ENGINE_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn language_versions() {
        assert_eq!(LanguageVersion::from_str("csharp7_3").unwrap(), LanguageVersion::CSharp7_3);
        assert_eq!(LanguageVersion::from_str("LATEST").unwrap(), LanguageVersion::Latest);
        assert_eq!(LanguageVersion::from_str("CSharp7_0").unwrap(), LanguageVersion::CSharp7);
        assert!(LanguageVersion::from_str("CSharp13").is_err());
        assert!(LanguageVersion::CSharp2 < LanguageVersion::CSharp9_0);
        assert_eq!(LanguageVersion::CSharp12_0.to_string(), "CSharp12_0");
    }

    #[test]
    fn checksum_algorithms() {
        assert_eq!(ChecksumAlgorithm::from_str("SHA1").unwrap(), ChecksumAlgorithm::Sha1);
        assert_eq!(ChecksumAlgorithm::Md5.to_string(), "md5");
        assert!(!ChecksumMode::Disabled.is_enabled());
        assert!(ChecksumMode::Enabled { algorithm: ChecksumAlgorithm::Sha256 }.is_enabled());
    }

    #[test]
    fn cancellation() {
        let token = CancellationToken::new();
        let shared = token.clone();
        assert!(token.check().is_ok());

        shared.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }
}
