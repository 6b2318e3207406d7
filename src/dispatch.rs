//! Mode selection and dispatch.
//!
//! The flags of an [`Invocation`] may name several modes at once; [`RULES`] resolves them
//! to exactly one [`ModeSelection`]. The rules are tried in order and the first match
//! wins. [`run`] then builds the settings and the output route and hands over to the
//! matching handler in [`crate::commands`].

use std::io::Write;

use clap::CommandFactory;
use log::debug;

use crate::{
    app::Invocation,
    commands::{self, CommandContext},
    engine::Engine,
    exit::{self, ExitCode, Report},
    output, settings,
};

/// The operating mode of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSelection {
    /// Project decompilation, checksum or both
    Project,
    /// Entity listing
    EntityList,
    /// IL disassembly
    Il,
    /// PDB generation
    PdbGen,
    /// Version report
    Version,
    /// Decompilation of the module or one type into a single text
    SingleDecompile,
}

/// The mode-relevant projection of an [`Invocation`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    /// `--project`
    pub project: bool,
    /// `--crc`
    pub checksum: bool,
    /// `--file`
    pub file: bool,
    /// `--ilcode`
    pub il: bool,
    /// `--il-sequence-points`
    pub il_sequence_points: bool,
    /// `--genpdb`
    pub genpdb: bool,
    /// `--version`
    pub version: bool,
    /// At least one `--list` value
    pub list: bool,
}

impl ModeFlags {
    /// Project the flags of `invocation`.
    #[must_use]
    pub fn from_invocation(invocation: &Invocation) -> Self {
        ModeFlags {
            project: invocation.project,
            checksum: invocation.checksum,
            file: invocation.file,
            il: invocation.il,
            il_sequence_points: invocation.il_sequence_points,
            genpdb: invocation.genpdb,
            version: invocation.version,
            list: !invocation.list.is_empty(),
        }
    }

    /// Whether any mode-selecting flag is set. The type filter does not select a mode.
    #[must_use]
    pub fn any(&self) -> bool {
        self.project
            || self.checksum
            || self.file
            || self.il
            || self.il_sequence_points
            || self.genpdb
            || self.version
            || self.list
    }

    /// Whether the project is written out with progress output: asked for explicitly, or
    /// chosen because nothing else was.
    #[must_use]
    pub fn whole_project(&self) -> bool {
        self.project || !self.any()
    }
}

/// One precedence rule.
pub struct Rule {
    /// Name used in logs
    pub name: &'static str,
    /// Whether the rule applies
    pub matches: fn(&ModeFlags) -> bool,
    /// The mode it selects
    pub mode: ModeSelection,
}

/// The precedence rules, in order.
pub static RULES: [Rule; 7] = [
    Rule {
        name: "default",
        matches: |flags| !flags.any(),
        mode: ModeSelection::Project,
    },
    Rule {
        name: "project",
        matches: |flags| flags.project || flags.checksum,
        mode: ModeSelection::Project,
    },
    Rule {
        name: "list",
        matches: |flags| flags.list,
        mode: ModeSelection::EntityList,
    },
    Rule {
        name: "il",
        matches: |flags| flags.il || flags.il_sequence_points,
        mode: ModeSelection::Il,
    },
    Rule {
        name: "genpdb",
        matches: |flags| flags.genpdb,
        mode: ModeSelection::PdbGen,
    },
    Rule {
        name: "version",
        matches: |flags| flags.version,
        mode: ModeSelection::Version,
    },
    Rule {
        name: "decompile",
        matches: |_| true,
        mode: ModeSelection::SingleDecompile,
    },
];

/// The first rule matching `flags`.
#[must_use]
pub fn select(flags: &ModeFlags) -> &'static Rule {
    RULES
        .iter()
        .find(|rule| (rule.matches)(flags))
        .unwrap_or(&RULES[RULES.len() - 1])
}

/// Run one invocation against `engine`, writing results to `console`.
///
/// Without an input the help text goes to `console` and the usage code is returned.
pub fn run(invocation: &Invocation, engine: &Engine, console: &mut dyn Write) -> Report {
    let Some(input) = invocation.input.as_deref() else {
        let help = Invocation::command().render_help();
        return match writeln!(console, "{help}") {
            Ok(()) => Report::new(ExitCode::USAGE),
            Err(error) => Report {
                code: ExitCode::USAGE,
                error: Some(format!("failed to write the usage text: {error}")),
            },
        };
    };

    let flags = ModeFlags::from_invocation(invocation);
    let rule = select(&flags);
    let whole_project = flags.whole_project();
    debug!("Mode {:?} selected by rule '{}'", rule.mode, rule.name);

    let settings = settings::build(invocation, input, whole_project);
    let context = CommandContext {
        invocation,
        input,
        settings: &settings,
        route: output::resolve(
            input,
            invocation.output_dir.as_deref(),
            rule.mode,
            invocation.type_name.as_deref(),
        ),
        engine,
    };

    let result = match rule.mode {
        ModeSelection::Project => commands::project::run(&context, whole_project, console),
        ModeSelection::EntityList => commands::list::run(&context, console),
        ModeSelection::Il => commands::il::run(&context, console),
        ModeSelection::PdbGen => commands::pdbgen::run(&context, console),
        ModeSelection::Version => commands::version::run(&context, console),
        ModeSelection::SingleDecompile => commands::decompile::run(&context, console),
    };
    exit::map(result)
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::{Path, PathBuf},
    };

    use clap::Parser;

    use super::*;
    use crate::{
        engine::{csharp::DecompiledSource, DecompileContext, Decompiler},
        metadata::typesystem::FullTypeName,
        test::AssemblyBuilder,
    };

    fn flags(set: impl Fn(&mut ModeFlags)) -> ModeFlags {
        let mut flags = ModeFlags::default();
        set(&mut flags);
        flags
    }

    fn sample(directory: &Path, codeview: bool) -> PathBuf {
        let mut builder = AssemblyBuilder::new("Sample");
        if codeview {
            builder = builder.with_codeview();
        }
        let image = builder
            .class("Sample", "Program")
            .method("Main", true)
            .entry_point()
            .enumeration("Sample", "Color", &["Red", "Green"])
            .interface("Sample.Api", "IService")
            .generic_class("Sample", "Box", &["T"])
            .build();
        let path = directory.join("Sample.dll");
        fs::write(&path, image).unwrap();
        path
    }

    fn execute(engine: &Engine, args: &[&str]) -> (Report, String) {
        let invocation = Invocation::try_parse_from(std::iter::once("ildecomp").chain(args.iter().copied())).unwrap();
        let mut console = Vec::new();
        let report = run(&invocation, engine, &mut console);
        (report, String::from_utf8(console).unwrap())
    }

    #[test]
    fn precedence() {
        assert_eq!(select(&ModeFlags::default()).mode, ModeSelection::Project);
        assert!(ModeFlags::default().whole_project());

        let both = flags(|f| {
            f.project = true;
            f.checksum = true;
            f.il = true;
        });
        assert_eq!(select(&both).mode, ModeSelection::Project);
        assert!(both.whole_project());

        let checksum = flags(|f| f.checksum = true);
        assert_eq!(select(&checksum).mode, ModeSelection::Project);
        assert!(!checksum.whole_project());

        let list = flags(|f| {
            f.list = true;
            f.il = true;
            f.genpdb = true;
        });
        assert_eq!(select(&list).mode, ModeSelection::EntityList);
        assert_eq!(select(&flags(|f| f.il_sequence_points = true)).mode, ModeSelection::Il);
        assert_eq!(
            select(&flags(|f| {
                f.genpdb = true;
                f.version = true;
            }))
            .mode,
            ModeSelection::PdbGen
        );
        assert_eq!(select(&flags(|f| f.version = true)).mode, ModeSelection::Version);
        assert_eq!(select(&flags(|f| f.file = true)).mode, ModeSelection::SingleDecompile);
    }

    #[test]
    fn type_filter_alone_is_project() {
        let invocation = Invocation::try_parse_from(["ildecomp", "-t", "Sample.Program"]).unwrap();
        let flags = ModeFlags::from_invocation(&invocation);
        assert_eq!(select(&flags).mode, ModeSelection::Project);
    }

    #[test]
    fn missing_input_prints_help() {
        let (report, console) = execute(&Engine::native(), &[]);
        assert_eq!(report, Report::new(ExitCode::USAGE));
        assert!(console.contains("Usage:"));
    }

    struct ClosedConsole;

    impl Write for ClosedConsole {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn help_write_failure_is_reported() {
        let invocation = Invocation::try_parse_from(["ildecomp"]).unwrap();
        let report = run(&invocation, &Engine::native(), &mut ClosedConsole);
        assert_eq!(report.code, ExitCode::USAGE);
        assert!(report.error.unwrap().starts_with("failed to write the usage text: "));
    }

    #[test]
    fn entity_list() {
        let directory = tempfile::tempdir().unwrap();
        let input = sample(directory.path(), false);
        let input = input.to_str().unwrap();

        let (report, console) = execute(&Engine::native(), &[input, "-l", "c,e"]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        assert_eq!(console, "Class <Module>\nClass Sample.Program\nEnum Sample.Color\nClass Sample.Box\n");

        let output = directory.path().join("out");
        fs::create_dir(&output).unwrap();
        let (report, console) =
            execute(&Engine::native(), &[input, "-l", "i", "-o", output.to_str().unwrap()]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        assert!(console.is_empty());
        assert_eq!(
            fs::read_to_string(output.join("Sample.list.txt")).unwrap(),
            "Interface Sample.Api.IService\n"
        );
    }

    #[test]
    fn project_then_checksum() {
        let directory = tempfile::tempdir().unwrap();
        let input = sample(directory.path(), false);
        let input = input.to_str().unwrap();

        let (report, console) = execute(&Engine::native(), &[input, "-p", "--crc"]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        let lines: Vec<&str> = console.lines().collect();
        assert_eq!(lines[0], "Decompiling Sample.dll... ok.");
        assert!(lines[1].starts_with("Used time: "));
        assert!(lines[1].ends_with(" sec"));
        assert_eq!(lines[2], "'Sample.dll' checksum:");
        assert_eq!(lines[3].len(), 4 + 2 + 64);
        assert!(directory.path().join("Sample").join("Sample.csproj").is_file());

        let (report, checksum_only) = execute(&Engine::native(), &[input, "--crc"]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        assert_eq!(checksum_only, format!("{}\n{}\n", lines[2], lines[3]));
    }

    #[test]
    fn checksum_log() {
        let directory = tempfile::tempdir().unwrap();
        let input = sample(directory.path(), false);
        let input = input.to_str().unwrap();

        let (report, _) = execute(&Engine::native(), &[input, "--crc", "--crclog"]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        let log = fs::read_to_string(format!("{input}.crclog")).unwrap();
        assert!(log.starts_with("algorithm: sha256\n"));
        assert!(log.contains("Sample.csproj: "));
        assert!(!directory.path().join("Sample").exists());
    }

    #[test]
    fn pdb_generation() {
        let directory = tempfile::tempdir().unwrap();
        let input = sample(directory.path(), false);
        let (report, console) = execute(&Engine::native(), &[input.to_str().unwrap(), "--genpdb"]);
        assert_eq!(report.code, ExitCode::DATA_ERROR);
        assert_eq!(
            report.error.unwrap(),
            format!(
                "Cannot create PDB file for {}, because it does not contain a PE Debug Directory Entry of type 'CodeView'.",
                input.display()
            )
        );
        assert!(console.is_empty());
        assert!(!directory.path().join("Sample.pdb").exists());

        let input = sample(directory.path(), true);
        let (report, _) = execute(&Engine::native(), &[input.to_str().unwrap(), "--genpdb"]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        assert!(fs::metadata(directory.path().join("Sample.pdb")).unwrap().len() > 0);
    }

    #[test]
    fn pdb_generation_needs_rsds() {
        let directory = tempfile::tempdir().unwrap();
        let input = directory.path().join("Sample.dll");
        let image = AssemblyBuilder::new("Sample")
            .with_nb10_codeview()
            .class("Sample", "Program")
            .method("Main", true)
            .build();
        fs::write(&input, image).unwrap();

        let (report, console) = execute(&Engine::native(), &[input.to_str().unwrap(), "--genpdb"]);
        assert_eq!(report.code, ExitCode::DATA_ERROR);
        assert!(report.error.unwrap().ends_with("because its CodeView debug entry is not an RSDS record."));
        assert!(console.is_empty());
        assert!(!directory.path().join("Sample.pdb").exists());
    }

    #[test]
    fn il_with_generated_symbols() {
        let directory = tempfile::tempdir().unwrap();
        let input = sample(directory.path(), true);
        let input = input.to_str().unwrap();
        let pdb = directory.path().join("Sample.pdb");

        let (report, _) = execute(&Engine::native(), &[input, "--genpdb"]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        assert!(pdb.is_file());

        let explicit = format!("--usepdb={}", pdb.display());
        for usepdb in [explicit.as_str(), "--usepdb"] {
            let (report, console) = execute(&Engine::native(), &[input, "--il-sequence-points", usepdb]);
            assert_eq!(report.code, ExitCode::SUCCESS, "{usepdb}");
            assert!(console.contains("// Symbols: "), "{usepdb}");
            let point = console
                .lines()
                .find(|line| line.trim_start().starts_with("// sequence point: (line "))
                .unwrap();
            assert!(point.ends_with(" in Sample/Program.cs"), "{point}");
        }

        let (report, console) = execute(&Engine::native(), &[input, "--ilcode", "--usepdb"]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        assert!(!console.contains("// Symbols:"));
        assert!(!console.contains("// sequence point:"));
    }

    #[test]
    fn checksum_ignores_the_input_location() {
        let root = tempfile::tempdir().unwrap();
        let mut outputs = Vec::new();
        for name in ["a", "b/nested"] {
            let directory = root.path().join(name);
            fs::create_dir_all(&directory).unwrap();
            let image = AssemblyBuilder::new("Sample")
                .reference("Dep")
                .class("Sample", "Program")
                .method("Main", true)
                .build();
            fs::write(directory.join("Sample.dll"), image).unwrap();
            fs::write(directory.join("Dep.dll"), AssemblyBuilder::new("Dep").build()).unwrap();

            let input = directory.join("Sample.dll");
            let (report, console) = execute(&Engine::native(), &[input.to_str().unwrap(), "--crc"]);
            assert_eq!(report.code, ExitCode::SUCCESS);
            outputs.push(console);
        }
        assert_eq!(outputs[0], outputs[1]);

        let input = root.path().join("a").join("Sample.dll");
        let (report, _) = execute(&Engine::native(), &[input.to_str().unwrap(), "-p"]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        let csproj = fs::read_to_string(root.path().join("a").join("Sample").join("Sample.csproj")).unwrap();
        assert!(csproj.contains(&format!("<HintPath>{}</HintPath>", Path::new("..").join("Dep.dll").display())));
    }

    #[test]
    fn il_and_version() {
        let directory = tempfile::tempdir().unwrap();
        let input = sample(directory.path(), false);
        let input = input.to_str().unwrap();

        let (report, console) = execute(&Engine::native(), &[input, "--ilcode"]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        assert!(console.starts_with("// IL code: Sample.dll\n"));
        assert!(console.contains(".class public auto ansi beforefieldinit Sample.Program"));

        let (report, console) = execute(&Engine::native(), &[input, "-v", "-f"]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        assert_eq!(
            console,
            format!("ildecomp: {0}\nildecomp engine: {0}\n", env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn single_decompile() {
        let directory = tempfile::tempdir().unwrap();
        let input = sample(directory.path(), false);
        let input = input.to_str().unwrap();

        let (report, console) = execute(&Engine::native(), &[input, "-f", "-t", "Sample.Color"]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        assert!(console.contains("public enum Color"));
        assert!(!console.contains("class Program"));

        let (report, console) = execute(&Engine::native(), &[input, "-f", "-t", "Sample.Missing"]);
        assert_eq!(report.code, ExitCode::SOFTWARE);
        assert!(console.is_empty());
        let error = report.error.unwrap();
        assert!(error.contains("failed to decompile type Sample.Missing"));
        assert!(error.contains("Type 'Sample.Missing' was not found"));
    }

    #[test]
    fn malformed_input() {
        let directory = tempfile::tempdir().unwrap();
        let input = directory.path().join("Broken.dll");
        fs::write(&input, b"MZ not really").unwrap();

        let (report, _) = execute(&Engine::native(), &[input.to_str().unwrap(), "-l", "c"]);
        assert_eq!(report.code, ExitCode::SOFTWARE);
        assert!(report.error.unwrap().starts_with("failed to load assembly: "));
    }

    struct FixedDecompiler;

    impl Decompiler for FixedDecompiler {
        fn decompile_module(&self, _: &DecompileContext) -> crate::Result<DecompiledSource> {
            Ok(DecompiledSource {
                text: "// module\n".to_string(),
                ..DecompiledSource::default()
            })
        }

        fn decompile_type(&self, _: &DecompileContext, name: &FullTypeName) -> crate::Result<DecompiledSource> {
            Ok(DecompiledSource {
                text: format!("// {name}\n"),
                ..DecompiledSource::default()
            })
        }
    }

    #[test]
    fn handlers_use_the_engine_decompiler() {
        let directory = tempfile::tempdir().unwrap();
        let input = sample(directory.path(), false);
        let input = input.to_str().unwrap();
        let engine = Engine {
            decompiler: Box::new(FixedDecompiler),
            ..Engine::native()
        };

        let (_, console) = execute(&engine, &[input, "-f"]);
        assert_eq!(console, "// module\n");

        let output = directory.path().join("out");
        fs::create_dir(&output).unwrap();
        let (report, console) = execute(&engine, &[input, "-t", "Ns.Type", "-f", "-o", output.to_str().unwrap()]);
        assert_eq!(report.code, ExitCode::SUCCESS);
        assert!(console.is_empty());
        assert_eq!(
            fs::read_to_string(output.join("Ns.Type.decompiled.cs")).unwrap(),
            "// Ns.Type\n"
        );
    }
}
