//! Whole-project output.
//!
//! [`WholeProjectDecompiler`] turns a module into an SDK-style C# project: a `.csproj`
//! named after the assembly, `Properties/AssemblyInfo.cs` with the assembly-level
//! attributes, and one source file per top-level type. Types are grouped into one
//! directory per namespace; types of the global namespace sit next to the project file.
//!
//! Every generated file is fed into the project checksum in the order above, keyed by its
//! path relative to the project directory. With source output disabled (a pure checksum
//! run) nothing is written to disk.

use std::{
    collections::HashSet,
    fs,
    path::{Component, Path, PathBuf},
};

use log::{debug, info, warn};
use quick_xml::{
    events::{BytesEnd, BytesStart, BytesText, Event},
    Writer,
};

use crate::{
    engine::{
        checksum::ChecksumCalculator,
        csharp::{is_rendered, CSharpDecompiler},
        DecompileContext, LanguageVersion, ProjectDecompiler,
    },
    metadata::{identity::AssemblyIdentity, typesystem::TypeDefinition},
    module::Module,
    Error, Result,
};

const INVALID_FILE_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// One file of the generated project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
    /// Path relative to the project directory, `/` separated
    pub path: String,
    /// File content
    pub content: Vec<u8>,
}

/// Replace characters that are not valid in file names.
#[must_use]
pub fn clean_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if INVALID_FILE_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// The `<LangVersion>` value of a language version.
#[must_use]
pub fn lang_version(version: LanguageVersion) -> &'static str {
    match version {
        LanguageVersion::CSharp1 => "1",
        LanguageVersion::CSharp2 => "2",
        LanguageVersion::CSharp3 => "3",
        LanguageVersion::CSharp4 => "4",
        LanguageVersion::CSharp5 => "5",
        LanguageVersion::CSharp6 => "6",
        LanguageVersion::CSharp7 => "7",
        LanguageVersion::CSharp7_1 => "7.1",
        LanguageVersion::CSharp7_2 => "7.2",
        LanguageVersion::CSharp7_3 => "7.3",
        LanguageVersion::CSharp8_0 => "8.0",
        LanguageVersion::CSharp9_0 => "9.0",
        LanguageVersion::CSharp10_0 => "10.0",
        LanguageVersion::CSharp11_0 => "11.0",
        LanguageVersion::CSharp12_0 => "12.0",
        LanguageVersion::Preview => "preview",
        LanguageVersion::Latest => "latest",
    }
}

/// References the SDK adds on its own.
fn is_framework_reference(reference: &AssemblyIdentity) -> bool {
    let name = reference.name.as_str();
    matches!(name, "mscorlib" | "netstandard" | "System")
        || name.starts_with("System.")
        || name.starts_with("Microsoft.")
}

/// Relative source paths of the rendered top-level types, in declaration order.
///
/// Names are compared case-insensitively; a clash gets a numeric suffix so no file is
/// overwritten on case-insensitive file systems.
#[must_use]
pub fn source_paths(module: &Module) -> Vec<(String, &TypeDefinition)> {
    let mut used = HashSet::new();
    let mut paths = Vec::new();

    for definition in module.top_level_types().filter(|definition| is_rendered(definition)) {
        let directory = if definition.namespace.is_empty() {
            String::new()
        } else {
            format!("{}/", clean_file_name(&definition.namespace))
        };
        let stem = clean_file_name(definition.display_name());

        let mut path = format!("{directory}{stem}.cs");
        let mut counter = 2;
        while !used.insert(path.to_lowercase()) {
            path = format!("{directory}{stem}{counter}.cs");
            counter += 1;
        }
        paths.push((path, definition));
    }
    paths
}

fn element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(text))
        .map_err(quick_xml::Error::from)?;
    Ok(())
}

fn start<W: std::io::Write>(writer: &mut Writer<W>, tag: BytesStart) -> Result<()> {
    writer.write_event(Event::Start(tag)).map_err(quick_xml::Error::from)?;
    Ok(())
}

fn end<W: std::io::Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(quick_xml::Error::from)?;
    Ok(())
}

/// `target` relative to `base`, through the common ancestor of both.
///
/// Paths without a common root (other drives) stay as they are.
fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let (Ok(base), Ok(absolute_target)) = (std::path::absolute(base), std::path::absolute(target)) else {
        return target.to_path_buf();
    };
    let base: Vec<Component> = base.components().collect();
    let target_parts: Vec<Component> = absolute_target.components().collect();

    let common = base
        .iter()
        .zip(&target_parts)
        .take_while(|(left, right)| left == right)
        .count();
    if common == 0 {
        return target_parts.iter().collect();
    }

    let mut relative: PathBuf = base[common..].iter().map(|_| Component::ParentDir).collect();
    relative.extend(&target_parts[common..]);
    relative
}

/// Render the `.csproj` of the module written to `directory`.
///
/// Reference hint paths are relative to `directory`, so the content only depends on
/// where the references sit next to the project.
///
/// # Errors
/// Returns an error if a reference cannot be resolved and the settings ask for a failure.
pub fn project_file(context: &DecompileContext, directory: &Path) -> Result<Vec<u8>> {
    let module = context.module;
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    start(
        &mut writer,
        BytesStart::new("Project").with_attributes([("Sdk", "Microsoft.NET.Sdk")]),
    )?;

    start(&mut writer, BytesStart::new("PropertyGroup"))?;
    element(&mut writer, "AssemblyName", &module.assembly_name())?;
    element(&mut writer, "GenerateAssemblyInfo", "False")?;
    element(
        &mut writer,
        "OutputType",
        if module.entry_point.is_some() { "Exe" } else { "Library" },
    )?;
    element(&mut writer, "TargetFramework", &module.target_framework.moniker())?;
    element(
        &mut writer,
        "LangVersion",
        lang_version(context.settings.language_version),
    )?;
    element(&mut writer, "AllowUnsafeBlocks", "True")?;
    end(&mut writer, "PropertyGroup")?;

    let mut references = Vec::new();
    for reference in module.references.iter().filter(|r| !is_framework_reference(r)) {
        match context.resolver.resolve(reference) {
            Some(path) => references.push((reference, path)),
            None if context.settings.throw_on_assembly_resolve_errors => {
                return Err(Error::Error(format!("Unable to resolve reference '{reference}'")));
            }
            None => warn!("Unable to resolve reference '{reference}'"),
        }
    }

    if !references.is_empty() {
        start(&mut writer, BytesStart::new("ItemGroup"))?;
        for (reference, path) in references {
            start(
                &mut writer,
                BytesStart::new("Reference").with_attributes([("Include", reference.name.as_str())]),
            )?;
            let hint = relative_path(directory, &path);
            element(&mut writer, "HintPath", &hint.to_string_lossy())?;
            end(&mut writer, "Reference")?;
        }
        end(&mut writer, "ItemGroup")?;
    }

    end(&mut writer, "Project")?;

    let mut content = writer.into_inner();
    content.push(b'\n');
    Ok(content)
}

/// Render `Properties/AssemblyInfo.cs`.
#[must_use]
pub fn assembly_info(module: &Module) -> Vec<u8> {
    let mut text = String::from("using System.Reflection;\n\n");
    match &module.identity {
        Some(identity) => {
            text.push_str(&format!("[assembly: AssemblyTitle(\"{}\")]\n", identity.name));
            text.push_str(&format!("[assembly: AssemblyVersion(\"{}\")]\n", identity.version));
        }
        None => text.push_str(&format!("// {} has no assembly manifest\n", module.file_name())),
    }
    text.into_bytes()
}

/// Render every file of the project in `directory`, in checksum order.
///
/// # Errors
/// Returns an error if the project file or a type cannot be rendered.
pub fn project_files(context: &DecompileContext, directory: &Path) -> Result<Vec<ProjectFile>> {
    let mut files = vec![
        ProjectFile {
            path: format!("{}.csproj", clean_file_name(&context.module.assembly_name())),
            content: project_file(context, directory)?,
        },
        ProjectFile {
            path: "Properties/AssemblyInfo.cs".to_string(),
            content: assembly_info(context.module),
        },
    ];

    for (path, definition) in source_paths(context.module) {
        let source = CSharpDecompiler::decompile_types(context, &[definition])?;
        files.push(ProjectFile {
            path,
            content: source.text.into_bytes(),
        });
    }
    Ok(files)
}

fn target_path(directory: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .fold(directory.to_path_buf(), |path, part| path.join(part))
}

/// The native project writer.
#[derive(Debug, Default, Clone, Copy)]
pub struct WholeProjectDecompiler;

impl ProjectDecompiler for WholeProjectDecompiler {
    fn decompile_project(
        &self,
        context: &DecompileContext,
        directory: &Path,
        mut checksum: Option<&mut ChecksumCalculator>,
    ) -> Result<()> {
        let files = project_files(context, directory)?;
        debug!(
            "Project of {} has {} files",
            context.module.name,
            files.len()
        );

        for file in &files {
            if let Some(checksum) = checksum.as_deref_mut() {
                checksum.update(&file.path, &file.content)?;
            }

            if context.settings.produce_source_code {
                let path = target_path(directory, &file.path);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, &file.content)?;
                info!("Writing {}", path.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{resolver::SearchPathResolver, ChecksumAlgorithm, ChecksumMode, DecompilerSettings},
        test::AssemblyBuilder,
    };

    fn sample() -> Module {
        let image = AssemblyBuilder::new("Sample")
            .class("Sample", "Program")
            .method("Main", true)
            .entry_point()
            .interface("Sample.Api", "IService")
            .method("Start", false)
            .class("", "Global")
            .generic_class("Sample", "Box", &["T"])
            .class("Sample", "box")
            .build();
        Module::from_mem(Path::new("Sample.dll"), image).unwrap()
    }

    fn settings(produce_source_code: bool) -> DecompilerSettings {
        DecompilerSettings {
            produce_source_code,
            checksum: ChecksumMode::Enabled {
                algorithm: ChecksumAlgorithm::Sha256,
            },
            ..DecompilerSettings::default()
        }
    }

    fn run(module: &Module, settings: &DecompilerSettings, directory: &Path) -> String {
        let resolver = SearchPathResolver::default();
        let context = DecompileContext {
            module,
            settings,
            resolver: &resolver,
            debug_info: None,
        };
        let mut checksum = ChecksumCalculator::new(&settings.checksum).unwrap().unwrap();
        WholeProjectDecompiler
            .decompile_project(&context, directory, Some(&mut checksum))
            .unwrap();
        assert_eq!(checksum.entries(), 7);
        checksum.hash_string()
    }

    #[test]
    fn file_layout() {
        let module = sample();
        let paths: Vec<String> = source_paths(&module).into_iter().map(|(path, _)| path).collect();
        assert_eq!(
            paths,
            [
                "Sample/Program.cs",
                "Sample.Api/IService.cs",
                "Global.cs",
                "Sample/Box.cs",
                "Sample/box2.cs"
            ]
        );
        assert_eq!(clean_file_name("<Module>"), "_Module_");
        assert_eq!(clean_file_name("a:b|c"), "a_b_c");
    }

    #[test]
    fn writes_project() {
        let module = sample();
        let directory = tempfile::tempdir().unwrap();
        run(&module, &settings(true), directory.path());

        let csproj = fs::read_to_string(directory.path().join("Sample.csproj")).unwrap();
        assert!(csproj.starts_with("<Project Sdk=\"Microsoft.NET.Sdk\">"));
        assert!(csproj.contains("<AssemblyName>Sample</AssemblyName>"));
        assert!(csproj.contains("<OutputType>Exe</OutputType>"));
        assert!(csproj.contains("<LangVersion>latest</LangVersion>"));
        assert!(!csproj.contains("<ItemGroup>"));

        let info = fs::read_to_string(directory.path().join("Properties").join("AssemblyInfo.cs")).unwrap();
        assert!(info.contains("[assembly: AssemblyVersion(\"1.0.0.0\")]"));

        let program = fs::read_to_string(directory.path().join("Sample").join("Program.cs")).unwrap();
        assert!(program.contains("public class Program"));
        assert!(!program.contains("IService"));
        assert!(directory.path().join("Sample.Api").join("IService.cs").is_file());
        assert!(directory.path().join("Global.cs").is_file());
    }

    #[test]
    fn checksum_only_writes_nothing() {
        let module = sample();
        let directory = tempfile::tempdir().unwrap();
        let target = directory.path().join("out");
        run(&module, &settings(false), &target);
        assert!(!target.exists());
    }

    #[test]
    fn checksum_is_deterministic() {
        let module = sample();
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        assert_eq!(
            run(&module, &settings(true), first.path()),
            run(&module, &settings(false), second.path())
        );
    }

    #[test]
    fn hint_paths() {
        let project = Path::new("/work/a/Sample");
        assert_eq!(
            relative_path(project, Path::new("/work/a/Dep.dll")),
            Path::new("..").join("Dep.dll")
        );
        assert_eq!(
            relative_path(project, Path::new("/work/lib/Dep.dll")),
            Path::new("..").join("..").join("lib").join("Dep.dll")
        );
        assert_eq!(
            relative_path(project, Path::new("/work/a/Sample/refs/Dep.dll")),
            Path::new("refs").join("Dep.dll")
        );
    }

    #[test]
    fn lang_versions() {
        assert_eq!(lang_version(LanguageVersion::CSharp7_3), "7.3");
        assert_eq!(lang_version(LanguageVersion::CSharp1), "1");
        assert_eq!(lang_version(LanguageVersion::Preview), "preview");
        assert!(is_framework_reference(&AssemblyIdentity {
            name: "System.Runtime".to_string(),
            ..sample().references[0].clone()
        }));
    }
}
