//! Reference resolution through search directories.
//!
//! Referenced assemblies are looked up as `<name>.dll` or `<name>.exe`, first next to the
//! module, then in the directories given with `--referencepath`, and finally in the shared
//! framework directory of an installed .NET runtime matching the module's target
//! framework.

use std::{
    env,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    engine::AssemblyResolver,
    metadata::{
        framework::{FrameworkFamily, TargetFramework},
        identity::AssemblyIdentity,
    },
    module::Module,
};

const EXTENSIONS: [&str; 2] = ["dll", "exe"];

/// Resolver over an ordered list of directories.
#[derive(Debug, Clone, Default)]
pub struct SearchPathResolver {
    directories: Vec<PathBuf>,
}

impl SearchPathResolver {
    /// A resolver searching `directories` in order.
    #[must_use]
    pub fn new(directories: Vec<PathBuf>) -> Self {
        SearchPathResolver { directories }
    }

    /// The resolver for `module` with the user's `search_paths`.
    #[must_use]
    pub fn for_module(module: &Module, search_paths: &[PathBuf]) -> Self {
        let mut directories = Vec::with_capacity(search_paths.len() + 2);
        if let Some(parent) = module.path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            directories.push(parent.to_path_buf());
        }
        directories.extend(search_paths.iter().cloned());
        if let Some(framework) = framework_directory(&module.target_framework) {
            directories.push(framework);
        }

        debug!(
            "Resolving references of {} for {} in {} directories",
            module.name,
            module.target_framework.moniker(),
            directories.len()
        );
        SearchPathResolver { directories }
    }

    /// [`crate::engine::ResolverFactory`] of the native engine.
    #[must_use]
    pub fn factory(module: &Module, search_paths: &[PathBuf]) -> Box<dyn AssemblyResolver> {
        Box::new(Self::for_module(module, search_paths))
    }
}

impl AssemblyResolver for SearchPathResolver {
    fn resolve(&self, reference: &AssemblyIdentity) -> Option<PathBuf> {
        self.directories.iter().find_map(|directory| {
            EXTENSIONS
                .iter()
                .map(|extension| directory.join(format!("{}.{extension}", reference.name)))
                .find(|candidate| candidate.is_file())
        })
    }

    fn search_directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

/// Installation roots of the .NET runtime, `DOTNET_ROOT` first.
fn dotnet_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(root) = env::var_os("DOTNET_ROOT") {
        roots.push(PathBuf::from(root));
    }
    for default in [
        "/usr/share/dotnet",
        "/usr/lib/dotnet",
        "/usr/local/share/dotnet",
        "C:\\Program Files\\dotnet",
    ] {
        roots.push(PathBuf::from(default));
    }
    roots
}

/// The shared framework directory best matching `framework`, for .NET Core targets.
fn framework_directory(framework: &TargetFramework) -> Option<PathBuf> {
    if framework.family != FrameworkFamily::NetCore {
        return None;
    }

    let wanted = framework.version.iter().take(2).copied().collect::<Vec<_>>();
    dotnet_roots().into_iter().find_map(|root| {
        let shared = root.join("shared").join("Microsoft.NETCore.App");
        let mut candidates: Vec<(Vec<u32>, PathBuf)> = std::fs::read_dir(&shared)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let version = parse_version(&name)?;
                Some((version, entry.path()))
            })
            .collect();
        candidates.sort();

        candidates
            .iter()
            .rev()
            .find(|(version, _)| version.starts_with(&wanted))
            .or_else(|| candidates.last())
            .map(|(_, path)| path.clone())
    })
}

fn parse_version(name: &str) -> Option<Vec<u32>> {
    let release = name.split('-').next()?;
    release
        .split('.')
        .map(|part| part.parse::<u32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::metadata::identity::AssemblyVersion;

    fn identity(name: &str) -> AssemblyIdentity {
        AssemblyIdentity::from_row(name, AssemblyVersion::new(1, 0, 0, 0), "", 0, &[])
    }

    #[test]
    fn search_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("Library.dll"), b"").unwrap();
        fs::write(second.path().join("Tool.exe"), b"").unwrap();
        fs::write(first.path().join("Tool.exe"), b"").unwrap();

        let resolver = SearchPathResolver::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);

        assert_eq!(
            resolver.resolve(&identity("Library")),
            Some(second.path().join("Library.dll"))
        );
        assert_eq!(
            resolver.resolve(&identity("Tool")),
            Some(first.path().join("Tool.exe"))
        );
        assert_eq!(resolver.resolve(&identity("Missing")), None);
        assert_eq!(resolver.search_directories().len(), 2);
    }

    #[test]
    fn versions() {
        assert_eq!(parse_version("8.0.11"), Some(vec![8, 0, 11]));
        assert_eq!(parse_version("9.0.0-rc.2.24473.5"), Some(vec![9, 0, 0]));
        assert_eq!(parse_version("latest"), None);
    }

    #[test]
    fn framework_directories_only_for_core() {
        let framework = TargetFramework {
            family: FrameworkFamily::NetFramework,
            version: vec![4, 8],
        };
        assert_eq!(framework_directory(&framework), None);
    }
}
