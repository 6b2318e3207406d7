//! Target framework of a module.
//!
//! SDK-built assemblies carry a `System.Runtime.Versioning.TargetFrameworkAttribute` on the
//! assembly whose single argument is the framework name, for example
//! `.NETCoreApp,Version=v8.0`. [`TargetFramework`] turns that name into the short moniker
//! used in project files (`net8.0`, `net472`, `netstandard2.0`). Assemblies without the
//! attribute fall back to the metadata runtime version string.

use std::fmt;

/// The framework family of a target framework name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkFamily {
    /// .NET Core and .NET 5+
    NetCore,
    /// .NET Framework
    NetFramework,
    /// .NET Standard
    NetStandard,
}

/// A parsed target framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFramework {
    /// Framework family
    pub family: FrameworkFamily,
    /// Version digits, e.g. `[4, 7, 2]`
    pub version: Vec<u32>,
}

impl TargetFramework {
    /// Parse a framework name as stored in `TargetFrameworkAttribute`.
    ///
    /// Returns `None` for unknown families or unparsable versions.
    #[must_use]
    pub fn from_attribute(value: &str) -> Option<Self> {
        let mut parts = value.split(',');
        let family = match parts.next()?.trim() {
            ".NETCoreApp" => FrameworkFamily::NetCore,
            ".NETFramework" => FrameworkFamily::NetFramework,
            ".NETStandard" => FrameworkFamily::NetStandard,
            _ => return None,
        };

        let version = parts.find_map(|part| {
            part.trim()
                .strip_prefix("Version=")
                .map(|v| v.trim_start_matches('v').to_string())
        })?;

        Some(TargetFramework {
            family,
            version: Self::parse_version(&version)?,
        })
    }

    /// Guess the framework from the metadata runtime version string (`v4.0.30319`).
    #[must_use]
    pub fn from_runtime_version(runtime: &str) -> Self {
        if runtime.starts_with("v4") {
            TargetFramework {
                family: FrameworkFamily::NetFramework,
                version: vec![4, 0],
            }
        } else if runtime.starts_with("v2") {
            TargetFramework {
                family: FrameworkFamily::NetFramework,
                version: vec![2, 0],
            }
        } else {
            TargetFramework {
                family: FrameworkFamily::NetStandard,
                version: vec![2, 0],
            }
        }
    }

    fn parse_version(version: &str) -> Option<Vec<u32>> {
        let digits = version
            .split('.')
            .map(|part| part.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;

        if digits.is_empty() {
            None
        } else {
            Some(digits)
        }
    }

    fn major(&self) -> u32 {
        self.version.first().copied().unwrap_or(0)
    }

    fn minor(&self) -> u32 {
        self.version.get(1).copied().unwrap_or(0)
    }

    /// The short moniker used in SDK-style project files.
    #[must_use]
    pub fn moniker(&self) -> String {
        match self.family {
            FrameworkFamily::NetCore if self.major() >= 5 => {
                format!("net{}.{}", self.major(), self.minor())
            }
            FrameworkFamily::NetCore => format!("netcoreapp{}.{}", self.major(), self.minor()),
            FrameworkFamily::NetStandard => {
                format!("netstandard{}.{}", self.major(), self.minor())
            }
            FrameworkFamily::NetFramework => {
                let digits: String = self.version.iter().map(u32::to_string).collect();
                let digits = digits.trim_end_matches('0');
                if digits.len() < 2 {
                    format!("net{}0", self.major())
                } else {
                    format!("net{digits}")
                }
            }
        }
    }
}

impl fmt::Display for TargetFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.moniker())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moniker(value: &str) -> String {
        TargetFramework::from_attribute(value).unwrap().moniker()
    }

    #[test]
    fn monikers() {
        assert_eq!(moniker(".NETCoreApp,Version=v8.0"), "net8.0");
        assert_eq!(moniker(".NETCoreApp,Version=v3.1"), "netcoreapp3.1");
        assert_eq!(moniker(".NETFramework,Version=v4.7.2"), "net472");
        assert_eq!(moniker(".NETFramework,Version=v4.8"), "net48");
        assert_eq!(moniker(".NETFramework,Version=v4.0"), "net40");
        assert_eq!(moniker(".NETStandard,Version=v2.0"), "netstandard2.0");
    }

    #[test]
    fn invalid_names() {
        assert!(TargetFramework::from_attribute("Silverlight,Version=v5.0").is_none());
        assert!(TargetFramework::from_attribute(".NETCoreApp").is_none());
        assert!(TargetFramework::from_attribute(".NETCoreApp,Version=vX").is_none());
    }

    #[test]
    fn runtime_fallback() {
        assert_eq!(
            TargetFramework::from_runtime_version("v4.0.30319").moniker(),
            "net40"
        );
        assert_eq!(
            TargetFramework::from_runtime_version("v2.0.50727").moniker(),
            "net20"
        );
        assert_eq!(
            TargetFramework::from_runtime_version("PDB v1.0").moniker(),
            "netstandard2.0"
        );
    }
}
