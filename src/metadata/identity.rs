//! Assembly identities.
//!
//! An [`AssemblyIdentity`] names an assembly the way the runtime binder does: simple name,
//! four-part version, culture and public key token. The module's own identity comes from
//! the `Assembly` table, referenced assemblies from `AssemblyRef`. When a row carries the
//! full public key instead of its token, the token is derived as the last 8 bytes of the
//! SHA-1 hash of the key, in reverse order.
//!
//! # Reference
//! - [ECMA-335 II.6.2.1.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::fmt;

use sha1::{Digest, Sha1};

/// `AssemblyFlags.PublicKey`: the blob holds the full key rather than its token.
pub const ASSEMBLY_FLAGS_PUBLIC_KEY: u32 = 0x0001;

/// A four-part assembly version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssemblyVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

impl AssemblyVersion {
    /// Create a version from its four parts.
    #[must_use]
    pub fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        AssemblyVersion {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// Identity of an assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyIdentity {
    /// Simple name
    pub name: String,
    /// Version
    pub version: AssemblyVersion,
    /// Culture, `None` for the invariant culture
    pub culture: Option<String>,
    /// 8-byte public key token, `None` for unsigned assemblies
    pub public_key_token: Option<[u8; 8]>,
}

impl AssemblyIdentity {
    /// Build an identity from the columns of an `Assembly` or `AssemblyRef` row.
    ///
    /// `key_blob` is the public key or its token, as announced by `flags`.
    #[must_use]
    pub fn from_row(
        name: &str,
        version: AssemblyVersion,
        culture: &str,
        flags: u32,
        key_blob: &[u8],
    ) -> Self {
        let public_key_token = if key_blob.is_empty() {
            None
        } else if flags & ASSEMBLY_FLAGS_PUBLIC_KEY != 0 || key_blob.len() != 8 {
            Some(Self::token_from_key(key_blob))
        } else {
            let mut token = [0_u8; 8];
            token.copy_from_slice(key_blob);
            Some(token)
        };

        AssemblyIdentity {
            name: name.to_string(),
            version,
            culture: if culture.is_empty() || culture.eq_ignore_ascii_case("neutral") {
                None
            } else {
                Some(culture.to_string())
            },
            public_key_token,
        }
    }

    /// Derive the public key token from a full public key.
    #[must_use]
    pub fn token_from_key(public_key: &[u8]) -> [u8; 8] {
        let hash = Sha1::digest(public_key);

        let mut token = [0_u8; 8];
        for (slot, byte) in token.iter_mut().zip(hash.iter().rev()) {
            *slot = *byte;
        }
        token
    }

    /// The public key token as lowercase hex, or `null`.
    #[must_use]
    pub fn token_string(&self) -> String {
        match &self.public_key_token {
            Some(token) => token.iter().map(|byte| format!("{byte:02x}")).collect(),
            None => "null".to_string(),
        }
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, Version={}, Culture={}, PublicKeyToken={}",
            self.name,
            self.version,
            self.culture.as_deref().unwrap_or("neutral"),
            self.token_string()
        )
    }
}
