//! Project checksum accumulation.
//!
//! The checksum covers the decompiled content of an assembly, not its bytes: the project
//! decompiler feeds every generated file, in a fixed order, into one running digest. Two
//! runs over the same input therefore print the same value, and two builds that differ
//! only in metadata noise (timestamps, MVID) print the same value as well.
//!
//! With logging enabled each entry is also recorded in `<input>.crclog` together with its
//! own digest, which makes it possible to find the entity that changed between builds.

use std::{
    fs,
    io::{BufWriter, Write},
    path::PathBuf,
};

use sha2::digest::DynDigest;

use crate::{
    engine::{ChecksumAlgorithm, ChecksumMode},
    Result,
};

fn hasher(algorithm: ChecksumAlgorithm) -> Box<dyn DynDigest> {
    match algorithm {
        ChecksumAlgorithm::Sha256 => Box::new(sha2::Sha256::default()),
        ChecksumAlgorithm::Sha1 => Box::new(sha1::Sha1::default()),
        ChecksumAlgorithm::Md5 => Box::new(md5::Md5::default()),
    }
}

/// Uppercase hex of `digest`.
#[must_use]
pub fn to_hex(digest: &[u8]) -> String {
    digest.iter().map(|byte| format!("{byte:02X}")).collect()
}

/// The running checksum of one project run.
pub struct ChecksumCalculator {
    algorithm: ChecksumAlgorithm,
    digest: Box<dyn DynDigest>,
    entries: usize,
    log: Option<(PathBuf, BufWriter<fs::File>)>,
}

impl ChecksumCalculator {
    /// Create the calculator for `mode`; `None` when checksums are disabled.
    ///
    /// # Errors
    /// Returns an error if the log file cannot be created.
    pub fn new(mode: &ChecksumMode) -> Result<Option<Self>> {
        let (algorithm, log) = match mode {
            ChecksumMode::Disabled => return Ok(None),
            ChecksumMode::Enabled { algorithm } => (*algorithm, None),
            ChecksumMode::EnabledWithLog {
                algorithm,
                log_path,
            } => {
                let mut writer = BufWriter::new(fs::File::create(log_path)?);
                writeln!(writer, "algorithm: {algorithm}")?;
                (*algorithm, Some((log_path.clone(), writer)))
            }
        };

        Ok(Some(ChecksumCalculator {
            algorithm,
            digest: hasher(algorithm),
            entries: 0,
            log,
        }))
    }

    /// The algorithm in use.
    #[must_use]
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Number of entries fed so far.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Feed one named entry.
    ///
    /// The name is part of the digest, so moving content between entries changes the
    /// checksum.
    ///
    /// # Errors
    /// Returns an error if the log cannot be written.
    pub fn update(&mut self, entry: &str, data: &[u8]) -> Result<()> {
        self.digest.update(entry.as_bytes());
        self.digest.update(&[0]);
        self.digest.update(&(data.len() as u64).to_le_bytes());
        self.digest.update(data);
        self.entries += 1;

        if let Some((_, log)) = &mut self.log {
            let mut single = hasher(self.algorithm);
            single.update(data);
            writeln!(log, "{entry}: {}", to_hex(&single.finalize()))?;
        }
        Ok(())
    }

    /// The digest over everything fed so far, as uppercase hex.
    #[must_use]
    pub fn hash_string(&self) -> String {
        to_hex(&self.digest.box_clone().finalize())
    }

    /// Finish the run: record the total in the log, flush and close it.
    ///
    /// # Errors
    /// Returns an error if the log cannot be written.
    pub fn finish(self) -> Result<String> {
        let total = self.hash_string();
        if let Some((path, mut log)) = self.log {
            writeln!(log, "total ({} entries): {total}", self.entries)?;
            log.flush()?;
            log::debug!("Checksum log written to {}", path.display());
        }
        Ok(total)
    }
}
