//! Decompiler settings derived from the command line.

use std::path::Path;

use log::warn;

use crate::{
    app::Invocation,
    engine::{ChecksumMode, DecompilerSettings},
};

/// Path of the checksum log of `input`: `<input>.crclog`.
#[must_use]
pub fn checksum_log_path(input: &Path) -> std::path::PathBuf {
    let mut path = input.as_os_str().to_owned();
    path.push(".crclog");
    path.into()
}

/// Build the settings of one run.
///
/// `whole_project` is whether the project is written out, as opposed to a checksum-only
/// project run.
#[must_use]
pub fn build(invocation: &Invocation, input: &Path, whole_project: bool) -> DecompilerSettings {
    let algorithm = invocation.checksum_algorithm;
    let checksum = match (invocation.checksum, invocation.checksum_log) {
        (true, true) => ChecksumMode::EnabledWithLog {
            algorithm,
            log_path: checksum_log_path(input),
        },
        (true, false) => ChecksumMode::Enabled { algorithm },
        (false, log) => {
            if log {
                warn!("--crclog has no effect without --crc");
            }
            ChecksumMode::Disabled
        }
    };

    DecompilerSettings {
        language_version: invocation.language_version,
        remove_dead_code: invocation.no_dead_code,
        remove_dead_stores: invocation.no_dead_stores,
        throw_on_assembly_resolve_errors: false,
        checksum,
        produce_source_code: whole_project,
    }
}
