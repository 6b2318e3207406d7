//! Debug directory entries.
//!
//! The debug data directory is an array of 28-byte `IMAGE_DEBUG_DIRECTORY` records. The
//! record of type [`IMAGE_DEBUG_TYPE_CODEVIEW`] points to an `RSDS` block naming the PDB
//! that belongs to the image: a GUID, an age and the path the compiler wrote the PDB to.
//! For portable PDBs the GUID together with the record's timestamp forms the 20-byte PDB
//! id stored in the `#Pdb` stream.
//!
//! # Reference
//! - [PE Format, The .debug Section](https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#the-debug-section)
//! - [Portable PDB CodeView entry](https://github.com/dotnet/runtime/blob/main/docs/design/specs/PE-COFF.md)

use crate::{
    file::io::{read_le, read_le_at},
    Result,
};

/// Size of one `IMAGE_DEBUG_DIRECTORY` record.
pub const DEBUG_DIRECTORY_ENTRY_SIZE: usize = 28;
/// CodeView debug information.
pub const IMAGE_DEBUG_TYPE_CODEVIEW: u32 = 2;
/// Deterministic build marker.
pub const IMAGE_DEBUG_TYPE_REPRODUCIBLE: u32 = 16;
/// Embedded portable PDB.
pub const IMAGE_DEBUG_TYPE_EMBEDDED_PORTABLE_PDB: u32 = 17;
/// Hash of the associated PDB.
pub const IMAGE_DEBUG_TYPE_PDB_CHECKSUM: u32 = 19;
/// `RSDS` signature of a PDB 7.0 CodeView record.
pub const CODEVIEW_RSDS: u32 = 0x5344_5352;
/// Minor version marking a CodeView record that points to a portable PDB (`PM`).
pub const PORTABLE_PDB_MINOR_VERSION: u16 = 0x504D;

/// A decoded `RSDS` CodeView record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeViewInfo {
    /// PDB signature GUID
    pub guid: uguid::Guid,
    /// PDB age
    pub age: u32,
    /// PDB path as written by the compiler
    pub path: String,
}

/// One record of the debug directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugDirectoryEntry {
    /// `TimeDateStamp`, the second half of a portable PDB id
    pub timestamp: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// `IMAGE_DEBUG_TYPE_*`
    pub debug_type: u32,
    /// Size of the referenced data
    pub size_of_data: u32,
    /// RVA of the referenced data
    pub address_of_raw_data: u32,
    /// File offset of the referenced data
    pub pointer_to_raw_data: u32,
    /// Decoded CodeView record for [`IMAGE_DEBUG_TYPE_CODEVIEW`] entries
    pub codeview: Option<CodeViewInfo>,
}

impl DebugDirectoryEntry {
    /// Whether this is a CodeView entry describing a portable PDB.
    #[must_use]
    pub fn is_portable_codeview(&self) -> bool {
        self.debug_type == IMAGE_DEBUG_TYPE_CODEVIEW
            && self.minor_version == PORTABLE_PDB_MINOR_VERSION
    }

    /// The 20-byte portable PDB id: the CodeView GUID followed by the timestamp.
    #[must_use]
    pub fn pdb_id(&self) -> Option<[u8; 20]> {
        let codeview = self.codeview.as_ref()?;

        let mut id = [0_u8; 20];
        id[..16].copy_from_slice(&codeview.guid.to_bytes());
        id[16..].copy_from_slice(&self.timestamp.to_le_bytes());
        Some(id)
    }
}

/// Decode all records of a debug directory.
///
/// `image` is the whole file, used to follow the records' file pointers to CodeView data.
///
/// # Errors
/// Returns an error if the directory is truncated or a CodeView record is malformed.
pub fn read_entries(directory: &[u8], image: &[u8]) -> Result<Vec<DebugDirectoryEntry>> {
    if directory.len() % DEBUG_DIRECTORY_ENTRY_SIZE != 0 {
        return Err(malformed_error!(
            "Debug directory size is not a multiple of {} - {}",
            DEBUG_DIRECTORY_ENTRY_SIZE,
            directory.len()
        ));
    }

    let mut entries = Vec::with_capacity(directory.len() / DEBUG_DIRECTORY_ENTRY_SIZE);
    for record in directory.chunks_exact(DEBUG_DIRECTORY_ENTRY_SIZE) {
        let mut offset = 4;
        let timestamp = read_le_at::<u32>(record, &mut offset)?;
        let major_version = read_le_at::<u16>(record, &mut offset)?;
        let minor_version = read_le_at::<u16>(record, &mut offset)?;
        let debug_type = read_le_at::<u32>(record, &mut offset)?;
        let size_of_data = read_le_at::<u32>(record, &mut offset)?;
        let address_of_raw_data = read_le_at::<u32>(record, &mut offset)?;
        let pointer_to_raw_data = read_le_at::<u32>(record, &mut offset)?;

        let codeview = if debug_type == IMAGE_DEBUG_TYPE_CODEVIEW {
            let start = pointer_to_raw_data as usize;
            let end = start
                .checked_add(size_of_data as usize)
                .ok_or(out_of_bounds_error!())?;
            if end > image.len() {
                return Err(out_of_bounds_error!());
            }
            read_codeview(&image[start..end])?
        } else {
            None
        };

        entries.push(DebugDirectoryEntry {
            timestamp,
            major_version,
            minor_version,
            debug_type,
            size_of_data,
            address_of_raw_data,
            pointer_to_raw_data,
            codeview,
        });
    }

    Ok(entries)
}

/// Decode an `RSDS` record; other CodeView formats yield `None`.
///
/// # Errors
/// Returns an error if an `RSDS` record is truncated.
pub fn read_codeview(data: &[u8]) -> Result<Option<CodeViewInfo>> {
    if data.len() < 4 || read_le::<u32>(data)? != CODEVIEW_RSDS {
        return Ok(None);
    }
    if data.len() < 24 {
        return Err(out_of_bounds_error!());
    }

    let mut guid = [0_u8; 16];
    guid.copy_from_slice(&data[4..20]);
    let age = read_le::<u32>(&data[20..])?;

    let path = &data[24..];
    let path = match path.iter().position(|byte| *byte == 0) {
        Some(end) => &path[..end],
        None => path,
    };

    Ok(Some(CodeViewInfo {
        guid: uguid::Guid::from_bytes(guid),
        age,
        path: String::from_utf8_lossy(path).into_owned(),
    }))
}
