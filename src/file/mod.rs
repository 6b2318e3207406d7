//! PE container access for .NET assemblies.
//!
//! [`File`] owns the raw bytes of an image, memory-mapped for regular files and read
//! into a buffer for pipes and other unmappable inputs, together with the goblin view of its PE headers. It offers bounds-checked
//! slices, RVA translation and the two data directories the engine cares about: the CLR
//! runtime header and the debug directory.
//!
//! # Key Components
//! - [`File`] - The loaded image
//! - [`Backend`] - Storage abstraction over mapped files and buffers
//! - [`debug`] - Debug directory entries and CodeView records
//! - [`parser::Parser`] - Cursor over metadata blobs
//! - [`io`] - Little-endian reading and writing helpers
//!
//! # Examples
//!
//! ```rust,no_run
//! use ildecomp::file::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("Sample.dll"))?;
//! let (clr_rva, clr_size) = file.clr()?;
//! let clr_offset = file.rva_to_offset(clr_rva)?;
//! let clr_data = file.data_slice(clr_offset, clr_size)?;
//! println!("CLR header starts with: {:02x?}", &clr_data[0..8]);
//! # Ok::<(), ildecomp::Error>(())
//! ```
//!
//! # References
//!
//! - Microsoft PE/COFF Specification
//! - ECMA-335 6th Edition, Partition II - PE File Format

pub mod debug;
pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::{fs, path::Path};

use goblin::pe::{
    data_directories::DataDirectoryType, header::Header, section_table::SectionTable, PE,
};
use ouroboros::self_referencing;

use log::debug;

use crate::{
    Error::{Empty, GoblinErr},
    Result,
};
use debug::DebugDirectoryEntry;
use memory::Buffer;
use physical::Physical;

/// Storage of the raw image bytes.
pub trait Backend: Send + Sync {
    /// A bounds-checked slice of `len` bytes at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// All bytes.
    fn data(&self) -> &[u8];

    /// Number of bytes.
    fn len(&self) -> usize;
}

/// A loaded PE image with a CLR runtime header.
#[self_referencing]
pub struct File {
    data: Box<dyn Backend>,
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl File {
    /// Parse the image at `file`.
    ///
    /// Regular files are memory-mapped; anything else (a FIFO, `/dev/stdin`) is read to
    /// its end first.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is empty, is not a PE image or has no
    /// CLR runtime header.
    pub fn from_file(file: &Path) -> Result<File> {
        if fs::metadata(file)?.is_file() {
            return Self::load(Physical::new(file)?);
        }

        debug!("{} is not a regular file, reading it into memory", file.display());
        Self::load(Buffer::read_from(fs::File::open(file)?)?)
    }

    /// Parse an image held in memory.
    ///
    /// # Errors
    /// Same as [`File::from_file`], minus the I/O.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        Self::load(Buffer::new(data))
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let data = Box::new(data);

        File::try_new(data, |data| {
            let data = data.as_ref();
            match PE::parse(data.data()) {
                Ok(pe) => match pe.header.optional_header {
                    Some(optional_header) => {
                        if optional_header
                            .data_directories
                            .get_clr_runtime_header()
                            .is_none()
                        {
                            Err(malformed_error!(
                                "File does not have a CLR runtime header directory"
                            ))
                        } else {
                            Ok(pe)
                        }
                    }
                    None => Err(malformed_error!("File does not have an OptionalHeader")),
                },
                Err(error) => Err(GoblinErr(error)),
            }
        })
    }

    /// Size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Whether the image holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Preferred load address.
    #[must_use]
    pub fn imagebase(&self) -> u64 {
        self.with_pe(|pe| pe.image_base)
    }

    /// COFF and optional headers.
    #[must_use]
    pub fn header(&self) -> &Header {
        self.with_pe(|pe| &pe.header)
    }

    /// `TimeDateStamp` of the COFF header.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        self.with_pe(|pe| pe.header.coff_header.time_date_stamp)
    }

    /// Section table.
    pub fn sections(&self) -> impl Iterator<Item = &SectionTable> {
        self.with_pe(|pe| pe.sections.iter())
    }

    /// RVA and size of the CLR runtime header.
    ///
    /// # Errors
    /// Returns an error if the directory is missing, which [`File::from_file`] already
    /// rules out.
    pub fn clr(&self) -> Result<(usize, usize)> {
        self.get_data_directory(DataDirectoryType::ClrRuntimeHeader)
            .map(|(rva, size)| (rva as usize, size as usize))
            .ok_or_else(|| malformed_error!("File does not have a CLR runtime header directory"))
    }

    /// RVA and size of a non-empty data directory.
    #[must_use]
    pub fn get_data_directory(&self, dir_type: DataDirectoryType) -> Option<(u32, u32)> {
        self.with_pe(|pe| {
            pe.header.optional_header.and_then(|optional_header| {
                optional_header
                    .data_directories
                    .dirs()
                    .find(|(directory_type, directory)| {
                        *directory_type == dir_type
                            && directory.virtual_address != 0
                            && directory.size != 0
                    })
                    .map(|(_, directory)| (directory.virtual_address, directory.size))
            })
        })
    }

    /// Entries of the debug directory, empty if the image has none.
    ///
    /// # Errors
    /// Returns an error if the directory or a CodeView record it points to is truncated.
    pub fn debug_entries(&self) -> Result<Vec<DebugDirectoryEntry>> {
        let Some((rva, size)) = self.get_data_directory(DataDirectoryType::DebugTable) else {
            return Ok(Vec::new());
        };

        let offset = self.rva_to_offset(rva as usize)?;
        let directory = self.data_slice(offset, size as usize)?;

        debug::read_entries(directory, self.data())
    }

    /// All bytes of the image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.with_data(|data| data.data())
    }

    /// A bounds-checked slice of the image.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.with_data(|data| data.data_slice(offset, len))
    }

    /// Translate an RVA into a file offset.
    ///
    /// # Errors
    /// Returns an error if no section maps the RVA.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let rva_u32 =
            u32::try_from(rva).map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

        self.with_pe(|pe| {
            for section in &pe.sections {
                let Some(section_max) = section
                    .virtual_address
                    .checked_add(section.virtual_size.max(section.size_of_raw_data))
                else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        section.virtual_size
                    ));
                };

                if section.virtual_address <= rva_u32 && section_max > rva_u32 {
                    return Ok((rva - section.virtual_address as usize)
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::AssemblyBuilder;

    #[test]
    fn load_built_image() {
        let image = AssemblyBuilder::new("Sample").with_codeview().build();
        let file = File::from_mem(image).unwrap();

        let (clr_rva, clr_size) = file.clr().unwrap();
        assert_eq!(clr_size, 72);

        let offset = file.rva_to_offset(clr_rva).unwrap();
        assert_eq!(&file.data_slice(offset, 4).unwrap(), &[72, 0, 0, 0]);

        let entries = file.debug_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].codeview.is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(File::from_mem(Vec::new()), Err(Empty)));
        assert!(File::from_mem(vec![0xCC; 512]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn reads_fifo_into_memory() {
        use std::{io::Write, process::Command, thread};

        let directory = tempfile::tempdir().unwrap();
        let fifo = directory.path().join("Sample.dll");
        assert!(Command::new("mkfifo").arg(&fifo).status().unwrap().success());

        let image = AssemblyBuilder::new("Sample").build();
        let expected = image.len();
        let writer = {
            let fifo = fifo.clone();
            thread::spawn(move || fs::OpenOptions::new().write(true).open(fifo).unwrap().write_all(&image).unwrap())
        };

        let file = File::from_file(&fifo).unwrap();
        writer.join().unwrap();
        assert_eq!(file.len(), expected);
        assert!(file.clr().is_ok());
    }

    #[test]
    fn rva_out_of_sections() {
        let image = AssemblyBuilder::new("Sample").build();
        let file = File::from_mem(image).unwrap();

        assert!(file.rva_to_offset(0x0F00_0000).is_err());
        assert!(file.debug_entries().unwrap().is_empty());
    }
}
