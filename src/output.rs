//! Output routing.
//!
//! [`resolve`] decides where a mode writes, from the input path, the output directory and
//! the mode alone; [`OutputTarget`] is the opened stream for routes that are not
//! directories.

use std::{
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::dispatch::ModeSelection;

/// Where the results of a mode go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputRoute {
    /// Standard output
    Console,
    /// A file, created or truncated
    File(PathBuf),
    /// A project directory
    Directory(PathBuf),
}

/// File name suffix of a mode's single-file output.
#[must_use]
pub fn extension(mode: ModeSelection) -> &'static str {
    match mode {
        ModeSelection::EntityList => ".list.txt",
        ModeSelection::Il => ".il",
        ModeSelection::PdbGen => ".pdb",
        ModeSelection::SingleDecompile => ".decompiled.cs",
        ModeSelection::Project | ModeSelection::Version => "",
    }
}

fn stem(input: &Path) -> String {
    input
        .file_stem()
        .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned())
}

/// Decide the route of `mode`.
#[must_use]
pub fn resolve(
    input: &Path,
    output_dir: Option<&Path>,
    mode: ModeSelection,
    type_name: Option<&str>,
) -> OutputRoute {
    match (mode, output_dir) {
        (ModeSelection::Project, Some(directory)) => OutputRoute::Directory(directory.to_path_buf()),
        (ModeSelection::Project, None) => {
            let parent = input.parent().unwrap_or(Path::new(""));
            OutputRoute::Directory(parent.join(stem(input)))
        }
        (ModeSelection::PdbGen, None) => OutputRoute::File(input.with_extension("pdb")),
        (ModeSelection::Version, _) | (_, None) => OutputRoute::Console,
        (mode, Some(directory)) => {
            let stem = match (mode, type_name) {
                (ModeSelection::SingleDecompile, Some(name)) if !name.is_empty() => name.to_string(),
                _ => stem(input),
            };
            OutputRoute::File(directory.join(format!("{stem}{}", extension(mode))))
        }
    }
}

/// An opened stream route.
pub enum OutputTarget<'a> {
    /// Borrowed standard output
    Console(&'a mut dyn Write),
    /// A file opened for writing
    File(BufWriter<fs::File>),
}

impl<'a> OutputTarget<'a> {
    /// Open `route`, creating or truncating the file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created, or for directory routes.
    pub fn open(route: &OutputRoute, console: &'a mut dyn Write) -> io::Result<Self> {
        match route {
            OutputRoute::Console => Ok(OutputTarget::Console(console)),
            OutputRoute::File(path) => Ok(OutputTarget::File(BufWriter::new(fs::File::create(path)?))),
            OutputRoute::Directory(path) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory route", path.display()),
            )),
        }
    }

    /// Flush everything written.
    ///
    /// # Errors
    /// Returns the error of the final flush.
    pub fn finish(mut self) -> io::Result<()> {
        self.flush()
    }
}

impl Write for OutputTarget<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputTarget::Console(console) => console.write(buf),
            OutputTarget::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputTarget::Console(console) => console.flush(),
            OutputTarget::File(file) => file.flush(),
        }
    }
}
