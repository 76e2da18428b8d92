//! Input and output locations.
//!
//! Reading a streaming table needs two passes, so inputs are described by a [`DataSource`]
//! that can be opened repeatedly. Each open must yield byte-identical content.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Location token mapped to standard output by [`open_output`].
pub const STDOUT_LOCATION: &str = "-";

/// A re-openable source of bytes.
pub trait DataSource: Send + Sync {
    /// Open a fresh stream positioned at the start of the data.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Identity used in diagnostics and for cache keys.
    fn name(&self) -> String;
}

/// A file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for FileSource {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Bytes held in memory, shared cheaply between opens.
#[derive(Clone)]
pub struct BytesSource {
    name: String,
    bytes: Arc<[u8]>,
}

impl BytesSource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Convenience constructor for text input.
    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        Self::new(name, text.as_bytes())
    }
}

impl fmt::Debug for BytesSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BytesSource")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl DataSource for BytesSource {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.bytes))))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Open a buffered sink for `location`; [`STDOUT_LOCATION`] means standard output.
pub fn open_output(location: &str) -> io::Result<Box<dyn Write>> {
    if location == STDOUT_LOCATION {
        Ok(Box::new(BufWriter::new(io::stdout())))
    } else {
        Ok(Box::new(BufWriter::new(File::create(location)?)))
    }
}
