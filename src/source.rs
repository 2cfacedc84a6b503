//! Random access to lines of the indexed source file.

use crate::error::Result;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Reads single lines of a source file by starting byte offset. Used to turn
/// the offsets stored in a secondary index back into records.
#[derive(Debug)]
pub struct SourceReader {
    path: PathBuf,
    reader: BufReader<File>,
}

impl SourceReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
        })
    }

    /// The line starting at `offset`, without its terminator. `None` at or past
    /// the end of the file.
    pub fn line_at(&mut self, offset: u64) -> Result<Option<String>> {
        self.reader.seek(SeekFrom::Start(offset))?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
