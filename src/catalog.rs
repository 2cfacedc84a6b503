//! Durable registry of segments and the source byte ranges they cover.
//!
//! Stored as `<index_dir>/properties`:
//!
//! ```text
//! # lineidx catalog: <segment>=<start>;<end>
//! 0_1700000000000=0;4095
//! 0_1700000000517=4096;8191
//! ```
//!
//! Entries keep their creation order. The file is rewritten atomically on
//! every [`Catalog::persist`].

use crate::durable;
use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CATALOG_FILE: &str = "properties";
const HEADER: &str = "# lineidx catalog: <segment>=<start>;<end>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub start: u64,
    pub end: u64,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }
}

#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Loads the catalog of an index directory, creating an empty one if none
    /// exists. An unreadable catalog is left on disk untouched and loaded as
    /// empty; the next writer to persist replaces it.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let mut catalog = Self {
            path: dir.join(CATALOG_FILE),
            entries: Vec::new(),
        };

        match catalog.reload() {
            Ok(()) => {}
            Err(Error::Corruption(reason)) => {
                tracing::warn!(path = %catalog.path.display(), %reason, "Catalog unreadable, starting empty");
                return Ok(catalog);
            }
            Err(e) => return Err(e),
        }

        if !catalog.path.exists() {
            catalog.persist()?;
        }
        Ok(catalog)
    }

    /// Re-reads the file, replacing the in-memory entries. A missing file
    /// reads as empty.
    pub fn reload(&mut self) -> Result<()> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.entries.clear();
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(Error::Corruption(format!("catalog is not UTF-8: {}", e)))
            }
            Err(e) => return Err(e.into()),
        };

        self.entries = parse(&text)?;
        Ok(())
    }

    pub fn persist(&self) -> Result<()> {
        durable::write_atomic(&self.path, render(&self.entries).as_bytes())?;
        Ok(())
    }

    /// Registers a segment, replacing an entry of the same name.
    pub fn insert(&mut self, entry: CatalogEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<CatalogEntry> {
        let idx = self.entries.iter().position(|e| e.name == name)?;
        Some(self.entries.remove(idx))
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Highest end offset of any segment, 0 when there are none.
    pub fn max_pos(&self) -> u64 {
        self.entries.iter().map(|e| e.end).max().unwrap_or(0)
    }

    /// End offset of the segment whose `[start, end)` contains `pos`, or -1.
    pub fn partial_end_for_pos(&self, pos: u64) -> i64 {
        self.entries
            .iter()
            .find(|e| e.start <= pos && pos < e.end)
            .map_or(-1, |e| i64::try_from(e.end).unwrap_or(i64::MAX))
    }

    /// Whether a segment's `[start, end]` contains `pos`.
    pub fn covers(&self, pos: u64) -> bool {
        self.entries.iter().any(|e| e.start <= pos && pos <= e.end)
    }

    /// Stretches the segment covering `start - 1` up to `end`, or failing
    /// that the one covering `end + 1` down to `start`, so a line that is not
    /// indexed leaves no gap. Returns whether an entry changed.
    pub fn extend_adjacent(&mut self, start: u64, end: u64) -> bool {
        if self.covers(start) {
            return false;
        }

        let before = start.checked_sub(1).and_then(|pos| self.covering_mut(pos));
        if let Some(entry) = before {
            entry.end = entry.end.max(end);
            return true;
        }
        let after = end.checked_add(1).and_then(|pos| self.covering_mut(pos));
        if let Some(entry) = after {
            entry.start = entry.start.min(start);
            return true;
        }
        false
    }

    fn covering_mut(&mut self, pos: u64) -> Option<&mut CatalogEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.start <= pos && pos <= e.end)
    }

    /// Covered `(start, end)` ranges sorted by start. With bounds
    /// `(min, max)`, only segments starting in `[min, max)` are returned.
    pub fn to_ranges(&self, bounds: Option<(u64, u64)>) -> Vec<(u64, u64)> {
        let mut ranges: Vec<(u64, u64)> = self
            .entries
            .iter()
            .filter(|e| bounds.map_or(true, |(min, max)| e.start >= min && e.start < max))
            .map(|e| (e.start, e.end))
            .collect();
        ranges.sort_unstable();
        ranges.dedup();
        ranges
    }
}

fn parse(text: &str) -> Result<Vec<CatalogEntry>> {
    let mut entries = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let malformed = || Error::Corruption(format!("catalog line {}: {:?}", lineno + 1, line));
        let (name, range) = line.split_once('=').ok_or_else(malformed)?;
        let (start, end) = range.split_once(';').ok_or_else(malformed)?;
        let start = start.trim().parse().map_err(|_| malformed())?;
        let end = end.trim().parse().map_err(|_| malformed())?;

        let name = name.trim();
        if name.is_empty() {
            return Err(malformed());
        }
        entries.push(CatalogEntry::new(name, start, end));
    }
    Ok(entries)
}

fn render(entries: &[CatalogEntry]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for entry in entries {
        out.push_str(&format!("{}={};{}\n", entry.name, entry.start, entry.end));
    }
    out
}
