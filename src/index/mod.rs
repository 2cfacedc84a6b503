//! The index over one source file.
//!
//! An [`Index`] is fed the lines of its source in offset order through
//! [`Index::add_line`]. Keyed entries collect in a [`WriteBuffer`] and are
//! flushed into immutable segments registered in the catalog. At most one
//! instance per index directory writes, guarded by the [`WriterLock`]; the
//! others only answer whether a line matches the default key ranges.
//!
//! Two flavors exist: [`Primary`] stores whole lines, [`Secondary`] stores
//! their byte offsets and resolves them through the source file on read.

mod builder;
mod disabled;
mod registry;

pub use builder::IndexBuilder;
pub use disabled::NoIndex;
pub use registry::{build_index, IndexKind, LineIndex, Record};

use crate::buffer::WriteBuffer;
use crate::catalog::{Catalog, CatalogEntry};
use crate::config::IndexConfig;
use crate::encoding::{Key, Value};
use crate::error::{Error, Result};
use crate::extractor::KeyExtractor;
use crate::iterator::RangeIterator;
use crate::lock::WriterLock;
use crate::range::{KeyRange, RangeSet};
use crate::segment::{self, Segment};
use crate::source::SourceReader;
use std::fmt::Debug;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Bounds every index key type satisfies.
pub trait IndexKey: Key + Ord + Clone + Send + Debug + 'static {}

impl<T: Key + Ord + Clone + Send + Debug + 'static> IndexKey for T {}

/// What an index stores per line.
pub trait Flavor: Send + 'static {
    type Value: Value + Clone + Send + Debug + 'static;

    const KIND: IndexKind;

    fn value_for(line: &str, pos: u64) -> Self::Value;

    fn into_record(value: Self::Value) -> Record;
}

/// Stores the full line.
#[derive(Debug, Clone, Copy)]
pub struct Primary;

impl Flavor for Primary {
    type Value = String;

    const KIND: IndexKind = IndexKind::Primary;

    fn value_for(line: &str, _pos: u64) -> String {
        line.to_string()
    }

    fn into_record(value: String) -> Record {
        Record::Line(value)
    }
}

/// Stores the line's starting byte offset.
#[derive(Debug, Clone, Copy)]
pub struct Secondary;

impl Flavor for Secondary {
    type Value = u64;

    const KIND: IndexKind = IndexKind::Secondary;

    fn value_for(_line: &str, pos: u64) -> u64 {
        pos
    }

    fn into_record(value: u64) -> Record {
        Record::Offset(value)
    }
}

struct OpenState<K, V> {
    catalog: Arc<Mutex<Catalog>>,
    buffer: WriteBuffer<K, V>,
    lock: WriterLock,
}

impl<K: IndexKey, V: Value + Clone> OpenState<K, V> {
    /// Writes the pending buffer as a segment, returning whether one was
    /// written. On failure the buffer and the catalog are left as they were
    /// so a later flush can retry.
    fn flush(&mut self, dir: &Path, extractor_id: &str, config: &IndexConfig) -> Result<bool> {
        let Some(span) = self.buffer.seal() else {
            return Ok(false);
        };

        match self.write_segment(dir, extractor_id, span, config) {
            Ok(segment) => {
                tracing::info!(
                    segment = %segment.name(),
                    start = span.0,
                    end = span.1,
                    entries = segment.len(),
                    "Flushed segment"
                );
                self.buffer.reset();
                Ok(true)
            }
            Err(e) => {
                self.buffer.unseal();
                Err(e)
            }
        }
    }

    fn write_segment(
        &self,
        dir: &Path,
        extractor_id: &str,
        span: (u64, u64),
        config: &IndexConfig,
    ) -> Result<Segment<K, V>> {
        let segment = Segment::create(
            dir,
            extractor_id,
            self.buffer.entries().to_vec(),
            span,
            config.leaf_capacity,
            config.inner_capacity,
        )?;

        let mut catalog = self.catalog.lock()?;
        if let Err(e) = catalog.reload() {
            tracing::warn!(path = %catalog.path().display(), error = %e, "Catalog reload failed, keeping cached entries");
        }
        catalog.insert(CatalogEntry::new(segment.name(), span.0, span.1));
        if let Err(e) = catalog.persist() {
            catalog.remove(segment.name());
            if let Err(cleanup) = segment::delete(dir, segment.name()) {
                tracing::warn!(segment = %segment.name(), error = %cleanup, "Failed to remove unregistered segment");
            }
            return Err(e);
        }
        Ok(segment)
    }

    /// Flushes a full buffer while indexing. A written segment spends one
    /// unit of `budget`.
    fn flush_full(
        &mut self,
        budget: &mut usize,
        dir: &Path,
        extractor_id: &str,
        config: &IndexConfig,
    ) {
        match self.flush(dir, extractor_id, config) {
            Ok(true) => self.spend(budget),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(
                    dir = %dir.display(),
                    pending = self.buffer.len(),
                    error = %e,
                    "Flush failed, keeping buffered entries"
                );
            }
        }
    }

    /// Counts a written segment against `budget`. The lock is given up once
    /// nothing more may be written.
    fn spend(&mut self, budget: &mut usize) {
        *budget = budget.saturating_sub(1);
        if *budget > 0 {
            return;
        }
        match self.lock.release() {
            Ok(()) => tracing::debug!(path = %self.lock.path().display(), "Segment budget spent, lock released"),
            Err(e) => tracing::warn!(path = %self.lock.path().display(), error = %e, "Failed to release writer lock"),
        }
    }

    /// Stretches a cataloged neighbour over a line this instance will not
    /// buffer. Best effort.
    fn extend_adjacent(&self, start: u64, end: u64) {
        let result = self.catalog.lock().map_err(Error::from).and_then(|mut catalog| {
            catalog.reload()?;
            if catalog.extend_adjacent(start, end) {
                catalog.persist()?;
                tracing::debug!(start, end, "Extended covered range over empty line");
            }
            Ok(())
        });
        if let Err(e) = result {
            tracing::warn!(start, end, error = %e, "Could not extend covered range");
        }
    }
}

/// Segmented index over one source file. See the [module docs](self).
pub struct Index<K: IndexKey, F: Flavor> {
    config: IndexConfig,
    dir: PathBuf,
    extractor: Box<dyn KeyExtractor<K>>,
    default_ranges: RangeSet<K>,
    state: Option<OpenState<K, F::Value>>,
    remaining_partials: usize,
    _flavor: PhantomData<F>,
}

impl<K: IndexKey, F: Flavor> Index<K, F> {
    /// Creates a closed index. Prefer [`IndexBuilder`].
    pub fn new(
        config: IndexConfig,
        extractor: Box<dyn KeyExtractor<K>>,
        default_ranges: RangeSet<K>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            dir: config.index_dir(),
            remaining_partials: config.max_partials,
            config,
            extractor,
            default_ranges,
            state: None,
            _flavor: PhantomData,
        })
    }

    /// Loads the catalog, creating the index directory if needed. Opening an
    /// open index does nothing.
    pub fn open(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }

        fs::create_dir_all(&self.dir)?;
        let catalog = Catalog::load_or_create(&self.dir)?;
        tracing::debug!(dir = %self.dir.display(), segments = catalog.len(), "Index opened");

        self.state = Some(OpenState {
            catalog: Arc::new(Mutex::new(catalog)),
            buffer: WriteBuffer::new(self.config.cache_size),
            lock: WriterLock::new(&self.dir),
        });
        Ok(())
    }

    /// Flushes pending entries, releases the writer lock and closes. Entries
    /// that fail to flush here are lost; earlier segments are unaffected.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };

        match state.flush(&self.dir, self.extractor.id(), &self.config) {
            Ok(true) => self.remaining_partials = self.remaining_partials.saturating_sub(1),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(
                    dir = %self.dir.display(),
                    dropped = state.buffer.len(),
                    error = %e,
                    "Flush on close failed"
                );
            }
        }
        state.lock.release()?;
        tracing::info!(dir = %self.dir.display(), "Index closed");
        Ok(())
    }

    /// Close followed by open: persists everything pending and picks up the
    /// catalog as it is on disk.
    pub fn sync(&mut self) -> Result<()> {
        self.close()?;
        self.open()
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Writes pending entries as a segment now, returning any failure.
    pub fn flush(&mut self) -> Result<()> {
        let state = self.state.as_mut().ok_or(Error::NotOpen)?;
        if state.flush(&self.dir, self.extractor.id(), &self.config)? {
            state.spend(&mut self.remaining_partials);
        }
        Ok(())
    }

    /// Indexes the line spanning byte offsets `[start, end]` of the source and
    /// returns whether its key falls in the default ranges.
    ///
    /// Only the lock owner buffers anything. Other instances, instances that
    /// have written their `max_partials` segments, and lines already covered
    /// by a segment just get the answer. A line whose key cannot be extracted
    /// answers `true`. Empty lines answer `false` and are folded into the
    /// pending range, or else into an adjacent cataloged segment. Start
    /// offsets must increase across calls.
    pub fn add_line(&mut self, line: &str, start: u64, end: u64) -> Result<bool> {
        let state = self.state.as_mut().ok_or(Error::NotOpen)?;

        if line.is_empty() {
            if state.lock.is_owned() {
                state.buffer.cover(start, end);
            } else {
                state.extend_adjacent(start, end);
            }
            return Ok(false);
        }

        let key = self.extractor.extract(line);
        let matches = match &key {
            Ok(key) => self.default_ranges.is_empty() || self.default_ranges.contains(key),
            Err(_) => true,
        };

        if self.remaining_partials == 0
            || state.lock.is_held_elsewhere()
            || state.catalog.lock()?.covers(start)
        {
            return Ok(matches);
        }
        match state.lock.acquire() {
            Ok(true) => {}
            Ok(false) => return Ok(matches),
            Err(e) => {
                tracing::warn!(path = %state.lock.path().display(), error = %e, "Could not take writer lock");
                return Ok(matches);
            }
        }

        if let Some(pending_end) = state.buffer.end() {
            if start <= pending_end {
                return Err(Error::InvalidOperation(format!(
                    "line at {} is not after the last buffered line ending at {}",
                    start, pending_end
                )));
            }
        }

        if state.buffer.is_full() {
            state.flush_full(&mut self.remaining_partials, &self.dir, self.extractor.id(), &self.config);
            if self.remaining_partials == 0 {
                return Ok(matches);
            }
        }

        match key {
            Ok(key) => {
                state.buffer.add(key, F::value_for(line, start), start, end);
            }
            Err(e) => {
                tracing::warn!(start, error = %e, "Key extraction failed, treating line as a match");
                state.buffer.cover(start, end);
            }
        }

        if state.buffer.is_full() {
            state.flush_full(&mut self.remaining_partials, &self.dir, self.extractor.id(), &self.config);
        }
        Ok(matches)
    }

    /// [`Index::add_line`] for a line known only by its start offset.
    pub fn add_line_at(&mut self, line: &str, pos: u64) -> Result<bool> {
        self.add_line(line, pos, pos)
    }

    /// Values of all segments, restricted to the default ranges if any are
    /// configured.
    pub fn iter(&self) -> Result<RangeIterator<K, F::Value>> {
        let ranges = (!self.default_ranges.is_empty()).then(|| self.default_ranges.clone());
        self.range_iter(ranges)
    }

    /// Values of all segments, unfiltered.
    pub fn iter_all(&self) -> Result<RangeIterator<K, F::Value>> {
        self.range_iter(None)
    }

    /// Values of all segments whose keys fall in any of `ranges`.
    pub fn iter_ranges(
        &self,
        ranges: impl IntoIterator<Item = KeyRange<K>>,
    ) -> Result<RangeIterator<K, F::Value>> {
        self.range_iter(Some(RangeSet::merge(ranges)))
    }

    fn range_iter(&self, ranges: Option<RangeSet<K>>) -> Result<RangeIterator<K, F::Value>> {
        let state = self.state.as_ref().ok_or(Error::NotOpen)?;
        RangeIterator::new(
            self.dir.clone(),
            Arc::clone(&state.catalog),
            ranges,
            self.config.max_iterator_errors,
        )
    }

    /// Highest source offset covered by a segment, 0 if none.
    pub fn max_pos(&self) -> Result<u64> {
        Ok(self.catalog()?.lock()?.max_pos())
    }

    /// End offset of the segment covering `pos`, or -1.
    pub fn partial_end_for_pos(&self, pos: u64) -> Result<i64> {
        Ok(self.catalog()?.lock()?.partial_end_for_pos(pos))
    }

    /// Source byte ranges covered by segments, sorted by start. With bounds
    /// `(min, max)` only segments starting in `[min, max)` are included.
    pub fn covered_ranges(&self, bounds: Option<(u64, u64)>) -> Result<Vec<(u64, u64)>> {
        Ok(self.catalog()?.lock()?.to_ranges(bounds))
    }

    fn catalog(&self) -> Result<&Arc<Mutex<Catalog>>> {
        self.state
            .as_ref()
            .map(|state| &state.catalog)
            .ok_or(Error::NotOpen)
    }

    pub fn default_ranges(&self) -> &RangeSet<K> {
        &self.default_ranges
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn index_dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(crate::lock::LOCK_FILE)
    }
}

impl<K: IndexKey> Index<K, Secondary> {
    /// Source lines of [`Index::iter`], read back through their offsets.
    pub fn lines(&self) -> Result<Lines<K>> {
        Ok(Lines {
            offsets: self.iter()?,
            source: SourceReader::open(&self.config.source_path)?,
        })
    }

    /// Source lines whose keys fall in any of `ranges`.
    pub fn lines_in(&self, ranges: impl IntoIterator<Item = KeyRange<K>>) -> Result<Lines<K>> {
        Ok(Lines {
            offsets: self.iter_ranges(ranges)?,
            source: SourceReader::open(&self.config.source_path)?,
        })
    }
}

impl<K: IndexKey, F: Flavor> Drop for Index<K, F> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to close index on drop");
        }
    }
}

/// Source lines of a secondary index, in the order its offsets are iterated.
pub struct Lines<K> {
    offsets: RangeIterator<K, u64>,
    source: SourceReader,
}

impl<K: IndexKey> Iterator for Lines<K> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offsets.next()?;
        Some(self.source.line_at(offset).and_then(|line| {
            line.ok_or_else(|| {
                Error::Corruption(format!(
                    "offset {} is past the end of {}",
                    offset,
                    self.source.path().display()
                ))
            })
        }))
    }
}
