//! In-memory batch of entries waiting to become a segment.

/// Bounded batch of extracted entries plus the byte range of source lines it
/// covers.
///
/// Flushing is two-phase: [`WriteBuffer::seal`] freezes and sorts the batch,
/// then the caller either [`reset`](WriteBuffer::reset)s it after the segment
/// is durable or [`unseal`](WriteBuffer::unseal)s it to retry later. While
/// sealed, additions are ignored.
#[derive(Debug)]
pub struct WriteBuffer<K, V> {
    entries: Vec<(K, V)>,
    capacity: usize,
    start: Option<u64>,
    end: Option<u64>,
    sealed: bool,
}

impl<K: Ord, V> WriteBuffer<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.min(4096)),
            capacity,
            start: None,
            end: None,
            sealed: false,
        }
    }

    /// Buffers an entry for the line spanning `[start, end]`. Returns false
    /// if the buffer is sealed.
    pub fn add(&mut self, key: K, value: V, start: u64, end: u64) -> bool {
        if self.sealed {
            return false;
        }
        self.entries.push((key, value));
        self.cover(start, end);
        true
    }

    /// Extends the covered range without buffering an entry, for lines that
    /// produced no key.
    pub fn cover(&mut self, start: u64, end: u64) -> bool {
        if self.sealed {
            return false;
        }
        self.start = Some(self.start.map_or(start, |s| s.min(start)));
        self.end = Some(self.end.map_or(end, |e| e.max(end)));
        true
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any line has been recorded since the last reset, with or
    /// without a key.
    pub fn has_pending(&self) -> bool {
        self.start.is_some()
    }

    pub fn start(&self) -> Option<u64> {
        self.start
    }

    pub fn end(&self) -> Option<u64> {
        self.end
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Freezes the buffer and sorts it by key, keeping insertion order among
    /// equal keys. Returns the covered `(start, end)` range, or `None` when
    /// nothing is pending.
    pub fn seal(&mut self) -> Option<(u64, u64)> {
        let range = self.start.zip(self.end)?;
        self.sealed = true;
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        Some(range)
    }

    /// Sorted entries of a sealed buffer.
    pub fn entries(&self) -> &[(K, V)] {
        &self.entries
    }

    /// Accepts additions again after a failed flush, keeping the contents.
    pub fn unseal(&mut self) {
        self.sealed = false;
    }

    /// Empties the buffer after a successful flush.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.start = None;
        self.end = None;
        self.sealed = false;
    }
}
