//! Closed key intervals and merged interval sets.

use itertools::Itertools as _;

/// Closed interval `[low, high]` over a key type. An interval with
/// `low > high` contains nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange<K> {
    pub low: K,
    pub high: K,
}

impl<K: Ord> KeyRange<K> {
    pub fn new(low: K, high: K) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.low <= *key && *key <= self.high
    }

    pub fn is_empty(&self) -> bool {
        self.low > self.high
    }
}

/// Sorted, non-overlapping set of closed intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSet<K> {
    ranges: Vec<KeyRange<K>>,
}

impl<K> Default for RangeSet<K> {
    fn default() -> Self {
        Self { ranges: Vec::new() }
    }
}

impl<K: Ord> RangeSet<K> {
    /// Merges arbitrary intervals into the minimal sorted set covering the same
    /// keys. Intervals that share at least one key are combined; empty ones
    /// are dropped.
    pub fn merge(ranges: impl IntoIterator<Item = KeyRange<K>>) -> Self {
        let mut ranges: Vec<KeyRange<K>> = ranges.into_iter().filter(|r| !r.is_empty()).collect();
        ranges.sort_by(|a, b| a.low.cmp(&b.low));

        let ranges = ranges
            .into_iter()
            .coalesce(|prev, next| {
                if next.low <= prev.high {
                    let high = if next.high > prev.high { next.high } else { prev.high };
                    Ok(KeyRange::new(prev.low, high))
                } else {
                    Err((prev, next))
                }
            })
            .collect();

        Self { ranges }
    }

    pub fn contains(&self, key: &K) -> bool {
        // first range whose upper bound is not below the key
        let idx = self.ranges.partition_point(|r| r.high < *key);
        self.ranges.get(idx).is_some_and(|r| r.low <= *key)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn as_slice(&self) -> &[KeyRange<K>] {
        &self.ranges
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyRange<K>> {
        self.ranges.iter()
    }
}

impl<K: Ord> FromIterator<KeyRange<K>> for RangeSet<K> {
    fn from_iter<I: IntoIterator<Item = KeyRange<K>>>(iter: I) -> Self {
        Self::merge(iter)
    }
}

impl<'a, K> IntoIterator for &'a RangeSet<K> {
    type Item = &'a KeyRange<K>;
    type IntoIter = std::slice::Iter<'a, KeyRange<K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}
