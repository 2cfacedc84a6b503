use super::{build_index, Flavor, Index, IndexKey, LineIndex};
use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::extractor::KeyExtractor;
use crate::range::{KeyRange, RangeSet};

/// Assembles an index from a configuration, a key extractor and optional
/// default ranges. Everything is validated when building.
///
/// ```no_run
/// use lineidx::{IndexBuilder, IndexConfig, IntegerCsvExtractor, Primary};
///
/// let config = IndexConfig::new("/var/lib/lineidx", "/data/people.csv");
/// let mut index = IndexBuilder::new(config)
///     .extractor(IntegerCsvExtractor::new(0, ","))
///     .default_range(0, 10)
///     .build::<Primary>()?;
/// index.open()?;
/// # Ok::<(), lineidx::Error>(())
/// ```
pub struct IndexBuilder<K> {
    config: IndexConfig,
    extractor: Option<Box<dyn KeyExtractor<K>>>,
    ranges: Vec<KeyRange<K>>,
}

impl<K: IndexKey> IndexBuilder<K> {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            extractor: None,
            ranges: Vec::new(),
        }
    }

    pub fn extractor(mut self, extractor: impl KeyExtractor<K> + 'static) -> Self {
        self.extractor = Some(Box::new(extractor));
        self
    }

    /// Adds a closed default range `[low, high]`.
    pub fn default_range(mut self, low: K, high: K) -> Self {
        self.ranges.push(KeyRange::new(low, high));
        self
    }

    pub fn default_ranges(mut self, ranges: impl IntoIterator<Item = KeyRange<K>>) -> Self {
        self.ranges.extend(ranges);
        self
    }

    /// Builds a closed index of flavor `F`, ignoring `config.kind`.
    pub fn build<F: Flavor>(self) -> Result<Index<K, F>> {
        let (config, extractor, ranges) = self.into_parts()?;
        Index::new(config, extractor, ranges)
    }

    /// Builds a closed index of the flavor named by `config.kind`.
    pub fn build_dyn(self) -> Result<Box<dyn LineIndex>> {
        let kind = self.config.kind;
        let (config, extractor, ranges) = self.into_parts()?;
        build_index(kind, config, extractor, ranges)
    }

    fn into_parts(self) -> Result<(IndexConfig, Box<dyn KeyExtractor<K>>, RangeSet<K>)> {
        let extractor = self
            .extractor
            .ok_or_else(|| Error::Config("a key extractor is required".into()))?;
        self.config.validate()?;
        Ok((self.config, extractor, RangeSet::merge(self.ranges)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::IntegerCsvExtractor;
    use crate::index::{IndexKind, Primary, Secondary};
    use tempfile::TempDir;

    fn config(root: &TempDir) -> IndexConfig {
        IndexConfig::new(root.path(), "/data/people.csv")
    }

    #[test]
    fn test_missing_extractor() {
        let root = TempDir::new().expect("Failed to create temp dir");
        let result = IndexBuilder::<i64>::new(config(&root)).build::<Primary>();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("extractor")));
    }

    #[test]
    fn test_invalid_config() {
        let root = TempDir::new().expect("Failed to create temp dir");
        let result = IndexBuilder::new(config(&root).cache_size(0))
            .extractor(IntegerCsvExtractor::new(0, ","))
            .build::<Secondary>();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_default_ranges_merged() -> Result<()> {
        let root = TempDir::new().expect("Failed to create temp dir");
        let index = IndexBuilder::new(config(&root))
            .extractor(IntegerCsvExtractor::new(0, ","))
            .default_range(50, 55)
            .default_range(0, 10)
            .default_ranges(vec![KeyRange::new(5, 20)])
            .build::<Primary>()?;

        let bounds: Vec<(i64, i64)> = index.default_ranges().iter().map(|r| (r.low, r.high)).collect();
        assert_eq!(bounds, vec![(0, 20), (50, 55)]);
        assert!(!index.is_open());
        assert_eq!(index.index_dir(), root.path().join("data/people.csv"));
        Ok(())
    }

    #[test]
    fn test_build_dyn_uses_configured_kind() -> Result<()> {
        let root = TempDir::new().expect("Failed to create temp dir");
        let index = IndexBuilder::new(config(&root).kind(IndexKind::Primary))
            .extractor(IntegerCsvExtractor::new(0, ","))
            .build_dyn()?;
        assert_eq!(index.kind(), IndexKind::Primary);
        Ok(())
    }
}
