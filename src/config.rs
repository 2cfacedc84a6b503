use crate::error::{Error, Result};
use crate::index::IndexKind;
use std::path::{Component, Path, PathBuf};

/// Flush thresholds below this work, but produce many tiny segments.
pub const RECOMMENDED_MIN_CACHE_SIZE: usize = 100;

/// Configuration for an index over one source file
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Directory under which all index directories live. Must exist.
    pub index_root: PathBuf,

    /// Absolute path of the indexed source file, without any URI scheme
    pub source_path: PathBuf,

    /// Buffered entries per segment (default: 1000)
    pub cache_size: usize,

    /// Maximum keys per tree leaf (default: 64)
    pub leaf_capacity: usize,

    /// Maximum separator keys per inner tree node (default: 64)
    pub inner_capacity: usize,

    /// Corrupt segments an iterator evicts before giving up (default: 5)
    pub max_iterator_errors: usize,

    /// Segments one index instance may write before it stops buffering and
    /// only answers the range predicate (default: 1). 0 never writes.
    pub max_partials: usize,

    /// Which index flavor the registry builds (default: secondary)
    pub kind: IndexKind,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_root: PathBuf::from("./index"),
            source_path: PathBuf::new(),
            cache_size: 1000,
            leaf_capacity: 64,
            inner_capacity: 64,
            max_iterator_errors: 5,
            max_partials: 1,
            kind: IndexKind::Secondary,
        }
    }
}

impl IndexConfig {
    /// Create a new config for `source` with indexes stored under `index_root`
    pub fn new(index_root: impl Into<PathBuf>, source: impl AsRef<str>) -> Self {
        Self {
            index_root: index_root.into(),
            source_path: normalize_source(source.as_ref()),
            ..Default::default()
        }
    }

    /// Set the source file. `file:` and `hdfs://host` prefixes are stripped.
    pub fn source_path(mut self, source: impl AsRef<str>) -> Self {
        self.source_path = normalize_source(source.as_ref());
        self
    }

    /// Set the number of buffered entries per segment
    pub fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    /// Set the maximum keys per leaf
    pub fn leaf_capacity(mut self, capacity: usize) -> Self {
        self.leaf_capacity = capacity;
        self
    }

    /// Set the maximum separators per inner node
    pub fn inner_capacity(mut self, capacity: usize) -> Self {
        self.inner_capacity = capacity;
        self
    }

    /// Set how many corrupt segments an iterator tolerates
    pub fn max_iterator_errors(mut self, max: usize) -> Self {
        self.max_iterator_errors = max;
        self
    }

    /// Set how many segments an instance writes
    pub fn max_partials(mut self, max: usize) -> Self {
        self.max_partials = max;
        self
    }

    /// Set the index flavor
    pub fn kind(mut self, kind: IndexKind) -> Self {
        self.kind = kind;
        self
    }

    /// Directory holding this source's catalog, lock and segments: the
    /// source path mirrored under the index root.
    pub fn index_dir(&self) -> PathBuf {
        let relative: PathBuf = self
            .source_path
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        self.index_root.join(relative)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.index_root.is_dir() {
            return Err(Error::Config(format!(
                "index root {} does not exist or is not a directory",
                self.index_root.display()
            )));
        }
        if !self.source_path.is_absolute() {
            return Err(Error::Config(format!(
                "source path {:?} must be absolute",
                self.source_path
            )));
        }
        if self.cache_size == 0 {
            return Err(Error::Config("cache size must be at least 1".into()));
        }
        if self.cache_size < RECOMMENDED_MIN_CACHE_SIZE {
            tracing::warn!(
                cache_size = self.cache_size,
                recommended = RECOMMENDED_MIN_CACHE_SIZE,
                "Small cache size, segments will be tiny"
            );
        }
        if self.leaf_capacity == 0 {
            return Err(Error::Config("leaf capacity must be greater than 0".into()));
        }
        if self.inner_capacity <= 2 {
            return Err(Error::Config("inner capacity must be greater than 2".into()));
        }
        if self.max_iterator_errors == 0 {
            return Err(Error::Config("max iterator errors must be at least 1".into()));
        }
        Ok(())
    }
}

fn normalize_source(source: &str) -> PathBuf {
    let path = if let Some(rest) = source.strip_prefix("hdfs://") {
        // drop the authority, keep the absolute path
        rest.find('/').map_or("", |idx| &rest[idx..])
    } else if let Some(rest) = source.strip_prefix("file://") {
        rest
    } else if let Some(rest) = source.strip_prefix("file:") {
        rest
    } else {
        source
    };
    Path::new(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = IndexConfig::default();
        assert_eq!(config.cache_size, 1000);
        assert_eq!(config.leaf_capacity, 64);
        assert_eq!(config.inner_capacity, 64);
        assert_eq!(config.max_iterator_errors, 5);
        assert_eq!(config.max_partials, 1);
        assert_eq!(config.kind, IndexKind::Secondary);
    }

    #[test]
    fn test_config_builder() {
        let config = IndexConfig::new("/tmp/indexes", "/data/people.csv")
            .cache_size(2)
            .leaf_capacity(1)
            .inner_capacity(3)
            .max_iterator_errors(1)
            .max_partials(0)
            .kind(IndexKind::Primary);

        assert_eq!(config.index_root, PathBuf::from("/tmp/indexes"));
        assert_eq!(config.source_path, PathBuf::from("/data/people.csv"));
        assert_eq!(config.cache_size, 2);
        assert_eq!(config.leaf_capacity, 1);
        assert_eq!(config.inner_capacity, 3);
        assert_eq!(config.max_iterator_errors, 1);
        assert_eq!(config.max_partials, 0);
        assert_eq!(config.kind, IndexKind::Primary);
    }

    #[test]
    fn test_source_uri_prefixes() {
        let expected = PathBuf::from("/data/people.csv");
        for source in [
            "/data/people.csv",
            "file:/data/people.csv",
            "file:///data/people.csv",
            "hdfs://namenode:8020/data/people.csv",
        ] {
            assert_eq!(IndexConfig::default().source_path(source).source_path, expected, "{}", source);
        }
    }

    #[test]
    fn test_index_dir_mirrors_source() {
        let config = IndexConfig::new("/tmp/indexes", "hdfs://nn/data/people.csv");
        assert_eq!(config.index_dir(), PathBuf::from("/tmp/indexes/data/people.csv"));
    }

    #[test]
    fn test_validate() {
        let root = TempDir::new().expect("Failed to create temp dir");
        let valid = IndexConfig::new(root.path(), "/data/people.csv");
        assert!(valid.validate().is_ok());

        let invalid = [
            IndexConfig::new(root.path().join("missing"), "/data/people.csv"),
            IndexConfig::new(root.path(), "data/people.csv"),
            valid.clone().cache_size(0),
            valid.clone().leaf_capacity(0),
            valid.clone().inner_capacity(2),
            valid.clone().max_iterator_errors(0),
        ];
        for config in invalid {
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{:?}", config);
        }

        // Small caches and read-only instances are allowed
        assert!(valid.clone().max_partials(0).validate().is_ok());
        assert!(valid.cache_size(2).validate().is_ok());
    }
}
