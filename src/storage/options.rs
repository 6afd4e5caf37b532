use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::types::ConfigError;

use super::metrics::{default_metrics, StorageMetrics};

/// Default degree at which a sparse node is converted to relationship groups.
pub const DEFAULT_DENSE_NODE_THRESHOLD: usize = 50;
/// Default number of ids handed out per parallel scan claim.
pub const DEFAULT_SCAN_BATCH_SIZE: u64 = 128;
/// Default number of idle cursors a pool retains.
pub const DEFAULT_CURSOR_POOL_CAPACITY: usize = 16;

/// Configuration options supplied when creating a [`super::GraphStore`].
#[derive(Clone)]
pub struct StoreOptions {
    /// Relationship count at which a node switches to grouped chains.
    pub dense_node_threshold: usize,
    /// Ids per batch for parallel progressions.
    pub scan_batch_size: u64,
    /// Idle cursors retained per pool.
    pub cursor_pool_capacity: usize,
    /// Metrics sink shared by stores, cursors and progressions.
    pub metrics: Arc<dyn StorageMetrics>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self {
            dense_node_threshold: DEFAULT_DENSE_NODE_THRESHOLD,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            cursor_pool_capacity: DEFAULT_CURSOR_POOL_CAPACITY,
            metrics: default_metrics(),
        }
    }

    /// Sets the dense conversion threshold.
    pub fn dense_node_threshold(mut self, degree: usize) -> Self {
        self.dense_node_threshold = degree;
        self
    }

    /// Sets the parallel scan batch size.
    pub fn scan_batch_size(mut self, ids: u64) -> Self {
        self.scan_batch_size = ids;
        self
    }

    /// Sets the pool capacity.
    pub fn cursor_pool_capacity(mut self, capacity: usize) -> Self {
        self.cursor_pool_capacity = capacity;
        self
    }

    /// Sets the metrics implementation.
    pub fn metrics(mut self, metrics: Arc<dyn StorageMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Rejects zero thresholds, batch sizes and pool capacities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dense_node_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "dense_node_threshold",
                reason: "must be at least 1",
            });
        }
        if self.scan_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "scan_batch_size",
                reason: "must be at least 1",
            });
        }
        if self.cursor_pool_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "cursor_pool_capacity",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Parses options from TOML, falling back to defaults for missing keys.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawStoreOptions = toml::from_str(contents)?;
        raw.into_options()
    }

    /// Loads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStoreOptions {
    dense_node_threshold: Option<usize>,
    scan_batch_size: Option<u64>,
    cursor_pool_capacity: Option<usize>,
}

impl RawStoreOptions {
    fn into_options(self) -> Result<StoreOptions, ConfigError> {
        let mut opts = StoreOptions::new();
        if let Some(threshold) = self.dense_node_threshold {
            opts.dense_node_threshold = threshold;
        }
        if let Some(batch) = self.scan_batch_size {
            opts.scan_batch_size = batch;
        }
        if let Some(capacity) = self.cursor_pool_capacity {
            opts.cursor_pool_capacity = capacity;
        }
        opts.validate()?;
        Ok(opts)
    }
}
