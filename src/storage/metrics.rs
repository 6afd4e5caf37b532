use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking record reads, scan claims and cursor reuse.
///
/// Implementations are shared by every cursor and progression created from a
/// [`super::GraphStore`], so they must be cheap and thread-safe.
pub trait StorageMetrics: Send + Sync {
    /// Records a single record load.
    ///
    /// # Parameters
    /// * `store` - The store name: "node", "relationship" or "relationship_group".
    fn record_read(&self, store: &'static str);

    /// Records a not-in-use record passed over during a chain walk or scan.
    fn unused_record_skipped(&self);

    /// Records a batch claimed from a scan progression.
    fn batch_claimed(&self);

    /// Records a cursor served from a pool's free list.
    fn cursor_pool_hit(&self);

    /// Records a cursor that had to be constructed because the pool was empty.
    fn cursor_pool_miss(&self);
}

/// A no-op implementation of [`StorageMetrics`] that discards everything.
#[derive(Default)]
pub struct NoopMetrics;

impl StorageMetrics for NoopMetrics {
    fn record_read(&self, _store: &'static str) {}
    fn unused_record_skipped(&self) {}
    fn batch_claimed(&self) {}
    fn cursor_pool_hit(&self) {}
    fn cursor_pool_miss(&self) {}
}

/// Atomic counter implementation of [`StorageMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Node records loaded.
    pub node_reads: AtomicU64,

    /// Relationship records loaded.
    pub relationship_reads: AtomicU64,

    /// Relationship group records loaded.
    pub group_reads: AtomicU64,

    /// Unused records skipped.
    pub unused_skipped: AtomicU64,

    /// Batches claimed from progressions.
    pub batches_claimed: AtomicU64,

    /// Pool acquisitions served by a recycled cursor.
    pub pool_hits: AtomicU64,

    /// Pool acquisitions that built a new cursor.
    pub pool_misses: AtomicU64,
}

impl CounterMetrics {
    /// Reads a counter with relaxed ordering.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

impl StorageMetrics for CounterMetrics {
    fn record_read(&self, store: &'static str) {
        match store {
            "node" => {
                self.node_reads.fetch_add(1, Ordering::Relaxed);
            }
            "relationship" => {
                self.relationship_reads.fetch_add(1, Ordering::Relaxed);
            }
            "relationship_group" => {
                self.group_reads.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn unused_record_skipped(&self) {
        self.unused_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn batch_claimed(&self) {
        self.batches_claimed.fetch_add(1, Ordering::Relaxed);
    }

    fn cursor_pool_hit(&self) {
        self.pool_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn cursor_pool_miss(&self) {
        self.pool_misses.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation, a shared [`NoopMetrics`].
pub fn default_metrics() -> Arc<dyn StorageMetrics> {
    Arc::new(NoopMetrics)
}
