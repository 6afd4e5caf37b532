//! Work distribution for store scans.
//!
//! A progression hands out disjoint id ranges ("batches") to the cursors
//! sharing it. Every id in `[0, high_id)` captured at creation is handed out
//! exactly once, and once a progression reports exhaustion it stays exhausted.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::storage::metrics::StorageMetrics;
use crate::storage::record::Record;
use crate::storage::store::RecordAccessor;

/// Half-open id range `[start, end)` claimed by one scan cursor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScanBatch {
    /// First id in the batch.
    pub start: u64,
    /// One past the last id in the batch.
    pub end: u64,
}

impl ScanBatch {
    /// Number of ids in the batch.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the batch holds no ids.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether `id` falls inside the batch.
    pub fn contains(&self, id: u64) -> bool {
        self.start <= id && id < self.end
    }

    /// Ids of the batch in ascending order.
    pub fn ids(&self) -> Range<u64> {
        self.start..self.end
    }
}

/// How a progression distributes its id space.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressionMode {
    /// One batch covering the whole store.
    Sequential,
    /// Fixed-size batches claimed concurrently.
    Parallel,
}

/// Source of scan batches shared by one or more scan cursors.
pub trait Progression: Send + Sync {
    /// Claims the next unclaimed batch, or `None` once the id space is exhausted.
    fn next_batch(&self) -> Option<ScanBatch>;

    /// Returns true for exactly one caller: the cursor that appends the
    /// transaction's added entities after its committed records.
    fn append_added(&self) -> bool;

    /// Distribution mode of this progression.
    fn mode(&self) -> ProgressionMode;
}

/// Single-batch progression for one cursor walking the whole store.
pub struct SequentialProgression {
    high_id: u64,
    claimed: AtomicBool,
    appended: AtomicBool,
    metrics: Arc<dyn StorageMetrics>,
}

impl SequentialProgression {
    /// Covers `[0, high_id)` in one batch.
    pub fn new(high_id: u64, metrics: Arc<dyn StorageMetrics>) -> Self {
        Self {
            high_id,
            claimed: AtomicBool::new(false),
            appended: AtomicBool::new(false),
            metrics,
        }
    }
}

impl Progression for SequentialProgression {
    fn next_batch(&self) -> Option<ScanBatch> {
        if self.claimed.swap(true, Ordering::AcqRel) || self.high_id == 0 {
            return None;
        }
        self.metrics.batch_claimed();
        trace!(start = 0, end = self.high_id, "scan.batch.claimed");
        Some(ScanBatch {
            start: 0,
            end: self.high_id,
        })
    }

    fn append_added(&self) -> bool {
        !self.appended.swap(true, Ordering::AcqRel)
    }

    fn mode(&self) -> ProgressionMode {
        ProgressionMode::Sequential
    }
}

/// Progression claimed concurrently by several scan cursors.
///
/// The claim counter only moves forward and is clamped at `high_id`.
pub struct ParallelProgression {
    high_id: u64,
    batch_size: u64,
    next: AtomicU64,
    appended: AtomicBool,
    metrics: Arc<dyn StorageMetrics>,
}

impl ParallelProgression {
    /// Covers `[0, high_id)` in batches of `batch_size` ids.
    pub fn new(high_id: u64, batch_size: u64, metrics: Arc<dyn StorageMetrics>) -> Self {
        Self {
            high_id,
            batch_size: batch_size.max(1),
            next: AtomicU64::new(0),
            appended: AtomicBool::new(false),
            metrics,
        }
    }

    /// Ids handed out per claim.
    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }
}

impl Progression for ParallelProgression {
    fn next_batch(&self) -> Option<ScanBatch> {
        let high_id = self.high_id;
        let batch_size = self.batch_size;
        let start = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < high_id).then(|| current.saturating_add(batch_size).min(high_id))
            })
            .ok()?;
        let end = start.saturating_add(batch_size).min(high_id);
        self.metrics.batch_claimed();
        trace!(start, end, "scan.batch.claimed");
        Some(ScanBatch { start, end })
    }

    fn append_added(&self) -> bool {
        !self.appended.swap(true, Ordering::AcqRel)
    }

    fn mode(&self) -> ProgressionMode {
        ProgressionMode::Parallel
    }
}

/// Builds progressions over a store, capturing its high id at creation.
#[derive(Clone)]
pub struct ProgressionFactory {
    batch_size: u64,
    metrics: Arc<dyn StorageMetrics>,
}

impl ProgressionFactory {
    /// Creates a factory handing out parallel batches of `batch_size` ids.
    pub fn new(batch_size: u64, metrics: Arc<dyn StorageMetrics>) -> Self {
        Self {
            batch_size,
            metrics,
        }
    }

    /// Single-cursor scan over `store`.
    pub fn all_scan<R: Record>(&self, store: &dyn RecordAccessor<R>) -> Arc<dyn Progression> {
        Arc::new(SequentialProgression::new(
            store.high_id(),
            Arc::clone(&self.metrics),
        ))
    }

    /// Scan over `store` shared by several cursors.
    pub fn parallel_all_scan<R: Record>(
        &self,
        store: &dyn RecordAccessor<R>,
    ) -> Arc<dyn Progression> {
        Arc::new(ParallelProgression::new(
            store.high_id(),
            self.batch_size,
            Arc::clone(&self.metrics),
        ))
    }
}
