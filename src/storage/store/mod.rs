//! Record accessors and the in-memory record stores behind them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::storage::metrics::StorageMetrics;
use crate::storage::record::{Record, RecordLoad};
use crate::types::{Result, StoreError};

mod graph;

pub use graph::GraphStore;

/// Read access to one record store.
///
/// Loads are lock-free snapshot reads into a caller-owned buffer; nothing
/// handed out by an accessor aliases the stored record.
pub trait RecordAccessor<R: Record>: Send + Sync {
    /// Store name used in errors.
    fn store_name(&self) -> &'static str {
        R::STORE
    }

    /// One past the highest id ever allocated.
    fn high_id(&self) -> u64;

    /// Loads record `id` into `record`.
    fn read_record(&self, id: u64, record: &mut R, mode: RecordLoad) -> Result<()>;

    /// Opens a page-level read handle held by a cursor for its lifetime.
    fn open_read_handle(&self) -> ReadHandle;
}

/// Page-level read handle. Dropping it releases the underlying resources.
#[derive(Debug)]
pub struct ReadHandle {
    open: Arc<AtomicUsize>,
}

impl ReadHandle {
    fn new(open: &Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::AcqRel);
        Self {
            open: Arc::clone(open),
        }
    }
}

impl Drop for ReadHandle {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::AcqRel);
    }
}

/// In-memory record store with monotonically allocated, never reused ids.
pub struct MemRecordStore<R: Record> {
    records: RwLock<Vec<R>>,
    open_handles: Arc<AtomicUsize>,
    metrics: Arc<dyn StorageMetrics>,
}

impl<R: Record> MemRecordStore<R> {
    /// Creates an empty store.
    pub fn new(metrics: Arc<dyn StorageMetrics>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            open_handles: Arc::new(AtomicUsize::new(0)),
            metrics,
        }
    }

    /// Allocates the next id and stores the record produced by `build`.
    pub fn allocate(&self, build: impl FnOnce(u64) -> R) -> u64 {
        let mut records = self.records.write();
        let id = records.len() as u64;
        records.push(build(id));
        id
    }

    /// Overwrites an allocated record.
    pub fn update(&self, record: R) -> Result<()> {
        let id = record.raw_id();
        let mut records = self.records.write();
        let slot = records
            .get_mut(id as usize)
            .ok_or(StoreError::InvalidRecordId { store: R::STORE, id })?;
        *slot = record;
        Ok(())
    }

    /// Returns a copy of an in-use record.
    pub fn get(&self, id: u64) -> Result<R> {
        let records = self.records.read();
        match records.get(id as usize) {
            Some(record) if record.in_use() => Ok(record.clone()),
            Some(_) => Err(StoreError::NotFound { store: R::STORE, id }),
            None => Err(StoreError::InvalidRecordId { store: R::STORE, id }),
        }
    }

    /// Marks a record deleted, keeping every other field as it was.
    pub fn mark_unused(&self, id: u64) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(id as usize)
            .ok_or(StoreError::InvalidRecordId { store: R::STORE, id })?;
        record.mark_unused();
        Ok(())
    }

    /// Number of read handles currently open against this store.
    pub fn open_read_handles(&self) -> usize {
        self.open_handles.load(Ordering::Acquire)
    }
}

impl<R: Record> RecordAccessor<R> for MemRecordStore<R> {
    fn high_id(&self) -> u64 {
        self.records.read().len() as u64
    }

    fn read_record(&self, id: u64, record: &mut R, mode: RecordLoad) -> Result<()> {
        self.metrics.record_read(R::STORE);
        let records = self.records.read();
        match records.get(id as usize) {
            Some(stored) => {
                record.clone_from(stored);
                Ok(())
            }
            None => match mode {
                RecordLoad::Check => Err(StoreError::InvalidRecordId { store: R::STORE, id }),
                RecordLoad::Force => {
                    *record = R::new_unused(id);
                    Ok(())
                }
            },
        }
    }

    fn open_read_handle(&self) -> ReadHandle {
        ReadHandle::new(&self.open_handles)
    }
}
