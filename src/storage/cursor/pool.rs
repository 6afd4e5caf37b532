use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::storage::metrics::StorageMetrics;

/// Cursor lifecycle hooks used by [`CursorPool`].
pub trait Poolable: Send {
    /// Returns the cursor to a reusable state. Read handles stay open.
    fn close(&mut self);

    /// Releases the cursor's read handles. The cursor is unusable afterwards.
    fn dispose(&mut self);
}

/// Snapshot of a pool's occupancy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PoolStatus {
    /// Maximum number of idle cursors retained.
    pub capacity: usize,
    /// Idle cursors currently held.
    pub available: usize,
}

/// Recycles cursors so repeated traversals do not reopen read handles.
///
/// Cursors come back to the pool when their [`PooledCursor`] is closed or
/// dropped. Returns beyond `capacity` are disposed; a pool with capacity 0
/// retains nothing.
pub struct CursorPool<C: Poolable> {
    factory: Box<dyn Fn() -> C + Send + Sync>,
    metrics: Arc<dyn StorageMetrics>,
    inner: Mutex<Vec<C>>,
    capacity: usize,
}

impl<C: Poolable> CursorPool<C> {
    /// Creates an empty pool that builds cursors with `factory`.
    pub fn new(
        capacity: usize,
        metrics: Arc<dyn StorageMetrics>,
        factory: impl Fn() -> C + Send + Sync + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            metrics,
            inner: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Hands out an idle cursor, constructing one when none is available.
    pub fn acquire(&self) -> PooledCursor<'_, C> {
        let recycled = self.inner.lock().pop();
        let cursor = match recycled {
            Some(cursor) => {
                self.metrics.cursor_pool_hit();
                cursor
            }
            None => {
                self.metrics.cursor_pool_miss();
                debug!(capacity = self.capacity, "pool.miss");
                (self.factory)()
            }
        };
        PooledCursor {
            pool: self,
            cursor: Some(cursor),
        }
    }

    fn release(&self, mut cursor: C) {
        cursor.close();
        let mut pool = self.inner.lock();
        if pool.len() >= self.capacity {
            drop(pool);
            cursor.dispose();
            return;
        }
        pool.push(cursor);
    }

    /// Disposes every idle cursor.
    pub fn dispose_all(&self) {
        let idle = std::mem::take(&mut *self.inner.lock());
        let count = idle.len();
        for mut cursor in idle {
            cursor.dispose();
        }
        debug!(count, "pool.dispose");
    }

    /// Reports capacity and idle cursors.
    pub fn status(&self) -> PoolStatus {
        let pool = self.inner.lock();
        PoolStatus {
            capacity: self.capacity,
            available: pool.len(),
        }
    }
}

/// Cursor leased from a [`CursorPool`].
pub struct PooledCursor<'a, C: Poolable> {
    pool: &'a CursorPool<C>,
    cursor: Option<C>,
}

impl<'a, C: Poolable> PooledCursor<'a, C> {
    /// Closes the cursor and returns it to its pool.
    pub fn close(self) {}

    /// Takes the cursor out of the pool's management. The caller becomes
    /// responsible for disposing it.
    pub fn detach(mut self) -> C {
        self.cursor.take().expect("cursor present")
    }
}

impl<'a, C: Poolable> std::ops::Deref for PooledCursor<'a, C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        self.cursor.as_ref().expect("cursor present")
    }
}

impl<'a, C: Poolable> std::ops::DerefMut for PooledCursor<'a, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cursor.as_mut().expect("cursor present")
    }
}

impl<'a, C: Poolable> Drop for PooledCursor<'a, C> {
    fn drop(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            self.pool.release(cursor);
        }
    }
}
