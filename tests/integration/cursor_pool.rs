//! Cursor pool tests
//!
//! Covers reuse of pooled chain cursors, re-initialisation of a reused cursor,
//! read-handle lifetime across close and dispose, and per-worker pools.

#![allow(missing_docs)]

use std::sync::Arc;

use chainstore::storage::scan::run_workers;
use chainstore::storage::{
    CounterMetrics, EmptyTxState, GraphStore, PoolStatus, Poolable, StoreOptions,
};
use chainstore::types::{Direction, NodeId, RelId, Result, TypeFilter, TypeId};

fn star(store: &GraphStore, leaves: usize) -> Result<(NodeId, Vec<RelId>)> {
    let hub = store.create_node();
    let mut rels = Vec::with_capacity(leaves);
    for _ in 0..leaves {
        let leaf = store.create_node();
        rels.push(store.create_relationship(hub, leaf, TypeId(0))?);
    }
    rels.reverse();
    Ok((hub, rels))
}

#[test]
fn closed_cursor_is_handed_out_again() -> Result<()> {
    let metrics = Arc::new(CounterMetrics::default());
    let store = GraphStore::open(StoreOptions::new().metrics(metrics.clone()));
    let (hub, rels) = star(&store, 3)?;
    let pool = store.relationship_cursor_pool();

    for _ in 0..4 {
        let mut cursor = pool.acquire();
        cursor.init(store.node_source(hub)?, Direction::Both, TypeFilter::Any, EmptyTxState::shared())?;
        let mut seen = Vec::new();
        while cursor.next()? {
            seen.extend(cursor.get().map(|item| item.id));
        }
        assert_eq!(seen, rels);
        cursor.close();
    }
    assert_eq!(CounterMetrics::get(&metrics.pool_misses), 1);
    assert_eq!(CounterMetrics::get(&metrics.pool_hits), 3);
    assert_eq!(store.relationship_store().open_read_handles(), 1);
    Ok(())
}

#[test]
fn reinit_of_pooled_cursor_forgets_previous_node() -> Result<()> {
    let store = GraphStore::open(StoreOptions::new());
    let (first_hub, _) = star(&store, 4)?;
    let (second_hub, second_rels) = star(&store, 2)?;
    let pool = store.relationship_cursor_pool();

    let mut cursor = pool.acquire();
    cursor.init(store.node_source(first_hub)?, Direction::Both, TypeFilter::Any, EmptyTxState::shared())?;
    assert!(cursor.next()?);
    drop(cursor);

    let mut cursor = pool.acquire();
    assert!(cursor.get().is_none());
    cursor.init(store.node_source(second_hub)?, Direction::Outgoing, TypeFilter::Any, EmptyTxState::shared())?;
    let mut seen = Vec::new();
    while cursor.next()? {
        seen.extend(cursor.get().map(|item| item.id));
    }
    assert_eq!(seen, second_rels);
    Ok(())
}

#[test]
fn dispose_all_releases_read_handles() -> Result<()> {
    let store = GraphStore::open(StoreOptions::new().cursor_pool_capacity(2));
    let pool = store.relationship_cursor_pool();
    {
        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        assert_eq!(store.relationship_store().open_read_handles(), 3);
        assert_eq!(store.group_store().open_read_handles(), 3);
        drop((a, b, c));
    }
    // One return exceeded capacity and was disposed immediately.
    assert_eq!(
        pool.status(),
        PoolStatus {
            capacity: 2,
            available: 2
        }
    );
    assert_eq!(store.relationship_store().open_read_handles(), 2);

    pool.dispose_all();
    assert_eq!(pool.status().available, 0);
    assert_eq!(store.relationship_store().open_read_handles(), 0);
    assert_eq!(store.group_store().open_read_handles(), 0);
    Ok(())
}

#[test]
fn detached_cursor_is_disposed_by_caller() -> Result<()> {
    let store = GraphStore::open(StoreOptions::new());
    let (hub, rels) = star(&store, 1)?;
    let pool = store.relationship_cursor_pool();
    let mut cursor = pool.acquire().detach();
    cursor.init(store.node_source(hub)?, Direction::Both, TypeFilter::Any, EmptyTxState::shared())?;
    assert!(cursor.next()?);
    assert_eq!(cursor.get().map(|item| item.id), Some(rels[0]));
    cursor.dispose();
    assert_eq!(store.relationship_store().open_read_handles(), 0);
    assert_eq!(pool.status().available, 0);
    Ok(())
}

#[test]
fn iterator_cursor_pool_serves_id_sequences() -> Result<()> {
    let store = GraphStore::open(StoreOptions::new());
    let (_, rels) = star(&store, 5)?;
    let pool = store.iterator_cursor_pool();
    for window in rels.chunks(2) {
        let mut cursor = pool.acquire();
        cursor.init(window.iter().copied(), EmptyTxState::shared());
        let mut seen = Vec::new();
        while cursor.next()? {
            seen.extend(cursor.get().map(|item| item.id));
        }
        assert_eq!(seen, window);
    }
    assert_eq!(pool.status().available, 1);
    Ok(())
}

#[test]
fn per_worker_pools_walk_chains_concurrently() -> Result<()> {
    let store = GraphStore::open(StoreOptions::new().dense_node_threshold(10));
    let mut hubs = Vec::new();
    for leaves in [3, 12, 25, 7] {
        hubs.push(star(&store, leaves)?);
    }
    let store = &store;
    let degrees = run_workers(hubs, |(hub, rels)| {
        let pool = store.relationship_cursor_pool();
        let mut total = 0;
        for _ in 0..10 {
            let mut cursor = pool.acquire();
            cursor.init(store.node_source(hub)?, Direction::Outgoing, TypeFilter::Any, EmptyTxState::shared())?;
            let mut seen = 0;
            while cursor.next()? {
                seen += 1;
            }
            assert_eq!(seen, rels.len());
            total += seen;
        }
        pool.dispose_all();
        Ok(total / 10)
    })?;
    assert_eq!(degrees, vec![3, 12, 25, 7]);
    Ok(())
}
