//! Parallel scan tests
//!
//! Compares single-threaded and multi-threaded node scans over the same
//! transaction state: every worker count must visit exactly the visible ids,
//! each one by a single worker.

#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::sync::{Arc, Once};

use chainstore::storage::scan::run_workers;
use chainstore::storage::{
    CounterMetrics, EmptyTxState, GraphStore, ReadableTxState, StoreOptions, TxState,
};
use chainstore::types::{NodeId, RelId, Result, StoreError, TypeId};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

const NODE_COUNT: u64 = 1_000;
const TX_CREATED: u64 = 100;
const TX_DELETED: usize = 100;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("chainstore=info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

struct Fixture {
    store: GraphStore,
    tx: Arc<dyn ReadableTxState>,
    expected: BTreeSet<NodeId>,
}

fn fixture(batch_size: u64, seed: u64) -> Result<Fixture> {
    let store = GraphStore::open(StoreOptions::new().scan_batch_size(batch_size));
    for _ in 0..NODE_COUNT {
        store.create_node();
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut tx = TxState::new();
    let mut expected: BTreeSet<NodeId> = (0..NODE_COUNT).map(NodeId).collect();
    for id in NODE_COUNT..NODE_COUNT + TX_CREATED {
        tx.node_do_create(NodeId(id))?;
        expected.insert(NodeId(id));
    }
    for idx in sample(&mut rng, NODE_COUNT as usize, TX_DELETED).into_iter() {
        let node = NodeId(idx as u64);
        tx.node_do_delete(node);
        expected.remove(&node);
    }
    Ok(Fixture {
        store,
        tx: Arc::new(tx),
        expected,
    })
}

fn sequential_ids(store: &GraphStore, tx: Arc<dyn ReadableTxState>) -> Result<Vec<NodeId>> {
    let mut cursor = store.sequential_node_scan(tx);
    let mut ids = Vec::new();
    while cursor.next()? {
        ids.extend(cursor.get().map(|item| item.id));
    }
    Ok(ids)
}

fn assert_disjoint_union(per_worker: &[Vec<NodeId>], expected: &BTreeSet<NodeId>) {
    let total: usize = per_worker.iter().map(Vec::len).sum();
    let union: BTreeSet<NodeId> = per_worker.iter().flatten().copied().collect();
    assert_eq!(total, union.len(), "workers visited overlapping ids");
    assert_eq!(&union, expected);
}

#[test]
fn sequential_scan_sees_tx_state() -> Result<()> {
    init_tracing();
    let fx = fixture(128, 7)?;
    let ids = sequential_ids(&fx.store, Arc::clone(&fx.tx))?;
    let seen: BTreeSet<NodeId> = ids.iter().copied().collect();
    assert_eq!(ids.len(), seen.len());
    assert_eq!(seen, fx.expected);
    // Committed ids come first, then the transaction's additions in order.
    let tail = ids[ids.len() - TX_CREATED as usize..].to_vec();
    let created: Vec<NodeId> = (NODE_COUNT..NODE_COUNT + TX_CREATED).map(NodeId).collect();
    assert_eq!(tail, created);
    Ok(())
}

#[test]
fn parallel_scan_matches_single_threaded_for_each_worker_count() -> Result<()> {
    init_tracing();
    let fx = fixture(32, 11)?;
    let single: BTreeSet<NodeId> = sequential_ids(&fx.store, Arc::clone(&fx.tx))?
        .into_iter()
        .collect();
    assert_eq!(single, fx.expected);
    for workers in 1..=6 {
        let per_worker = fx.store.collect_node_ids_parallel(Arc::clone(&fx.tx), workers)?;
        assert_eq!(per_worker.len(), workers);
        assert_disjoint_union(&per_worker, &single);
    }
    Ok(())
}

#[test]
fn randomized_batch_sizes_and_worker_counts() -> Result<()> {
    init_tracing();
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    for round in 0..5 {
        let batch_size = rng.gen_range(1..=300);
        let workers = rng.gen_range(2..=6);
        let fx = fixture(batch_size, round)?;
        let per_worker = fx.store.collect_node_ids_parallel(Arc::clone(&fx.tx), workers)?;
        assert_disjoint_union(&per_worker, &fx.expected);
    }
    Ok(())
}

#[test]
fn nodes_created_after_setup_are_not_scanned() -> Result<()> {
    init_tracing();
    let store = GraphStore::open(StoreOptions::new().scan_batch_size(16));
    for _ in 0..100 {
        store.create_node();
    }
    let cursors = store.parallel_node_scan(EmptyTxState::shared(), 3)?;
    for _ in 0..50 {
        store.create_node();
    }
    let per_worker = run_workers(cursors, |mut cursor| {
        let mut ids = Vec::new();
        while cursor.next()? {
            ids.extend(cursor.get().map(|item| item.id));
        }
        Ok(ids)
    })?;
    let expected: BTreeSet<NodeId> = (0..100).map(NodeId).collect();
    assert_disjoint_union(&per_worker, &expected);
    Ok(())
}

#[test]
fn parallel_relationship_scan_covers_store() -> Result<()> {
    init_tracing();
    let store = GraphStore::open(StoreOptions::new().scan_batch_size(10));
    let nodes: Vec<NodeId> = (0..20).map(|_| store.create_node()).collect();
    let mut expected = BTreeSet::new();
    for pair in nodes.windows(2) {
        expected.insert(store.create_relationship(pair[0], pair[1], TypeId(0))?);
    }
    let deleted = *expected.iter().next().expect("relationships were created");
    store.delete_relationship(deleted)?;
    expected.remove(&deleted);

    let mut tx = TxState::new();
    let added = RelId(1_000);
    tx.relationship_do_create(added, TypeId(5), nodes[0], nodes[19])?;
    expected.insert(added);

    let cursors = store.parallel_relationship_scan(Arc::new(tx), 4)?;
    let per_worker = run_workers(cursors, |mut cursor| {
        let mut ids = Vec::new();
        while cursor.next()? {
            ids.extend(cursor.get().map(|item| item.id));
        }
        Ok(ids)
    })?;
    let total: usize = per_worker.iter().map(Vec::len).sum();
    let union: BTreeSet<RelId> = per_worker.into_iter().flatten().collect();
    assert_eq!(total, union.len());
    assert_eq!(union, expected);
    Ok(())
}

#[test]
fn worker_failures_are_aggregated() -> Result<()> {
    init_tracing();
    let fx = fixture(64, 3)?;
    let cursors = fx.store.parallel_node_scan(Arc::clone(&fx.tx), 4)?;
    let err = run_workers(cursors, |mut cursor| -> Result<usize> {
        let mut seen = 0;
        while cursor.next()? {
            seen += 1;
        }
        Err(StoreError::TxStateViolation(format!("worker saw {seen} nodes")))
    })
    .unwrap_err();
    match &err {
        StoreError::Aggregate(inner) => assert_eq!(inner.len(), 4),
        other => panic!("expected aggregate, got {other}"),
    }
    assert!(err.to_string().contains("worker saw"));
    Ok(())
}

#[test]
fn scan_claims_are_counted() -> Result<()> {
    init_tracing();
    let metrics = Arc::new(CounterMetrics::default());
    let store = GraphStore::open(StoreOptions::new().scan_batch_size(10).metrics(metrics.clone()));
    for _ in 0..95 {
        store.create_node();
    }
    let per_worker = store.collect_node_ids_parallel(EmptyTxState::shared(), 3)?;
    assert_eq!(per_worker.iter().map(Vec::len).sum::<usize>(), 95);
    assert_eq!(CounterMetrics::get(&metrics.batches_claimed), 10);
    Ok(())
}
