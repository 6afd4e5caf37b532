//! Relationship chain traversal tests
//!
//! Walks sparse and dense chains built through the store's write path and
//! checks direction and type filtering, transaction-state merging, tolerance
//! of concurrent deletes and detection of corrupted chains.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::sync::{Arc, Once};

use chainstore::storage::{
    ChainHead, EmptyTxState, GraphStore, NodeRelationshipCursor, ReadableTxState,
    RelationshipItem, StoreOptions, TxState,
};
use chainstore::types::{Direction, NodeId, RelId, Result, StoreError, TypeFilter, TypeId};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("chainstore=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn drain(cursor: &mut NodeRelationshipCursor) -> Result<Vec<RelId>> {
    let mut out = Vec::new();
    while cursor.next()? {
        let item = cursor.get().expect("positioned cursor exposes an item");
        out.push(item.id);
    }
    Ok(out)
}

fn walk(
    store: &GraphStore,
    node: NodeId,
    direction: Direction,
    types: TypeFilter,
    tx: Arc<dyn ReadableTxState>,
) -> Result<Vec<RelId>> {
    let mut cursor = store.relationship_cursor();
    cursor.init(store.node_source(node)?, direction, types, tx)?;
    drain(&mut cursor)
}

#[test]
fn empty_chain_yields_nothing() -> Result<()> {
    init_tracing();
    let store = GraphStore::open(StoreOptions::new());
    let sparse = store.create_node();
    let dense = store.create_dense_node();
    for node in [sparse, dense] {
        for direction in [Direction::Outgoing, Direction::Incoming, Direction::Both] {
            assert!(walk(&store, node, direction, TypeFilter::Any, EmptyTxState::shared())?.is_empty());
        }
    }
    Ok(())
}

#[test]
fn sparse_chain_filters_direction_and_type() -> Result<()> {
    init_tracing();
    let store = GraphStore::open(StoreOptions::new());
    let a = store.create_node();
    let b = store.create_node();
    let c = store.create_node();
    let knows = store.create_relationship(a, b, TypeId(1))?;
    let likes = store.create_relationship(c, a, TypeId(2))?;
    let self_loop = store.create_relationship(a, a, TypeId(1))?;

    let both = walk(&store, a, Direction::Both, TypeFilter::Any, EmptyTxState::shared())?;
    assert_eq!(both, vec![self_loop, likes, knows]);
    let outgoing = walk(&store, a, Direction::Outgoing, TypeFilter::Any, EmptyTxState::shared())?;
    assert_eq!(outgoing, vec![self_loop, knows]);
    let incoming = walk(&store, a, Direction::Incoming, TypeFilter::Any, EmptyTxState::shared())?;
    assert_eq!(incoming, vec![self_loop, likes]);
    let typed = walk(&store, a, Direction::Both, TypeFilter::only(&[TypeId(2)]), EmptyTxState::shared())?;
    assert_eq!(typed, vec![likes]);
    Ok(())
}

#[test]
fn dense_out_only_node_yields_out_chain_in_link_order() -> Result<()> {
    init_tracing();
    let store = GraphStore::open(StoreOptions::new());
    let hub = store.create_dense_node();
    let mut created = Vec::new();
    for _ in 0..5 {
        let leaf = store.create_node();
        created.push(store.create_relationship(hub, leaf, TypeId(7))?);
    }
    created.reverse();
    let found = walk(&store, hub, Direction::Both, TypeFilter::Any, EmptyTxState::shared())?;
    assert_eq!(found, created);
    let incoming = walk(&store, hub, Direction::Incoming, TypeFilter::Any, EmptyTxState::shared())?;
    assert!(incoming.is_empty());
    Ok(())
}

#[test]
fn dense_type_filter_never_reads_skipped_group() -> Result<()> {
    init_tracing();
    let store = GraphStore::open(StoreOptions::new());
    let hub = store.create_dense_node();
    let leaf = store.create_node();
    let stranger = store.create_node();
    let wanted = store.create_relationship(hub, leaf, TypeId(1))?;
    store.create_relationship(hub, leaf, TypeId(2))?;
    let foreign = store.create_relationship(stranger, leaf, TypeId(2))?;

    // Point group B's OUT chain at a relationship hub does not take part in.
    let ChainHead::Dense(first_group) = store.node_source(hub)?.head else {
        panic!("hub must be dense");
    };
    let group_a = store.group_store().get(first_group.0)?;
    let mut group_b = store.group_store().get(group_a.next.0)?;
    assert_eq!(group_b.rel_type, TypeId(2));
    group_b.first_out = foreign;
    store.group_store().update(group_b)?;

    let typed = walk(&store, hub, Direction::Both, TypeFilter::only(&[TypeId(1)]), EmptyTxState::shared())?;
    assert_eq!(typed, vec![wanted]);

    let err = walk(&store, hub, Direction::Both, TypeFilter::Any, EmptyTxState::shared()).unwrap_err();
    assert!(err.is_corruption());
    Ok(())
}

#[test]
fn foreign_record_in_sparse_chain_reports_corruption() -> Result<()> {
    init_tracing();
    let store = GraphStore::open(StoreOptions::new());
    let a = store.create_node();
    let b = store.create_node();
    let x = store.create_node();
    let y = store.create_node();
    let first = store.create_relationship(a, b, TypeId(0))?;
    let head = store.create_relationship(a, b, TypeId(0))?;
    let foreign = store.create_relationship(x, y, TypeId(0))?;

    let mut record = store.relationship_store().get(head.0)?;
    assert_eq!(record.first_next_rel, first);
    record.first_next_rel = foreign;
    store.relationship_store().update(record)?;

    let mut cursor = store.relationship_cursor();
    cursor.init(store.node_source(a)?, Direction::Both, TypeFilter::Any, EmptyTxState::shared())?;
    assert!(cursor.next()?);
    assert_eq!(cursor.get().map(|item| item.id), Some(head));
    match cursor.next() {
        Err(StoreError::InvalidRecord {
            node,
            rel,
            first_node,
            second_node,
        }) => {
            assert_eq!(node, a);
            assert_eq!(rel, foreign);
            assert_eq!((first_node, second_node), (x, y));
        }
        other => panic!("expected corruption, got {other:?}"),
    }
    Ok(())
}

#[test]
fn relationship_deleted_mid_walk_is_skipped() -> Result<()> {
    init_tracing();
    let store = GraphStore::open(StoreOptions::new());
    let a = store.create_node();
    let b = store.create_node();
    let rels: Vec<RelId> = (0..5)
        .map(|_| store.create_relationship(a, b, TypeId(0)))
        .collect::<Result<_>>()?;

    let mut cursor = store.relationship_cursor();
    cursor.init(store.node_source(a)?, Direction::Both, TypeFilter::Any, EmptyTxState::shared())?;
    assert!(cursor.next()?);
    assert_eq!(cursor.get().map(|item| item.id), Some(rels[4]));

    // The cursor already points at rels[3]; deleting it must not stop the walk.
    store.delete_relationship(rels[3])?;
    store.delete_relationship(rels[1])?;
    let rest = drain(&mut cursor)?;
    assert_eq!(rest, vec![rels[2], rels[0]]);
    Ok(())
}

#[test]
fn tx_changes_are_merged_for_sparse_and_dense_nodes() -> Result<()> {
    init_tracing();
    let store = GraphStore::open(StoreOptions::new());
    let sparse = store.create_node();
    let dense = store.create_dense_node();
    let committed = store.create_relationship(sparse, dense, TypeId(1))?;
    let doomed = store.create_relationship(dense, sparse, TypeId(1))?;

    let next_rel = store.relationship_store().get(doomed.0).map(|r| r.id.0 + 1)?;
    let mut tx = TxState::new();
    tx.relationship_do_delete(doomed);
    tx.relationship_do_create(RelId(next_rel), TypeId(3), dense, sparse)?;
    tx.relationship_do_create(RelId(next_rel + 1), TypeId(1), sparse, sparse)?;
    let tx: Arc<dyn ReadableTxState> = Arc::new(tx);

    let at_sparse = walk(&store, sparse, Direction::Both, TypeFilter::Any, Arc::clone(&tx))?;
    assert_eq!(at_sparse, vec![committed, RelId(next_rel), RelId(next_rel + 1)]);

    let at_dense = walk(&store, dense, Direction::Outgoing, TypeFilter::Any, Arc::clone(&tx))?;
    assert_eq!(at_dense, vec![RelId(next_rel)]);

    let typed = walk(&store, sparse, Direction::Outgoing, TypeFilter::only(&[TypeId(1)]), tx)?;
    assert_eq!(typed, vec![committed, RelId(next_rel + 1)]);
    Ok(())
}

#[test]
fn converted_node_keeps_every_relationship() -> Result<()> {
    init_tracing();
    let store = GraphStore::open(StoreOptions::new().dense_node_threshold(8));
    let hub = store.create_node();
    let mut expected = HashSet::new();
    let mut outgoing = HashSet::new();
    for i in 0..20u32 {
        let leaf = store.create_node();
        let rel = if i % 3 == 0 {
            store.create_relationship(leaf, hub, TypeId(i % 4))?
        } else {
            let rel = store.create_relationship(hub, leaf, TypeId(i % 4))?;
            outgoing.insert(rel);
            rel
        };
        expected.insert(rel);
    }
    assert!(matches!(store.node_source(hub)?.head, ChainHead::Dense(_)));

    let both: HashSet<_> = walk(&store, hub, Direction::Both, TypeFilter::Any, EmptyTxState::shared())?
        .into_iter()
        .collect();
    assert_eq!(both, expected);
    let out: HashSet<_> = walk(&store, hub, Direction::Outgoing, TypeFilter::Any, EmptyTxState::shared())?
        .into_iter()
        .collect();
    assert_eq!(out, outgoing);

    let items = store.node_relationships(hub, Direction::Both, TypeFilter::only(&[TypeId(1)]), EmptyTxState::shared())?;
    assert!(items.iter().all(|item: &RelationshipItem| item.rel_type == TypeId(1)));
    assert_eq!(items.len(), 5);
    Ok(())
}

#[test]
fn unknown_direction_value_is_illegal() {
    let err = Direction::try_from(9).unwrap_err();
    assert!(matches!(err, StoreError::IllegalConfiguration(_)));
    assert_eq!(Direction::try_from(Direction::Incoming.as_u8()).ok(), Some(Direction::Incoming));
}
