#![allow(missing_docs)]

use std::sync::Arc;

use bytes::Bytes;
use colstore::{
    primitives::pager::{MemPageStore, PageStore, PagerOptions},
    storage::{
        col::{FixedLeaf, InsertHeadId, PageContent, VarCell, VarSlot, VariableLeaf},
        ColumnStoreConfig, TreeOptions,
    },
    types::Result,
    ColumnTree, ColumnTreeBuilder, SearchCompare, SearchState,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn mixed_store(cache_pages: usize) -> Result<(Arc<MemPageStore>, ColumnTree)> {
    let store = Arc::new(MemPageStore::new(PagerOptions { cache_pages })?);
    let mut leaves = Vec::new();
    let mut recno = 1u64;
    for i in 0..12u64 {
        if i % 2 == 0 {
            leaves.push(PageContent::Fixed(FixedLeaf::new(recno, vec![i as u8; 20]).unwrap()));
            recno += 20;
        } else {
            let leaf = VariableLeaf::new(
                recno,
                vec![
                    VarSlot::value(format!("v{recno}")),
                    VarSlot::repeated(VarCell::Value(Bytes::from(format!("run{i}"))), 8),
                    VarSlot::repeated(VarCell::Deleted, 2),
                ],
            )?;
            leaves.push(PageContent::Variable(leaf));
            recno += 11;
        }
    }
    let root = ColumnTreeBuilder::new(&store).fanout(3).build(leaves)?;
    let store_trait: Arc<dyn PageStore> = store.clone();
    let tree = ColumnTree::open(
        store_trait,
        root,
        TreeOptions {
            verify_descent: true,
            ..TreeOptions::default()
        },
    )?;
    Ok((store, tree))
}

#[test]
fn every_record_resolves_to_its_leaf() -> Result<()> {
    init_tracing();
    let (store, tree) = mixed_store(64)?;
    // fixed leaves cover 20 records, variable leaves 11
    let last = 6 * 20 + 6 * 11;
    let mut state = SearchState::new();
    for recno in 1..=last {
        tree.search_into(&mut state, recno, false)?;
        assert_eq!(state.compare(), SearchCompare::Equal, "recno {recno}");
        assert_eq!(state.recno(), recno);
        let page = state.page().expect("positioned");
        assert!(page.recno() <= recno);
        assert!(state.slot().is_some());
    }
    state.clear();

    let snapshot = tree.stats_snapshot();
    assert_eq!(snapshot.searches, last);
    assert_eq!(snapshot.fixed_leaves, 120);
    assert_eq!(snapshot.variable_leaves, 66);
    assert_eq!(snapshot.failed_searches, 0);
    tree.emit_stats();

    let stats = store.stats();
    assert_eq!(stats.pins, stats.releases);
    Ok(())
}

#[test]
fn values_follow_leaf_encoding() -> Result<()> {
    let (_store, tree) = mixed_store(64)?;
    assert_eq!(tree.get(1)?, Some(Bytes::from_static(&[0])));
    assert_eq!(tree.get(21)?, Some(Bytes::from_static(b"v21")));
    assert_eq!(tree.get(25)?, Some(Bytes::from_static(b"run1")));
    assert_eq!(tree.get(30)?, None);
    assert_eq!(tree.get(32)?, Some(Bytes::from_static(&[2])));
    Ok(())
}

#[test]
fn records_past_the_table_use_the_last_append_list() -> Result<()> {
    let (_store, tree) = mixed_store(64)?;
    let last = 6 * 20 + 6 * 11;
    let state = tree.search(last + 1, false)?;
    assert_eq!(state.compare(), SearchCompare::Less);
    assert_eq!(state.recno(), last);
    assert_eq!(state.insert_head(), Some(InsertHeadId::Append));
    drop(state);

    for recno in [last + 3, last + 1, last + 2] {
        tree.upsert(recno, Some(Bytes::from(recno.to_string())))?;
    }
    for recno in last + 1..=last + 3 {
        assert_eq!(tree.get(recno)?, Some(Bytes::from(recno.to_string())));
    }
    let beyond = tree.search(last + 10, false)?;
    assert_eq!(beyond.compare(), SearchCompare::Less);
    assert_eq!(beyond.recno(), last + 3);
    Ok(())
}

#[test]
fn tree_from_config_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("colstore.toml");
    std::fs::write(
        &path,
        "[pager]\ncache_pages = 4\n\n[tree]\ninsert_max_depth = 3\nverify_descent = true\n",
    )?;
    let config = ColumnStoreConfig::load(&path).expect("valid config");
    assert_eq!(config.tree.insert_max_depth, 3);

    let store = Arc::new(MemPageStore::new(config.pager.clone())?);
    let leaves = (0..9u64).map(|i| PageContent::Fixed(FixedLeaf::new(1 + i * 4, vec![1; 4]).unwrap()));
    let root = ColumnTreeBuilder::new(&store).fanout(2).build(leaves)?;
    let store_trait: Arc<dyn PageStore> = store.clone();
    let tree = ColumnTree::open(store_trait, root, config.tree)?;
    for recno in 1..=36 {
        tree.upsert(recno, Some(Bytes::from_static(b"z")))?;
    }
    for recno in 1..=36 {
        assert_eq!(tree.get(recno)?, Some(Bytes::from_static(b"z")));
    }
    assert!(store.stats().evictions > 0);
    assert!(store.resident_pages() <= 4);
    Ok(())
}
