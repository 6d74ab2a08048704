#![allow(missing_docs)]

use std::sync::Arc;

use bytes::Bytes;
use colstore::{
    primitives::pager::{MemPageStore, PageStore, PagerOptions},
    storage::{
        col::{ChildRef, FixedLeaf, InternalPage, PageContent},
        TreeOptions,
    },
    ColError, ColumnTree, ColumnTreeBuilder, PageId, SearchState,
};

fn tree(cache_pages: usize) -> (Arc<MemPageStore>, ColumnTree, PageId) {
    let store = Arc::new(MemPageStore::new(PagerOptions { cache_pages }).unwrap());
    let leaves = (0..27u64).map(|i| PageContent::Fixed(FixedLeaf::new(1 + i * 10, vec![7; 10]).unwrap()));
    let root = ColumnTreeBuilder::new(&store).fanout(3).build(leaves).unwrap();
    let store_trait: Arc<dyn PageStore> = store.clone();
    let tree = ColumnTree::open(store_trait, root, TreeOptions::default()).unwrap();
    (store, tree, root)
}

fn assert_no_leaked_pins(store: &MemPageStore) {
    let stats = store.stats();
    assert_eq!(stats.pins, stats.releases, "{stats}");
    assert_eq!(stats.pinned_pages, 0, "{stats}");
}

#[test]
fn root_pin_failure_reports_error() {
    let (store, tree, _) = tree(64);
    store.fail_next_pins(1);
    assert!(matches!(tree.search(5, false), Err(ColError::Io(_))));
    assert_no_leaked_pins(&store);
    assert!(tree.search(5, false).is_ok());
    assert_no_leaked_pins(&store);
}

#[test]
fn failure_at_every_depth_releases_ancestors() {
    // root, two internal levels, leaf
    for depth in 0..4 {
        let (store, tree, _) = tree(64);
        // Warm the cache so the failure is the only difference.
        drop(tree.search(200, false).unwrap());
        let before = store.stats();

        let ids: Vec<PageId> = {
            let mut ids = Vec::new();
            let mut page = store.pin(tree.root_page()).unwrap();
            loop {
                ids.push(page.id());
                let next = match page.content() {
                    PageContent::Internal(internal) => internal
                        .children()
                        .iter()
                        .rev()
                        .find(|child| child.recno <= 200)
                        .map(|child| child.page)
                        .unwrap(),
                    _ => break,
                };
                store.release(&page);
                page = store.pin(next).unwrap();
            }
            store.release(&page);
            ids
        };
        assert_eq!(ids.len(), 4);

        store.fail_page(ids[depth]);
        let mut state = SearchState::new();
        let err = tree.search_into(&mut state, 200, true).unwrap_err();
        assert!(matches!(err, ColError::Io(_)));
        assert!(!state.is_positioned());
        assert_no_leaked_pins(&store);
        assert_eq!(store.stats().failed_pins, before.failed_pins + 1);
        assert_eq!(tree.stats_snapshot().failed_searches, 1);

        store.clear_faults();
        tree.search_into(&mut state, 200, true).unwrap();
        assert!(state.is_positioned());
    }
}

#[test]
fn exhausted_cache_fails_cleanly() {
    let (store, tree, _) = tree(2);
    let held = tree.search(1, false).unwrap();
    // The held leaf and one descent frame fill the cache.
    let err = tree.search(250, false).unwrap_err();
    assert!(matches!(err, ColError::Exhausted(_)));
    drop(held);
    assert_no_leaked_pins(&store);
    assert!(tree.search(250, false).is_ok());
}

#[test]
fn update_after_failed_search_is_not_lost() {
    let (store, tree, _) = tree(64);
    tree.upsert(15, Some(Bytes::from_static(b"kept"))).unwrap();
    store.fail_next_pins(1);
    assert!(tree.upsert(16, Some(Bytes::from_static(b"lost"))).is_err());
    assert_eq!(tree.get(15).unwrap(), Some(Bytes::from_static(b"kept")));
    assert_eq!(tree.get(16).unwrap(), Some(Bytes::from_static(&[7])));
    assert_no_leaked_pins(&store);
}

#[test]
fn dangling_child_reference_is_corruption() {
    let store = Arc::new(MemPageStore::new(PagerOptions::default()).unwrap());
    let leaf = store.insert(PageContent::Fixed(FixedLeaf::new(1, vec![0; 10]).unwrap()));
    let internal = InternalPage::new(vec![
        ChildRef { recno: 1, page: leaf },
        ChildRef {
            recno: 11,
            page: PageId(999),
        },
    ])
    .unwrap();
    let root = store.insert(PageContent::Internal(internal));
    let store_trait: Arc<dyn PageStore> = store.clone();
    let tree = ColumnTree::open(store_trait, root, TreeOptions::default()).unwrap();

    assert!(tree.search(5, false).is_ok());
    assert!(matches!(tree.search(15, false), Err(ColError::Corruption(_))));
    assert_no_leaked_pins(&store);
}
