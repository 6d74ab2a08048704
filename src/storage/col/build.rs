use tracing::debug;

use super::page::{ChildRef, InternalPage, PageContent};
use crate::primitives::pager::MemPageStore;
use crate::types::{ColError, PageId, Result};

const DEFAULT_FANOUT: usize = 64;

/// Bulk loader assembling a tree bottom-up from leaves in record order.
pub struct ColumnTreeBuilder<'a> {
    store: &'a MemPageStore,
    fanout: usize,
}

impl<'a> ColumnTreeBuilder<'a> {
    /// Creates a loader writing pages into `store`.
    pub fn new(store: &'a MemPageStore) -> Self {
        Self {
            store,
            fanout: DEFAULT_FANOUT,
        }
    }

    /// Sets the maximum number of children per internal page.
    pub fn fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout;
        self
    }

    /// Stores `leaves` and the internal levels above them, returning the root.
    ///
    /// Leaves must start at record 1 and be contiguous. An empty leaf is only
    /// accepted as the sole leaf of an empty table.
    pub fn build<I>(self, leaves: I) -> Result<PageId>
    where
        I: IntoIterator<Item = PageContent>,
    {
        if self.fanout < 2 {
            return Err(ColError::Invalid("fanout must be at least 2"));
        }

        let mut level = Vec::new();
        let mut expected = 1;
        let mut saw_empty = false;
        for content in leaves {
            let records = content
                .leaf_records()
                .ok_or(ColError::Invalid("loader accepts leaf pages only"))?;
            if content.recno() != expected {
                return Err(ColError::Invalid(
                    "leaves must be contiguous and start at record 1",
                ));
            }
            saw_empty |= records == 0;
            expected += records;
            let recno = content.recno();
            let page = self.store.insert(content);
            level.push(ChildRef { recno, page });
        }
        if level.is_empty() {
            return Err(ColError::Invalid("tree needs at least one leaf"));
        }
        if saw_empty && level.len() > 1 {
            return Err(ColError::Invalid("empty leaf in a multi-leaf tree"));
        }

        let leaves = level.len();
        let mut height = 1;
        while level.len() > 1 {
            level = level
                .chunks(self.fanout)
                .map(|chunk| {
                    let internal = InternalPage::new(chunk.to_vec())?;
                    let recno = internal.recno();
                    let page = self.store.insert(PageContent::Internal(internal));
                    Ok(ChildRef { recno, page })
                })
                .collect::<Result<Vec<_>>>()?;
            height += 1;
        }
        let root = level[0].page;
        debug!(
            target: "colstore::build",
            root = root.0,
            leaves,
            height,
            last_recno = expected - 1,
            "loaded column tree"
        );
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::pager::{PageStore, PagerOptions};
    use crate::storage::col::FixedLeaf;

    fn store() -> MemPageStore {
        MemPageStore::new(PagerOptions::default()).unwrap()
    }

    fn fixed(recno: u64, len: usize) -> PageContent {
        PageContent::Fixed(FixedLeaf::new(recno, vec![0; len]).unwrap())
    }

    #[test]
    fn single_leaf_is_root() {
        let store = store();
        let root = ColumnTreeBuilder::new(&store).build([fixed(1, 10)]).unwrap();
        assert_eq!(store.page_count(), 1);
        let page = store.pin(root).unwrap();
        assert!(page.kind().is_leaf());
        store.release(&page);
    }

    #[test]
    fn builds_internal_levels() {
        let store = store();
        let leaves = (0..10).map(|i| fixed(1 + i * 10, 10));
        let root = ColumnTreeBuilder::new(&store).fanout(3).build(leaves).unwrap();
        // 10 leaves -> 4 -> 2 -> 1
        assert_eq!(store.page_count(), 17);
        let page = store.pin(root).unwrap();
        match page.content() {
            PageContent::Internal(internal) => {
                assert_eq!(internal.recno(), 1);
                assert_eq!(internal.children().len(), 2);
                assert_eq!(internal.children()[1].recno, 91);
            }
            other => panic!("unexpected root {other:?}"),
        }
        store.release(&page);
    }

    #[test]
    fn rejects_bad_input() {
        let store = store();
        let err = |leaves: Vec<PageContent>| ColumnTreeBuilder::new(&store).build(leaves).unwrap_err();
        assert!(matches!(err(Vec::new()), ColError::Invalid(_)));
        assert!(matches!(err(vec![fixed(2, 5)]), ColError::Invalid(_)));
        assert!(matches!(err(vec![fixed(1, 5), fixed(7, 5)]), ColError::Invalid(_)));
        assert!(matches!(err(vec![fixed(1, 0), fixed(1, 5)]), ColError::Invalid(_)));
        assert!(ColumnTreeBuilder::new(&store).fanout(1).build([fixed(1, 1)]).is_err());
        assert!(ColumnTreeBuilder::new(&store).build([fixed(1, 0)]).is_ok());
    }
}
