use tracing::{trace, warn};

use super::page::{ChildRef, Page, PageContent};
use super::tree::ColumnTree;
use crate::primitives::pager::{PageStore, PinnedPage};
use crate::types::{ColError, Recno, Result};

/// Index of the child whose subtree holds `recno`.
///
/// `base` ends as the smallest index whose starting record number exceeds
/// `recno`, so the child is the one before it. Returns `None` when `recno`
/// precedes the first child.
pub(crate) fn choose_child(children: &[ChildRef], recno: Recno) -> Option<usize> {
    let mut base = 0usize;
    let mut limit = children.len();
    while limit != 0 {
        let indx = base + (limit >> 1);
        let child = &children[indx];
        if recno == child.recno {
            return Some(indx);
        }
        if recno > child.recno {
            base = indx + 1;
            limit -= 1;
        }
        limit >>= 1;
    }
    base.checked_sub(1)
}

impl ColumnTree {
    /// Descends from the root to the leaf holding `recno`.
    ///
    /// Returns the pinned leaf and the reference used to reach it (`None`
    /// when the root is a leaf). The child is pinned before the parent is
    /// released; on failure every pin taken here has been released.
    pub(crate) fn descend(&self, recno: Recno) -> Result<(PinnedPage<'_>, Option<ChildRef>)> {
        let store: &dyn PageStore = self.store.as_ref();
        let mut page = PinnedPage::acquire(store, self.root_page())?;
        let mut cref = None;
        loop {
            let child = match page.content() {
                PageContent::Internal(internal) => {
                    let idx = choose_child(internal.children(), recno).ok_or(
                        ColError::Corruption("record precedes the internal page's range"),
                    )?;
                    internal.children()[idx]
                }
                PageContent::Fixed(_) | PageContent::Variable(_) => break,
            };
            self.stats.inc_internal_pages();
            trace!(
                target: "colstore::search",
                page = page.id().0,
                child = child.page.0,
                child_recno = child.recno,
                "descending through internal page"
            );
            page = PinnedPage::acquire(store, child.page)?;
            self.check_child(&page, child)?;
            cref = Some(child);
        }
        Ok((page, cref))
    }

    fn check_child(&self, page: &Page, child: ChildRef) -> Result<()> {
        if page.recno() == child.recno {
            return Ok(());
        }
        warn!(
            target: "colstore::search",
            page = page.id().0,
            page_recno = page.recno(),
            ref_recno = child.recno,
            "child page does not start at its reference's record number"
        );
        if self.options.verify_descent {
            return Err(ColError::Corruption(
                "child page does not start at its reference's record number",
            ));
        }
        Ok(())
    }
}
