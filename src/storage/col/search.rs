use std::cmp::Ordering;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use super::insert::{random_depth, InsertIdx, InsertStack, INSERT_MAX_DEPTH};
use super::leaf::dispatch_leaf;
use super::page::{ChildRef, InsertHeadId, Page, PageContent, VarCell};
use super::tree::ColumnTree;
use crate::primitives::pager::PinnedPage;
use crate::types::{page::PageKind, ColError, Recno, Result};

/// Position of the reported record relative to the searched-for record.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum SearchCompare {
    /// The reported position precedes the target: the target lies past
    /// everything known on the leaf.
    Less,
    /// The reported position is the target.
    #[default]
    Equal,
    /// The reported position follows the target.
    Greater,
}

impl SearchCompare {
    /// Classifies `found` against `target`.
    pub fn of(found: Recno, target: Recno) -> Self {
        match found.cmp(&target) {
            Ordering::Less => SearchCompare::Less,
            Ordering::Equal => SearchCompare::Equal,
            Ordering::Greater => SearchCompare::Greater,
        }
    }

    /// The conventional `-1 / 0 / 1` code.
    pub fn as_i8(self) -> i8 {
        match self {
            SearchCompare::Less => -1,
            SearchCompare::Equal => 0,
            SearchCompare::Greater => 1,
        }
    }
}

/// Result of [`SearchState::apply_update`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ApplyOutcome {
    /// The update was linked into the overlay.
    Applied,
    /// The page changed since the search; search again and retry.
    Stale,
}

/// Outcome of a record-number search.
///
/// Holds the pin on the resolved leaf until dropped or cleared.
#[derive(Debug)]
pub struct SearchState<'t> {
    target: Recno,
    recno: Recno,
    compare: SearchCompare,
    page: Option<PinnedPage<'t>>,
    cref: Option<ChildRef>,
    slot: Option<u32>,
    ins_head: Option<InsertHeadId>,
    ins: Option<InsertIdx>,
    write_gen: Option<u64>,
    ins_stack: InsertStack,
    insert_max_depth: usize,
}

impl Default for SearchState<'_> {
    fn default() -> Self {
        Self {
            target: 0,
            recno: 0,
            compare: SearchCompare::Equal,
            page: None,
            cref: None,
            slot: None,
            ins_head: None,
            ins: None,
            write_gen: None,
            ins_stack: InsertStack::new(),
            insert_max_depth: INSERT_MAX_DEPTH,
        }
    }
}

impl<'t> SearchState<'t> {
    /// Creates an empty state, reusable across searches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases the leaf pin and forgets the previous position.
    pub fn clear(&mut self) {
        self.page = None;
        self.target = 0;
        self.recno = 0;
        self.compare = SearchCompare::Equal;
        self.cref = None;
        self.slot = None;
        self.ins_head = None;
        self.ins = None;
        self.write_gen = None;
        self.ins_stack.reset();
    }

    /// Returns true while the state holds a leaf.
    pub fn is_positioned(&self) -> bool {
        self.page.is_some()
    }

    /// The record number searched for.
    pub fn target(&self) -> Recno {
        self.target
    }

    /// The record number at the reported position.
    ///
    /// Equal to [`SearchState::target`] on an exact match; otherwise the
    /// overlay entry found, the next free record of a fixed leaf or the last
    /// record of a variable leaf.
    pub fn recno(&self) -> Recno {
        self.recno
    }

    /// Reported position relative to the target.
    pub fn compare(&self) -> SearchCompare {
        self.compare
    }

    /// The pinned leaf.
    pub fn page(&self) -> Option<&Page> {
        self.page.as_deref()
    }

    /// The pin on the leaf.
    pub fn pinned(&self) -> Option<&PinnedPage<'t>> {
        self.page.as_ref()
    }

    /// Reference used to reach the leaf; `None` when the root is the leaf.
    pub fn child_ref(&self) -> Option<ChildRef> {
        self.cref
    }

    /// Leaf slot holding the target's base entry, if it has one.
    pub fn slot(&self) -> Option<u32> {
        self.slot
    }

    /// Insert list governing the target position.
    pub fn insert_head(&self) -> Option<InsertHeadId> {
        self.ins_head
    }

    /// Overlay entry found by the search.
    pub fn insert_node(&self) -> Option<InsertIdx> {
        self.ins
    }

    /// Write generation captured before the leaf was read, when the search
    /// was flagged for modification.
    pub fn write_gen(&self) -> Option<u64> {
        self.write_gen
    }

    /// Per-level insertion position in the governing list.
    pub fn stack(&self) -> &InsertStack {
        &self.ins_stack
    }

    /// Returns true if the leaf has been modified since the generation was
    /// captured.
    pub fn is_stale(&self) -> bool {
        match (&self.page, self.write_gen) {
            (Some(page), Some(captured)) => page.write_gen() != captured,
            _ => false,
        }
    }

    /// Current value of the target record.
    ///
    /// An exact overlay match wins; otherwise the base entry is used. `None`
    /// for a deleted or absent record.
    pub fn value(&self) -> Option<Bytes> {
        let page = self.page.as_ref()?;
        if self.compare == SearchCompare::Equal {
            if let (Some(head), Some(idx)) = (self.ins_head, self.ins) {
                let overlay = page.overlay();
                return overlay
                    .list(head)
                    .and_then(|list| list.node(idx).value().cloned());
            }
        }
        let slot = self.slot?;
        match page.content() {
            PageContent::Fixed(leaf) => leaf.value(slot).map(|byte| Bytes::copy_from_slice(&[byte])),
            PageContent::Variable(leaf) => match &leaf.slot(slot)?.cell {
                VarCell::Value(bytes) => Some(bytes.clone()),
                VarCell::Deleted => None,
            },
            PageContent::Internal(_) => None,
        }
    }

    /// Links `value` for the target record into the governing overlay list.
    ///
    /// Requires a search flagged for modification. Returns
    /// [`ApplyOutcome::Stale`] without touching the page if its write
    /// generation moved since the search.
    pub fn apply_update(&mut self, value: Option<Bytes>) -> Result<ApplyOutcome> {
        let captured = self
            .write_gen
            .ok_or(ColError::Invalid("search was not flagged for modification"))?;
        let head = self
            .ins_head
            .ok_or(ColError::Invalid("no search position"))?;
        let page = self
            .page
            .as_ref()
            .ok_or(ColError::Invalid("no search position"))?;

        let mut overlay = page.overlay_mut();
        let current = page.write_gen();
        if current != captured {
            debug!(
                target: "colstore::insert",
                page = page.id().0,
                captured,
                current,
                "search position is stale"
            );
            return Ok(ApplyOutcome::Stale);
        }

        let depth = random_depth(&mut rand::thread_rng(), self.insert_max_depth);
        let list = overlay.ensure(head)?;
        let idx = list.insert_with_stack(&self.ins_stack, self.target, value, depth);
        list.search_stack(self.target, &mut self.ins_stack);
        let generation = page.bump_write_gen();
        trace!(
            target: "colstore::insert",
            page = page.id().0,
            recno = self.target,
            generation,
            "applied overlay update"
        );
        drop(overlay);

        self.write_gen = Some(generation);
        self.ins = Some(idx);
        self.recno = self.target;
        self.compare = SearchCompare::Equal;
        Ok(ApplyOutcome::Applied)
    }
}

impl ColumnTree {
    /// Searches for `recno`, returning a fresh [`SearchState`].
    pub fn search(&self, recno: Recno, intends_modify: bool) -> Result<SearchState<'_>> {
        let mut state = SearchState::new();
        self.search_into(&mut state, recno, intends_modify)?;
        Ok(state)
    }

    /// Searches for `recno`, reusing `state`.
    ///
    /// `state` is cleared first, releasing any pin it held. On failure it is
    /// left cleared. A target before the tree's first record reaches no leaf
    /// and fails with [`ColError::Corruption`].
    pub fn search_into<'t>(
        &'t self,
        state: &mut SearchState<'t>,
        recno: Recno,
        intends_modify: bool,
    ) -> Result<()> {
        state.clear();
        let (page, cref) = self.descend(recno).map_err(|err| self.search_failed(recno, err))?;
        let leaf = dispatch_leaf(&page, recno, intends_modify)
            .map_err(|err| self.search_failed(recno, err))?;
        match page.kind() {
            PageKind::ColFixed => self.stats.inc_fixed_leaves(),
            PageKind::ColVariable => self.stats.inc_variable_leaves(),
            PageKind::ColInternal => {}
        }
        if leaf.head == InsertHeadId::Append {
            self.stats.inc_append_lists();
        }

        state.target = recno;
        state.recno = leaf.recno;
        state.compare = leaf.compare;
        state.cref = cref;
        state.slot = leaf.slot;
        state.ins_head = Some(leaf.head);
        state.write_gen = leaf.write_gen;
        state.insert_max_depth = self.options.insert_max_depth;

        {
            let overlay = page.overlay();
            if let Some(list) = overlay.list(leaf.head) {
                if let Some(idx) = list.search_stack(recno, &mut state.ins_stack) {
                    let ins_recno = list.node(idx).recno();
                    state.ins = Some(idx);
                    state.recno = ins_recno;
                    state.compare = SearchCompare::of(ins_recno, recno);
                    if ins_recno == recno {
                        self.stats.inc_overlay_matches();
                    }
                }
            }
        }

        trace!(
            target: "colstore::search",
            recno,
            page = page.id().0,
            found = state.recno,
            compare = state.compare.as_i8(),
            "search complete"
        );
        state.page = Some(page);
        self.stats.inc_searches();
        Ok(())
    }

    /// Current value of `recno`, or `None` if it is deleted or absent.
    pub fn get(&self, recno: Recno) -> Result<Option<Bytes>> {
        Ok(self.search(recno, false)?.value())
    }

    /// Inserts or replaces `recno` in the insert overlay, retrying while the
    /// leaf is modified concurrently. `None` records a deletion.
    pub fn upsert(&self, recno: Recno, value: Option<Bytes>) -> Result<()> {
        let mut state = SearchState::new();
        let mut retries = 0u32;
        loop {
            self.search_into(&mut state, recno, true)?;
            match state.apply_update(value.clone())? {
                ApplyOutcome::Applied => return Ok(()),
                ApplyOutcome::Stale => {
                    retries += 1;
                    debug!(target: "colstore::insert", recno, retries, "retrying stale update");
                }
            }
        }
    }

    fn search_failed(&self, recno: Recno, err: ColError) -> ColError {
        self.stats.inc_failed_searches();
        warn!(target: "colstore::search", recno, error = %err, "search failed");
        err
    }
}
