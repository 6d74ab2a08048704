//! In-memory column-store pages.
//!
//! A [`Page`] is immutable while pinned except for its insert overlay, which
//! sits behind a reader/writer lock and is paired with the page's write
//! generation.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use bytes::Bytes;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::insert::InsertList;
use crate::types::{page::PageKind, ColError, PageId, Recno, Result};

/// Reference from an internal page to one child subtree.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChildRef {
    /// First record number covered by the child.
    pub recno: Recno,
    /// Page holding the child.
    pub page: PageId,
}

/// Internal page: child references sorted by starting record number.
#[derive(Clone, Debug)]
pub struct InternalPage {
    recno: Recno,
    children: Vec<ChildRef>,
}

impl InternalPage {
    /// Builds an internal page; children must be non-empty, strictly increasing
    /// and the first child must start at the page's own record number.
    pub fn new(children: Vec<ChildRef>) -> Result<Self> {
        let first = children
            .first()
            .ok_or(ColError::Invalid("internal page without children"))?;
        if children.windows(2).any(|pair| pair[0].recno >= pair[1].recno) {
            return Err(ColError::Invalid(
                "child references must be strictly increasing",
            ));
        }
        Ok(Self {
            recno: first.recno,
            children,
        })
    }

    /// Starting record number of the subtree.
    pub fn recno(&self) -> Recno {
        self.recno
    }

    /// Child references in record order.
    pub fn children(&self) -> &[ChildRef] {
        &self.children
    }
}

/// Leaf holding a contiguous run of fixed-width (byte) records.
#[derive(Clone, Debug)]
pub struct FixedLeaf {
    recno: Recno,
    values: Vec<u8>,
}

impl FixedLeaf {
    /// Creates a leaf whose first record is `recno`.
    ///
    /// The first record past the leaf must still be representable.
    pub fn new(recno: Recno, values: Vec<u8>) -> Result<Self> {
        let entries = u32::try_from(values.len())
            .map_err(|_| ColError::Invalid("fixed leaf holds too many entries"))?;
        recno
            .checked_add(u64::from(entries))
            .ok_or(ColError::Invalid("fixed leaf record range overflows"))?;
        Ok(Self { recno, values })
    }

    /// Starting record number.
    pub fn recno(&self) -> Recno {
        self.recno
    }

    /// Number of base-encoded entries.
    pub fn entries(&self) -> u32 {
        self.values.len() as u32
    }

    /// First record number past the base-encoded range.
    pub fn end_recno(&self) -> Recno {
        // checked in `new`
        self.recno + u64::from(self.entries())
    }

    /// Base value stored at `slot`.
    pub fn value(&self, slot: u32) -> Option<u8> {
        self.values.get(slot as usize).copied()
    }
}

/// Contents of one variable-width cell.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VarCell {
    /// A stored value.
    Value(Bytes),
    /// A deleted record.
    Deleted,
}

/// One variable-width slot: a cell repeated `rle` times.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VarSlot {
    /// Cell shared by every record of the run.
    pub cell: VarCell,
    /// Number of consecutive records the cell covers (at least 1).
    pub rle: u64,
}

impl VarSlot {
    /// A single-record value slot.
    pub fn value(bytes: impl Into<Bytes>) -> Self {
        Self {
            cell: VarCell::Value(bytes.into()),
            rle: 1,
        }
    }

    /// A run of `rle` records sharing one cell.
    pub fn repeated(cell: VarCell, rle: u64) -> Self {
        Self { cell, rle }
    }
}

/// A run covering more than one record. `recno + rle` never exceeds the
/// first record past the leaf, which `VariableLeaf::new` keeps in range.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Repeat {
    recno: Recno,
    rle: u64,
    slot: u32,
}

/// Leaf holding run-length encoded variable-width cells.
#[derive(Clone, Debug)]
pub struct VariableLeaf {
    recno: Recno,
    slots: Vec<VarSlot>,
    repeats: Vec<Repeat>,
    total: u64,
}

impl VariableLeaf {
    /// Builds a leaf and its repeat index.
    ///
    /// Rejects zero repeat counts and record ranges whose end does not fit
    /// in a record number.
    pub fn new(recno: Recno, slots: Vec<VarSlot>) -> Result<Self> {
        if u32::try_from(slots.len()).is_err() {
            return Err(ColError::Invalid("variable leaf holds too many slots"));
        }
        let mut repeats = Vec::new();
        let mut next = recno;
        for (idx, slot) in slots.iter().enumerate() {
            if slot.rle == 0 {
                return Err(ColError::Invalid("variable slot with zero repeat count"));
            }
            if slot.rle > 1 {
                repeats.push(Repeat {
                    recno: next,
                    rle: slot.rle,
                    slot: idx as u32,
                });
            }
            next = next
                .checked_add(slot.rle)
                .ok_or(ColError::Invalid("variable leaf record range overflows"))?;
        }
        Ok(Self {
            recno,
            slots,
            repeats,
            total: next - recno,
        })
    }

    /// Starting record number.
    pub fn recno(&self) -> Recno {
        self.recno
    }

    /// Number of slots.
    pub fn slot_count(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Number of records covered, counting repeats.
    pub fn record_count(&self) -> u64 {
        self.total
    }

    /// Last record number on the page.
    pub fn last_recno(&self) -> Recno {
        (self.recno + self.total).saturating_sub(1)
    }

    /// Slot at `idx`.
    pub fn slot(&self, idx: u32) -> Option<&VarSlot> {
        self.slots.get(idx as usize)
    }

    /// Finds the slot holding `recno`.
    ///
    /// Binary search over the runs with a repeat count above one; on a miss
    /// the slot is computed from the largest run starting before `recno`,
    /// since every slot in between covers exactly one record.
    pub fn search(&self, recno: Recno) -> Option<u32> {
        if recno < self.recno {
            return None;
        }
        let mut base = 0usize;
        let mut limit = self.repeats.len();
        while limit != 0 {
            let indx = base + (limit >> 1);
            let repeat = self.repeats[indx];
            if recno >= repeat.recno && recno < repeat.recno + repeat.rle {
                return Some(repeat.slot);
            }
            if recno > repeat.recno {
                base = indx + 1;
                limit -= 1;
            }
            limit >>= 1;
        }

        let (start_slot, start_recno) = match base {
            0 => (0u64, self.recno),
            _ => {
                let repeat = self.repeats[base - 1];
                (u64::from(repeat.slot) + 1, repeat.recno + repeat.rle)
            }
        };
        let remaining = self.slots.len() as u64 - start_slot;
        if recno >= start_recno + remaining {
            return None;
        }
        Some((start_slot + (recno - start_recno)) as u32)
    }
}

/// Decoded page contents.
#[derive(Clone, Debug)]
pub enum PageContent {
    /// Internal page.
    Internal(InternalPage),
    /// Fixed-width leaf.
    Fixed(FixedLeaf),
    /// Variable-width leaf.
    Variable(VariableLeaf),
}

impl PageContent {
    /// Tag for this content.
    pub fn kind(&self) -> PageKind {
        match self {
            PageContent::Internal(_) => PageKind::ColInternal,
            PageContent::Fixed(_) => PageKind::ColFixed,
            PageContent::Variable(_) => PageKind::ColVariable,
        }
    }

    /// Starting record number of the page.
    pub fn recno(&self) -> Recno {
        match self {
            PageContent::Internal(page) => page.recno(),
            PageContent::Fixed(leaf) => leaf.recno(),
            PageContent::Variable(leaf) => leaf.recno(),
        }
    }

    /// Records covered by a leaf; `None` for internal pages.
    pub fn leaf_records(&self) -> Option<u64> {
        match self {
            PageContent::Internal(_) => None,
            PageContent::Fixed(leaf) => Some(u64::from(leaf.entries())),
            PageContent::Variable(leaf) => Some(leaf.record_count()),
        }
    }
}

/// Selects one insert list on a leaf page.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InsertHeadId {
    /// Records past the page's base range.
    Append,
    /// The single update list of a fixed-width leaf.
    Single,
    /// The update list of one variable-width slot.
    Slot(u32),
}

/// Insert lists of one leaf page, created lazily.
#[derive(Debug, Default)]
pub struct Overlay {
    append: Option<InsertList>,
    update: Vec<Option<InsertList>>,
}

impl Overlay {
    fn for_content(content: &PageContent) -> Self {
        let lists = match content {
            PageContent::Internal(_) => 0,
            PageContent::Fixed(_) => 1,
            PageContent::Variable(leaf) => leaf.slots.len(),
        };
        Self {
            append: None,
            update: (0..lists).map(|_| None).collect(),
        }
    }

    fn update_index(head: InsertHeadId) -> Option<usize> {
        match head {
            InsertHeadId::Append => None,
            InsertHeadId::Single => Some(0),
            InsertHeadId::Slot(slot) => Some(slot as usize),
        }
    }

    /// Returns the list selected by `head`, if it has been created.
    pub fn list(&self, head: InsertHeadId) -> Option<&InsertList> {
        match Self::update_index(head) {
            None => self.append.as_ref(),
            Some(idx) => self.update.get(idx).and_then(Option::as_ref),
        }
    }

    /// Returns the list selected by `head`, creating it if absent.
    pub fn ensure(&mut self, head: InsertHeadId) -> Result<&mut InsertList> {
        let slot = match Self::update_index(head) {
            None => &mut self.append,
            Some(idx) => self
                .update
                .get_mut(idx)
                .ok_or(ColError::Invalid("insert list does not exist on this page"))?,
        };
        Ok(slot.get_or_insert_with(InsertList::new))
    }
}

/// A column-store page as held by a page store.
#[derive(Debug)]
pub struct Page {
    id: PageId,
    content: PageContent,
    write_gen: AtomicU64,
    overlay: RwLock<Overlay>,
}

impl Page {
    /// Wraps decoded content as a page.
    pub fn new(id: PageId, content: PageContent) -> Self {
        let overlay = Overlay::for_content(&content);
        Self {
            id,
            content,
            write_gen: AtomicU64::new(0),
            overlay: RwLock::new(overlay),
        }
    }

    /// Page identifier.
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Page kind.
    pub fn kind(&self) -> PageKind {
        self.content.kind()
    }

    /// Starting record number.
    pub fn recno(&self) -> Recno {
        self.content.recno()
    }

    /// Decoded content.
    pub fn content(&self) -> &PageContent {
        &self.content
    }

    /// Current write generation.
    ///
    /// The load is acquire-ordered: page content read after this call is at
    /// least as new as the returned generation.
    pub fn write_gen(&self) -> u64 {
        self.write_gen.load(AtomicOrdering::Acquire)
    }

    /// Shared access to the insert overlay.
    pub fn overlay(&self) -> RwLockReadGuard<'_, Overlay> {
        self.overlay.read()
    }

    /// Exclusive access to the insert overlay. Callers that mutate it must
    /// call [`Page::bump_write_gen`] before dropping the guard.
    pub fn overlay_mut(&self) -> RwLockWriteGuard<'_, Overlay> {
        self.overlay.write()
    }

    /// Advances the write generation, returning the new value.
    pub fn bump_write_gen(&self) -> u64 {
        self.write_gen.fetch_add(1, AtomicOrdering::Release) + 1
    }
}
