use super::page::{InsertHeadId, Page, PageContent};
use super::search::SearchCompare;
use crate::types::{ColError, Recno, Result};

/// Where a record falls on a leaf before the overlay is consulted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct LeafDispatch {
    pub(crate) recno: Recno,
    pub(crate) compare: SearchCompare,
    pub(crate) slot: Option<u32>,
    pub(crate) head: InsertHeadId,
    pub(crate) write_gen: Option<u64>,
}

/// Locates `recno` on a leaf and selects the insert list governing it.
///
/// With `intends_modify` the write generation is read first, with acquire
/// ordering, so nothing read from the page afterwards predates it.
pub(crate) fn dispatch_leaf(page: &Page, recno: Recno, intends_modify: bool) -> Result<LeafDispatch> {
    let write_gen = intends_modify.then(|| page.write_gen());
    if recno < page.recno() {
        return Err(ColError::Corruption("record precedes the leaf's range"));
    }

    match page.content() {
        PageContent::Fixed(leaf) => {
            let end = leaf.end_recno();
            if recno >= end {
                return Ok(LeafDispatch {
                    recno: end,
                    compare: SearchCompare::Less,
                    slot: None,
                    head: InsertHeadId::Append,
                    write_gen,
                });
            }
            Ok(LeafDispatch {
                recno,
                compare: SearchCompare::Equal,
                slot: Some((recno - leaf.recno()) as u32),
                head: InsertHeadId::Single,
                write_gen,
            })
        }
        PageContent::Variable(leaf) => match leaf.search(recno) {
            None => Ok(LeafDispatch {
                recno: leaf.last_recno(),
                compare: SearchCompare::Less,
                slot: None,
                head: InsertHeadId::Append,
                write_gen,
            }),
            Some(slot) => Ok(LeafDispatch {
                recno,
                compare: SearchCompare::Equal,
                slot: Some(slot),
                head: InsertHeadId::Slot(slot),
                write_gen,
            }),
        },
        PageContent::Internal(_) => Err(ColError::Corruption("descent ended on an internal page")),
    }
}
