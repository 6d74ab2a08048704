//! Record-number search path for a column-store B-tree.
//!
//! Given a record number, [`storage::col::ColumnTree::search`] descends the
//! tree through a [`primitives::pager::PageStore`], dispatches on the leaf
//! encoding and searches the in-memory insert overlay, returning a
//! [`storage::col::SearchState`] that says exactly where the record is or
//! where it would be inserted.

#![warn(missing_docs)]

pub mod primitives;
pub mod storage;
pub mod types;

pub use storage::col::{
    ApplyOutcome, ColumnTree, ColumnTreeBuilder, SearchCompare, SearchState, SearchStats,
};
pub use types::{ColError, PageId, Recno, Result};
