#![forbid(unsafe_code)]

//! Record-number search over a column-store B-tree.
//!
//! The search descends internal pages by binary search over child
//! references, dispatches on the leaf encoding and then searches the insert
//! overlay that governs the target position.

mod build;
mod descent;
mod insert;
mod leaf;
mod page;
mod search;
mod stats;
mod tree;

pub use build::ColumnTreeBuilder;
pub use insert::{
    random_depth, InsertIdx, InsertLink, InsertList, InsertNode, InsertStack, INSERT_MAX_DEPTH,
};
pub use page::{
    ChildRef, FixedLeaf, InsertHeadId, InternalPage, Overlay, Page, PageContent, VarCell, VarSlot,
    VariableLeaf,
};
pub use search::{ApplyOutcome, SearchCompare, SearchState};
pub use stats::{SearchStats, SearchStatsSnapshot};
pub use tree::ColumnTree;
