use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use super::insert::INSERT_MAX_DEPTH;
use super::stats::{SearchStats, SearchStatsSnapshot};
use crate::primitives::pager::PageStore;
use crate::storage::options::TreeOptions;
use crate::types::{ColError, PageId, Result};

/// Handle to one column-store tree.
///
/// Bundles the page store, the root page and per-tree options; every search
/// goes through this handle rather than ambient state.
pub struct ColumnTree {
    pub(super) store: Arc<dyn PageStore>,
    pub(super) root: AtomicU64,
    pub(super) options: TreeOptions,
    pub(super) stats: Arc<SearchStats>,
}

impl ColumnTree {
    /// Opens the tree rooted at `root`.
    pub fn open(store: Arc<dyn PageStore>, root: PageId, options: TreeOptions) -> Result<Self> {
        if !(1..=INSERT_MAX_DEPTH).contains(&options.insert_max_depth) {
            return Err(ColError::Invalid("insert_max_depth must be between 1 and 10"));
        }
        tracing::debug!(
            target: "colstore::search",
            root = root.0,
            verify_descent = options.verify_descent,
            "opened column tree"
        );
        Ok(Self {
            store,
            root: AtomicU64::new(root.0),
            options,
            stats: Arc::new(SearchStats::default()),
        })
    }

    /// Return the root page identifier.
    pub fn root_page(&self) -> PageId {
        PageId(self.root.load(AtomicOrdering::SeqCst))
    }

    /// Page store backing the tree.
    pub fn store(&self) -> &Arc<dyn PageStore> {
        &self.store
    }

    /// Options the tree was opened with.
    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Access the live statistics counters for this tree.
    pub fn stats(&self) -> Arc<SearchStats> {
        Arc::clone(&self.stats)
    }

    /// Snapshot the current statistics counters.
    pub fn stats_snapshot(&self) -> SearchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Emit the current statistics to the tracing sink.
    pub fn emit_stats(&self) {
        self.stats.emit_tracing();
    }
}
