use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Snapshot of search statistics at a point in time.
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq)]
pub struct SearchStatsSnapshot {
    /// Searches that returned a position
    pub searches: u64,
    /// Searches that failed while acquiring a page
    pub failed_searches: u64,
    /// Internal pages descended through
    pub internal_pages: u64,
    /// Searches that ended on a fixed-width leaf
    pub fixed_leaves: u64,
    /// Searches that ended on a variable-width leaf
    pub variable_leaves: u64,
    /// Searches that selected a page's append list
    pub append_lists: u64,
    /// Searches that matched an overlay entry exactly
    pub overlay_matches: u64,
}

/// Thread-safe statistics for the column-store search path.
#[derive(Default, Debug)]
pub struct SearchStats {
    searches: AtomicU64,
    failed_searches: AtomicU64,
    internal_pages: AtomicU64,
    fixed_leaves: AtomicU64,
    variable_leaves: AtomicU64,
    append_lists: AtomicU64,
    overlay_matches: AtomicU64,
}

impl SearchStats {
    /// Returns the number of completed searches.
    pub fn searches(&self) -> u64 {
        self.searches.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of searches that failed.
    pub fn failed_searches(&self) -> u64 {
        self.failed_searches.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of internal pages descended through.
    pub fn internal_pages(&self) -> u64 {
        self.internal_pages.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of searches ending on fixed-width leaves.
    pub fn fixed_leaves(&self) -> u64 {
        self.fixed_leaves.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of searches ending on variable-width leaves.
    pub fn variable_leaves(&self) -> u64 {
        self.variable_leaves.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of searches that selected an append list.
    pub fn append_lists(&self) -> u64 {
        self.append_lists.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of exact overlay matches.
    pub fn overlay_matches(&self) -> u64 {
        self.overlay_matches.load(AtomicOrdering::Relaxed)
    }

    pub(crate) fn inc_searches(&self) {
        self.searches.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_failed_searches(&self) {
        self.failed_searches.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_pages(&self) {
        self.internal_pages.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_fixed_leaves(&self) {
        self.fixed_leaves.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_variable_leaves(&self) {
        self.variable_leaves.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_append_lists(&self) {
        self.append_lists.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_overlay_matches(&self) {
        self.overlay_matches.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Creates a snapshot of all current statistics.
    pub fn snapshot(&self) -> SearchStatsSnapshot {
        SearchStatsSnapshot {
            searches: self.searches(),
            failed_searches: self.failed_searches(),
            internal_pages: self.internal_pages(),
            fixed_leaves: self.fixed_leaves(),
            variable_leaves: self.variable_leaves(),
            append_lists: self.append_lists(),
            overlay_matches: self.overlay_matches(),
        }
    }

    /// Emits current statistics to the tracing infrastructure.
    pub fn emit_tracing(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            target: "colstore::stats",
            searches = snapshot.searches,
            failed_searches = snapshot.failed_searches,
            internal_pages = snapshot.internal_pages,
            fixed_leaves = snapshot.fixed_leaves,
            variable_leaves = snapshot.variable_leaves,
            append_lists = snapshot.append_lists,
            overlay_matches = snapshot.overlay_matches,
            "column search stats snapshot"
        );
    }
}
