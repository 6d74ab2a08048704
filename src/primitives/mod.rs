//! Low-level primitives the column store is built on.

/// Page store seam, pin guards and the in-memory reference store.
///
/// Maps page identifiers to pinned in-memory pages and takes the pins back.
pub mod pager;
