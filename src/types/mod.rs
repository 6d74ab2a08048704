#![forbid(unsafe_code)]

//! Identifiers, page tags and the crate-wide error type.

use std::fmt;

/// Identifier of a page known to a [`crate::primitives::pager::PageStore`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PageId(pub u64);

/// Record number: the 64-bit sequential key of a column-store row.
///
/// Tables loaded with [`crate::storage::col::ColumnTreeBuilder`] start at 1,
/// but pages accept any starting record, 0 included.
pub type Recno = u64;

/// Errors surfaced by the column store.
#[derive(thiserror::Error, Debug)]
pub enum ColError {
    /// The page store could not bring a page in from backing storage.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// A resource needed to pin a page is exhausted.
    #[error("resource exhausted: {0}")]
    Exhausted(&'static str),
    /// A page or reference violates a structural invariant.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// A caller-supplied argument is invalid.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

/// Convenience alias for results returned by the column store.
pub type Result<T> = std::result::Result<T, ColError>;

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PageId {
    fn from(value: u64) -> Self {
        PageId(value)
    }
}

pub mod page {
    //! Page kind tags shared by the pager and the search core.

    /// Kind of a column-store page.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub enum PageKind {
        /// Internal page holding child references keyed by starting recno.
        ColInternal,
        /// Leaf holding a contiguous run of fixed-width records.
        ColFixed,
        /// Leaf holding run-length encoded variable-width cells.
        ColVariable,
    }

    impl PageKind {
        /// Returns true for both leaf encodings.
        pub const fn is_leaf(self) -> bool {
            !matches!(self, PageKind::ColInternal)
        }
    }

}
