//! Storage layer: the column-store tree and its configuration.

/// Record-number keyed column-store tree.
pub mod col;

/// Configuration for the page store and tree.
pub mod options;

pub use options::{ColumnStoreConfig, ConfigError, TreeOptions};
