use std::sync::Arc;

use crate::storage::col::Page;

/// A resident page and the number of outstanding pins on it.
pub struct Frame {
    pub page: Arc<Page>,
    pub pin_count: u32,
}

impl Frame {
    pub fn new(page: Arc<Page>) -> Self {
        Self { page, pin_count: 0 }
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }
}
