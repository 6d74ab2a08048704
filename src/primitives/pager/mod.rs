#![forbid(unsafe_code)]

mod frame;
mod pager;

pub use pager::{
    FaultPlan, MemPageStore, PageStore, PagerOptions, PagerStats, PinnedPage, MIN_CACHE_PAGES,
};
