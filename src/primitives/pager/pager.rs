use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::ops::Deref;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::frame::Frame;
use crate::storage::col::{Page, PageContent};
use crate::types::{ColError, PageId, Result};

/// Smallest resident set that lets a descent hold a parent and its child.
pub const MIN_CACHE_PAGES: usize = 2;

/// Configuration options for the in-memory page store.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PagerOptions {
    /// Maximum number of resident pages, at least [`MIN_CACHE_PAGES`].
    pub cache_pages: usize,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self { cache_pages: 1024 }
    }
}

/// Statistics tracking page store operations.
#[derive(Default, Clone, Debug, Eq, PartialEq)]
pub struct PagerStats {
    /// Successful pins.
    pub pins: u64,
    /// Releases of previously pinned pages.
    pub releases: u64,
    /// Pins served from the resident set.
    pub hits: u64,
    /// Pins that paged the page in.
    pub misses: u64,
    /// Resident pages dropped to make room.
    pub evictions: u64,
    /// Pins that failed.
    pub failed_pins: u64,
    /// Pages currently holding at least one pin.
    pub pinned_pages: u64,
}

impl fmt::Display for PagerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pins={} releases={} hits={} misses={} evictions={} failed={} pinned={}",
            self.pins,
            self.releases,
            self.hits,
            self.misses,
            self.evictions,
            self.failed_pins,
            self.pinned_pages
        )
    }
}

/// Source of pinned in-memory pages.
///
/// Every successful [`PageStore::pin`] must be matched by exactly one
/// [`PageStore::release`]. Callers normally go through [`PinnedPage`], which
/// releases on drop.
pub trait PageStore: Send + Sync + 'static {
    /// Pins `id`, paging it in if it is not resident.
    fn pin(&self, id: PageId) -> Result<Arc<Page>>;
    /// Releases one pin previously obtained from [`PageStore::pin`].
    fn release(&self, page: &Page);
    /// Returns a snapshot of store statistics.
    fn stats(&self) -> PagerStats {
        PagerStats::default()
    }
}

/// A pin on a page, released when dropped.
pub struct PinnedPage<'s> {
    store: &'s dyn PageStore,
    page: Arc<Page>,
}

impl<'s> PinnedPage<'s> {
    /// Pins `id` through `store`.
    pub fn acquire(store: &'s dyn PageStore, id: PageId) -> Result<Self> {
        let page = store.pin(id)?;
        Ok(Self { store, page })
    }

    /// Shared handle to the pinned page. The handle does not hold the pin.
    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }
}

impl Deref for PinnedPage<'_> {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.page
    }
}

impl fmt::Debug for PinnedPage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedPage")
            .field("id", &self.page.id())
            .field("kind", &self.page.kind())
            .finish()
    }
}

impl Drop for PinnedPage<'_> {
    fn drop(&mut self) {
        self.store.release(&self.page);
    }
}

/// Injected page-in failures.
#[derive(Clone, Debug, Default)]
pub struct FaultPlan {
    /// Number of upcoming pins that fail regardless of page.
    pub fail_next: u32,
    /// Pages whose every pin fails.
    pub fail_pages: HashSet<PageId>,
}

struct PagerInner {
    backing: HashMap<PageId, Arc<Page>>,
    frames: HashMap<PageId, Frame>,
    recency: LruCache<PageId, ()>,
    next_id: u64,
    faults: FaultPlan,
    stats: PagerStats,
}

/// Page store keeping every page in memory behind a bounded resident set.
///
/// Pages registered with [`MemPageStore::insert`] form the backing image; a
/// pin of a non-resident page copies its handle into the resident set,
/// evicting the least recently used unpinned frame when the set is full.
pub struct MemPageStore {
    options: PagerOptions,
    inner: Mutex<PagerInner>,
}

impl MemPageStore {
    /// Creates an empty store.
    pub fn new(options: PagerOptions) -> Result<Self> {
        if options.cache_pages < MIN_CACHE_PAGES {
            return Err(ColError::Invalid("cache_pages must be at least 2"));
        }
        Ok(Self {
            options,
            inner: Mutex::new(PagerInner {
                backing: HashMap::new(),
                frames: HashMap::new(),
                recency: LruCache::unbounded(),
                next_id: 1,
                faults: FaultPlan::default(),
                stats: PagerStats::default(),
            }),
        })
    }

    /// Options the store was created with.
    pub fn options(&self) -> &PagerOptions {
        &self.options
    }

    /// Allocates an identifier and stores `content` under it.
    pub fn insert(&self, content: PageContent) -> PageId {
        let mut inner = self.inner.lock();
        let id = PageId(inner.next_id);
        inner.next_id += 1;
        inner.backing.insert(id, Arc::new(Page::new(id, content)));
        id
    }

    /// Number of pages in the backing image.
    pub fn page_count(&self) -> usize {
        self.inner.lock().backing.len()
    }

    /// Number of resident pages.
    pub fn resident_pages(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// Fails the next `count` pins with an I/O error.
    pub fn fail_next_pins(&self, count: u32) {
        self.inner.lock().faults.fail_next = count;
    }

    /// Fails every pin of `id` with an I/O error.
    pub fn fail_page(&self, id: PageId) {
        self.inner.lock().faults.fail_pages.insert(id);
    }

    /// Removes every injected fault.
    pub fn clear_faults(&self) {
        self.inner.lock().faults = FaultPlan::default();
    }

    fn injected_fault(inner: &mut PagerInner, id: PageId) -> bool {
        if inner.faults.fail_next > 0 {
            inner.faults.fail_next -= 1;
            return true;
        }
        inner.faults.fail_pages.contains(&id)
    }

    fn evict_one(inner: &mut PagerInner) -> Result<()> {
        let victim = inner
            .recency
            .iter()
            .rev()
            .map(|(id, _)| *id)
            .find(|id| inner.frames.get(id).map_or(true, |frame| !frame.is_pinned()))
            .ok_or(ColError::Exhausted("every resident page is pinned"))?;
        inner.recency.pop(&victim);
        inner.frames.remove(&victim);
        inner.stats.evictions += 1;
        debug!(target: "colstore::pager", page = victim.0, "evicted resident page");
        Ok(())
    }

    fn page_in(&self, inner: &mut PagerInner, id: PageId) -> Result<()> {
        let page = inner
            .backing
            .get(&id)
            .cloned()
            .ok_or(ColError::Corruption("child reference names an unknown page"))?;
        while inner.frames.len() >= self.options.cache_pages {
            Self::evict_one(inner)?;
        }
        inner.frames.insert(id, Frame::new(page));
        debug!(target: "colstore::pager", page = id.0, "paged in");
        Ok(())
    }

    fn try_pin(&self, inner: &mut PagerInner, id: PageId) -> Result<Arc<Page>> {
        if Self::injected_fault(inner, id) {
            warn!(target: "colstore::pager", page = id.0, "injected page-in failure");
            return Err(ColError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected page-in failure",
            )));
        }
        if inner.frames.contains_key(&id) {
            inner.stats.hits += 1;
        } else {
            self.page_in(inner, id)?;
            inner.stats.misses += 1;
        }
        inner.recency.put(id, ());
        let frame = inner
            .frames
            .get_mut(&id)
            .ok_or(ColError::Corruption("resident frame vanished"))?;
        if frame.pin_count == 0 {
            inner.stats.pinned_pages += 1;
        }
        frame.pin_count += 1;
        Ok(Arc::clone(&frame.page))
    }
}

impl PageStore for MemPageStore {
    fn pin(&self, id: PageId) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock();
        match self.try_pin(&mut inner, id) {
            Ok(page) => {
                inner.stats.pins += 1;
                trace!(target: "colstore::pager", page = id.0, "pinned");
                Ok(page)
            }
            Err(err) => {
                inner.stats.failed_pins += 1;
                warn!(target: "colstore::pager", page = id.0, error = %err, "pin failed");
                Err(err)
            }
        }
    }

    fn release(&self, page: &Page) {
        let mut inner = self.inner.lock();
        let id = page.id();
        let released = match inner.frames.get_mut(&id) {
            Some(frame) if frame.is_pinned() => {
                frame.pin_count -= 1;
                Some(frame.pin_count == 0)
            }
            _ => None,
        };
        debug_assert!(released.is_some(), "release of page {id} without a pin");
        match released {
            Some(now_unpinned) => {
                inner.stats.releases += 1;
                if now_unpinned {
                    inner.stats.pinned_pages -= 1;
                }
                trace!(target: "colstore::pager", page = id.0, "released");
            }
            None => {
                warn!(target: "colstore::pager", page = id.0, "release without a pin");
            }
        }
    }

    fn stats(&self) -> PagerStats {
        self.inner.lock().stats.clone()
    }
}
