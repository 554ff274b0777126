//! Kernel row cache
//!
//! Bounded-memory cache of rows of a symmetric Gram matrix, computed lazily
//! through a [`KernelFunction`]. Rows are tracked at partial-fill granularity,
//! evicted in strict LRU order under a byte budget, and may be shared with
//! "buddy" caches evaluating the same kernel over overlapping index sets.
//!
//! Row storage is position-indexed rather than example-indexed: two inverse
//! permutations (`example_to_row` / `row_to_example`) decouple an example's
//! identity from its column offset, so learners that reorder their working set
//! can swap rows in O(1) plus a column fix-up pass over the resident rows.

use crate::core::{KernelFunction, Result, StringKernelError};
use log::debug;
use lru::LruCache;
use serde::Serialize;
use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Default cache budget: 256 MiB
pub const DEFAULT_CACHE_BYTES: usize = 256 * 1024 * 1024;

/// Initial number of row slots; capacity doubles from here on demand
const MIN_CAPACITY: usize = 256;

const BYTES_PER_ENTRY: usize = std::mem::size_of::<f64>();

/// One Gram matrix row
///
/// `data[p]` holds k(i, row_to_example[p]) for the owning example `i`.
/// The buffer length is the row's cached length; buffers are rebuilt at exact
/// capacity on every resize so byte accounting stays accurate. The diagonal
/// k(i, i) is kept separately and stays valid when the buffer is truncated
/// away: `touched` distinguishes "never queried" from "diagonal known".
struct CacheRow {
    data: Vec<f64>,
    diag: f64,
    touched: bool,
}

impl CacheRow {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            diag: 0.0,
            touched: false,
        }
    }
}

type SharedInner = Rc<RefCell<CacheInner>>;

/// Buddy group: every member cache holds the same group vector and is listed
/// in it by weak reference. Members never own each other.
type BuddyGroup = Rc<RefCell<Vec<Weak<RefCell<CacheInner>>>>>;

struct CacheInner {
    kernel: Arc<dyn KernelFunction>,
    rows: Vec<CacheRow>,
    example_to_row: Vec<usize>,
    row_to_example: Vec<usize>,
    /// Recency order over rows holding a list position, most recent first.
    /// Unbounded: eviction is driven by the byte budget, not an entry count.
    lru: LruCache<usize, ()>,
    max_bytes: usize,
    current_bytes: usize,
    max_row_len: usize,
    hits: Cell<u64>,
    misses: Cell<u64>,
    evictions: u64,
    group: BuddyGroup,
}

impl CacheInner {
    fn capacity(&self) -> usize {
        self.rows.len()
    }

    /// Grow the permutation tables and row slots to cover at least `n`
    /// indices. New slots start with the identity mapping and untouched rows.
    fn ensure_capacity(&mut self, n: usize) {
        let old = self.rows.len();
        if n > old {
            let mut nl = old.max(MIN_CAPACITY);
            while nl < n {
                nl *= 2;
            }
            self.rows.resize_with(nl, CacheRow::new);
            self.example_to_row.extend(old..nl);
            self.row_to_example.extend(old..nl);
        }
    }

    /// Look up k(i, j) in the resident rows of this cache only
    ///
    /// Checks row i at j's column offset, the cached diagonal, then the
    /// transposed entry in row j. Symmetry of the kernel makes either row
    /// authoritative.
    fn lookup(&self, i: usize, j: usize) -> Option<f64> {
        let l = self.rows.len();
        if i < l && j < l {
            let p = self.example_to_row[j];
            let row = &self.rows[i];
            if p < row.data.len() {
                return Some(row.data[p]);
            }
            if i == j && row.touched {
                return Some(row.diag);
            }
            let p = self.example_to_row[i];
            let row = &self.rows[j];
            if p < row.data.len() {
                return Some(row.data[p]);
            }
        }
        None
    }

    /// Append computed entries to row `i`, rebuilding the buffer at exact size
    fn extend_row(&mut self, i: usize, tail: &[f64]) {
        if tail.is_empty() {
            return;
        }
        let row = &mut self.rows[i];
        let nlen = row.data.len() + tail.len();
        let mut ndata = Vec::with_capacity(nlen);
        ndata.extend_from_slice(&row.data);
        ndata.extend_from_slice(tail);
        row.data = ndata;
        self.current_bytes += tail.len() * BYTES_PER_ENTRY;
        self.max_row_len = self.max_row_len.max(nlen);
    }

    /// Truncate row `k` to `nlen` entries, releasing the excess
    ///
    /// Truncating to zero drops the buffer and removes the row from the
    /// recency list; the diagonal survives. Growing is never done here.
    fn truncate_row(&mut self, k: usize, nlen: usize) {
        let olen = self.rows[k].data.len();
        if nlen < olen {
            let row = &mut self.rows[k];
            if nlen > 0 {
                let mut ndata = Vec::with_capacity(nlen);
                ndata.extend_from_slice(&row.data[..nlen]);
                row.data = ndata;
            } else {
                row.data = Vec::new();
                self.lru.pop(&k);
            }
            self.current_bytes -= (olen - nlen) * BYTES_PER_ENTRY;
        }
    }

    /// Evict least-recently-used rows until the byte budget is respected
    ///
    /// Walks the recency list from the LRU end and stops at the MRU head: the
    /// most recently used row is never evicted, even if the budget is still
    /// exceeded once everything else is gone.
    fn purge(&mut self) {
        if self.current_bytes <= self.max_bytes {
            return;
        }
        let keys: Vec<usize> = self.lru.iter().map(|(&k, _)| k).collect();
        for &k in keys.iter().skip(1).rev() {
            if self.current_bytes <= self.max_bytes {
                break;
            }
            let olen = self.rows[k].data.len();
            self.truncate_row(k, 0);
            if olen > 0 {
                self.evictions += 1;
                debug!(
                    "evicted row {} ({} bytes), cache at {}/{} bytes",
                    k,
                    olen * BYTES_PER_ENTRY,
                    self.current_bytes,
                    self.max_bytes
                );
            }
        }
    }

    /// Exchange storage positions r1 and r2 (held by examples i1 and i2)
    ///
    /// Every resident row covering one or both of the two column offsets must
    /// have those entries exchanged: a row covering both swaps them in place;
    /// a row covering only the larger offset pulls the replacement value from
    /// the incoming example's own row (or its cached diagonal) when available,
    /// and is truncated just below the stale column otherwise.
    fn swap_positions(&mut self, i1: usize, i2: usize, r1: usize, r2: usize) {
        if r1 < self.max_row_len || r2 < self.max_row_len {
            let resident: Vec<usize> = self.lru.iter().map(|(&k, _)| k).collect();
            let mut mrl = 0;
            for k in resident {
                let n = self.rows[k].data.len();
                let rr = self.example_to_row[k];
                if r1 < n {
                    if r2 < n {
                        self.rows[k].data.swap(r1, r2);
                    } else if rr == r2 {
                        // k itself moves onto column r1: the entry is k(k, k)
                        let d = self.rows[k].diag;
                        self.rows[k].data[r1] = d;
                    } else {
                        let other_len = self.rows[i2].data.len();
                        if rr < other_len && rr != r1 {
                            let v = self.rows[i2].data[rr];
                            self.rows[k].data[r1] = v;
                        } else {
                            self.truncate_row(k, r1);
                        }
                    }
                } else if r2 < n {
                    if rr == r1 {
                        let d = self.rows[k].diag;
                        self.rows[k].data[r2] = d;
                    } else {
                        let other_len = self.rows[i1].data.len();
                        if rr < other_len && rr != r2 {
                            let v = self.rows[i1].data[rr];
                            self.rows[k].data[r2] = v;
                        } else {
                            self.truncate_row(k, r2);
                        }
                    }
                }
                mrl = mrl.max(self.rows[k].data.len());
            }
            self.max_row_len = mrl;
        }
        self.row_to_example[r1] = i2;
        self.row_to_example[r2] = i1;
        self.example_to_row[i1] = r2;
        self.example_to_row[i2] = r1;
    }
}

/// Bounded-memory LRU cache of Gram matrix rows
///
/// Point queries ([`query`](Self::query)) search this cache and every buddy
/// but never populate anything; only [`query_row`](Self::query_row) stores
/// entries. Mutating operations take `&mut self`: a cache instance is
/// single-writer, and callers running batch evaluation in parallel must shard
/// by row or serialize these calls.
pub struct KernelRowCache {
    inner: SharedInner,
}

impl KernelRowCache {
    /// Create a cache with the default 256 MiB budget
    pub fn new(kernel: Arc<dyn KernelFunction>) -> Self {
        // Budget is nonzero, construction cannot fail
        Self::with_maximum_size(kernel, DEFAULT_CACHE_BYTES).unwrap()
    }

    /// Create a cache with an explicit byte budget
    ///
    /// # Arguments
    /// * `kernel` - symmetric kernel evaluated on total misses; buddies must
    ///   be built from clones of the same `Arc`
    /// * `max_bytes` - row storage budget in bytes (must be positive)
    pub fn with_maximum_size(kernel: Arc<dyn KernelFunction>, max_bytes: usize) -> Result<Self> {
        if max_bytes == 0 {
            return Err(StringKernelError::InvalidParameter(
                "cache budget must be positive".to_string(),
            ));
        }
        let group: BuddyGroup = Rc::new(RefCell::new(Vec::new()));
        let inner = Rc::new(RefCell::new(CacheInner {
            kernel,
            rows: Vec::new(),
            example_to_row: Vec::new(),
            row_to_example: Vec::new(),
            lru: LruCache::unbounded(),
            max_bytes,
            current_bytes: 0,
            max_row_len: 0,
            hits: Cell::new(0),
            misses: Cell::new(0),
            evictions: 0,
            group: Rc::clone(&group),
        }));
        group.borrow_mut().push(Rc::downgrade(&inner));
        Ok(Self { inner })
    }

    /// Get k(i, j), serving from this cache or any buddy when possible
    ///
    /// On a total miss the kernel function is invoked and the result is
    /// returned without being cached; only [`query_row`](Self::query_row)
    /// populates rows.
    pub fn query(&self, i: usize, j: usize) -> f64 {
        {
            let inner = self.inner.borrow();
            if let Some(v) = inner.lookup(i, j) {
                inner.hits.set(inner.hits.get() + 1);
                return v;
            }
        }
        let group = self.inner.borrow().group.clone();
        for member in group.borrow().iter() {
            let Some(buddy) = member.upgrade() else {
                continue;
            };
            if Rc::ptr_eq(&buddy, &self.inner) {
                continue;
            }
            let hit = buddy.borrow().lookup(i, j);
            if let Some(v) = hit {
                let inner = self.inner.borrow();
                inner.hits.set(inner.hits.get() + 1);
                return v;
            }
        }
        let kernel = {
            let inner = self.inner.borrow();
            inner.misses.set(inner.misses.get() + 1);
            Arc::clone(&inner.kernel)
        };
        kernel.compute(i, j)
    }

    /// Ensure at least `len` leading entries of row `i` are cached and return
    /// a borrow of the row
    ///
    /// The diagonal is captured first, then the row grows rightward; each new
    /// entry at position p is resolved through [`query`](Self::query) against
    /// the example holding p, so transposed entries already cached here or in
    /// a buddy are reused instead of recomputed. The row becomes the most
    /// recently used and the cache is purged back under budget afterwards.
    ///
    /// The returned guard borrows the cache: drop it before the next call
    /// that takes `&mut self`.
    pub fn query_row(&mut self, i: usize, len: usize) -> Ref<'_, [f64]> {
        let fast = {
            let inner = self.inner.borrow();
            i < inner.capacity() && inner.rows[i].touched && len <= inner.rows[i].data.len()
        };
        if !fast {
            self.grow_row(i, len);
            let mut inner = self.inner.borrow_mut();
            // the row must not be evicted by its own purge
            inner.lru.pop(&i);
            inner.purge();
        }
        let mut inner = self.inner.borrow_mut();
        inner.lru.put(i, ());
        drop(inner);
        Ref::map(self.inner.borrow(), |inner| inner.rows[i].data.as_slice())
    }

    /// Compute the missing prefix of row `i` up to `len` entries
    fn grow_row(&self, i: usize, len: usize) {
        {
            let mut inner = self.inner.borrow_mut();
            if i >= inner.capacity() || len >= inner.capacity() {
                inner.ensure_capacity((i + 1).max(len));
            }
        }
        let needs_diag = !self.inner.borrow().rows[i].touched;
        if needs_diag {
            let kernel = Arc::clone(&self.inner.borrow().kernel);
            let d = kernel.compute(i, i);
            let mut inner = self.inner.borrow_mut();
            inner.rows[i].diag = d;
            inner.rows[i].touched = true;
        }
        let olen = self.inner.borrow().rows[i].data.len();
        if olen < len {
            // While this loop runs, row i still has length olen, so queries
            // against it only ever see the already-valid prefix.
            let mut tail = Vec::with_capacity(len - olen);
            for p in olen..len {
                let x = self.inner.borrow().row_to_example[p];
                tail.push(self.query(x, i));
            }
            self.inner.borrow_mut().extend_row(i, &tail);
        }
    }

    /// Currently cached prefix length of row `i` (0 if never queried)
    pub fn status_row(&self, i: usize) -> usize {
        let inner = self.inner.borrow();
        if i < inner.capacity() {
            inner.rows[i].data.len()
        } else {
            0
        }
    }

    /// Move row `i` to the least-recently-used position
    ///
    /// A reclaim hint: the row's memory is not freed, it just becomes the
    /// first eviction candidate.
    pub fn discard_row(&mut self, i: usize) {
        let mut inner = self.inner.borrow_mut();
        if i < inner.capacity() && !inner.rows[i].data.is_empty() {
            inner.lru.demote(&i);
        }
    }

    /// Swap the examples held at storage positions `r1` and `r2`
    pub fn swap_rr(&mut self, r1: usize, r2: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.ensure_capacity(1 + r1.max(r2));
        let i1 = inner.row_to_example[r1];
        let i2 = inner.row_to_example[r2];
        inner.swap_positions(i1, i2, r1, r2);
    }

    /// Swap the storage positions of examples `i1` and `i2`
    pub fn swap_ii(&mut self, i1: usize, i2: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.ensure_capacity(1 + i1.max(i2));
        let r1 = inner.example_to_row[i1];
        let r2 = inner.example_to_row[i2];
        inner.swap_positions(i1, i2, r1, r2);
    }

    /// Move example `i2` to storage position `r1` (and the example currently
    /// there to `i2`'s old position)
    pub fn swap_ri(&mut self, r1: usize, i2: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.ensure_capacity(1 + r1.max(i2));
        let i1 = inner.row_to_example[r1];
        let r2 = inner.example_to_row[i2];
        inner.swap_positions(i1, i2, r1, r2);
    }

    /// Example currently stored at position `r`
    pub fn example_at_row(&mut self, r: usize) -> usize {
        let mut inner = self.inner.borrow_mut();
        inner.ensure_capacity(r + 1);
        inner.row_to_example[r]
    }

    /// Storage position currently holding example `i`
    pub fn row_of_example(&mut self, i: usize) -> usize {
        let mut inner = self.inner.borrow_mut();
        inner.ensure_capacity(i + 1);
        inner.example_to_row[i]
    }

    /// Set the byte budget; shrinking purges immediately
    pub fn set_maximum_size(&mut self, max_bytes: usize) -> Result<()> {
        if max_bytes == 0 {
            return Err(StringKernelError::InvalidParameter(
                "cache budget must be positive".to_string(),
            ));
        }
        let mut inner = self.inner.borrow_mut();
        inner.max_bytes = max_bytes;
        inner.purge();
        Ok(())
    }

    /// Configured byte budget
    pub fn get_maximum_size(&self) -> usize {
        self.inner.borrow().max_bytes
    }

    /// Bytes currently held in row storage
    pub fn get_current_size(&self) -> usize {
        self.inner.borrow().current_bytes
    }

    /// Link this cache and `other` (and everything either is already linked
    /// to) into one buddy group
    ///
    /// Buddy relationships are symmetric and transitive. Members may read
    /// each other's cached entries on [`query`](Self::query) but never write
    /// or evict across the group; each cache keeps its own recency order and
    /// budget.
    ///
    /// # Panics
    /// Panics if the two caches were not built from clones of the same
    /// kernel `Arc`.
    pub fn set_buddy(&mut self, other: &KernelRowCache) {
        {
            let a = self.inner.borrow();
            let b = other.inner.borrow();
            assert!(
                Arc::ptr_eq(&a.kernel, &b.kernel),
                "buddy caches must share the same kernel function"
            );
        }
        let own_group = self.inner.borrow().group.clone();
        let other_group = other.inner.borrow().group.clone();
        if Rc::ptr_eq(&own_group, &other_group) {
            return;
        }
        let members = std::mem::take(&mut *other_group.borrow_mut());
        for member in members {
            if let Some(rc) = member.upgrade() {
                rc.borrow_mut().group = Rc::clone(&own_group);
                own_group.borrow_mut().push(Rc::downgrade(&rc));
            }
        }
    }

    /// Cache hit rate over all point queries so far
    pub fn hit_rate(&self) -> f64 {
        let inner = self.inner.borrow();
        let hits = inner.hits.get();
        let total = hits + inner.misses.get();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.borrow();
        CacheStats {
            hits: inner.hits.get(),
            misses: inner.misses.get(),
            evictions: inner.evictions,
            current_bytes: inner.current_bytes,
            max_bytes: inner.max_bytes,
            rows_cached: inner.lru.len(),
            capacity: inner.capacity(),
        }
    }
}

impl Drop for KernelRowCache {
    fn drop(&mut self) {
        // deregister from the buddy group
        let group = self.inner.borrow().group.clone();
        group
            .borrow_mut()
            .retain(|member| match member.upgrade() {
                Some(rc) => !Rc::ptr_eq(&rc, &self.inner),
                None => false,
            });
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_bytes: usize,
    pub max_bytes: usize,
    pub rows_cached: usize,
    pub capacity: usize,
}
