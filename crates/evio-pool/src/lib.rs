//! Two-list recycling pool for readout buffers and decoded events.
//!
//! The decode pipeline allocates two kinds of heavy objects per data block: the
//! raw word buffer the reader fills and the decoded-event objects the parser
//! populates. At sustained event rates a fresh allocation per block is too
//! expensive, so both are recycled through a [`RecyclePool`].
//!
//! # Key Design: Lock-Free Acquire
//!
//! Acquisition happens on exactly one thread (the acquisition loop or the
//! owning worker) and release may happen on any thread. The pool therefore
//! keeps two lists:
//!
//! 1. `primary`: owned by the pool handle, popped without any lock
//! 2. `recycled`: shared behind a `parking_lot::Mutex`, pushed by releasers
//!
//! When `primary` runs dry, `acquire()` takes the lock once and swaps the whole
//! recycled list in. The lock is therefore held for one `Vec` swap per refill
//! on the acquiring side and one `push` per release on the other side.
//!
//! # Limits
//!
//! [`PoolSettings`] bounds the number of resting items (`max_pooled`) and the
//! number of times one item may be handed out (`max_reuse`). Items past either
//! limit are dropped on release instead of being recycled, which lets
//! containers that accumulated large capacities be replaced periodically.
//!
//! # Example
//!
//! ```
//! use evio_pool::{PoolSettings, RecyclePool};
//!
//! let mut pool = RecyclePool::new(
//!     PoolSettings::default(),
//!     || Vec::<u32>::with_capacity(4000),
//!     |words: &mut Vec<u32>| words.clear(),
//! );
//!
//! let mut block = pool.acquire();
//! block.push(0xc0da_0100);
//! drop(block); // reset and returned to the recycled list
//!
//! let block = pool.acquire(); // swapped back in, no allocation
//! assert!(block.is_empty());
//! assert_eq!(pool.stats().allocated, 1);
//! ```

use parking_lot::Mutex;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Type alias for reset function used when returning items to the pool.
type ResetFn<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// Type alias for factory function used to create new pool items.
type FactoryFn<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Capacity limits applied on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum number of items resting in the pool. Releases beyond this are dropped.
    pub max_pooled: usize,
    /// Maximum number of times a single item is handed out before it is
    /// dropped on release. `None` disables the limit.
    pub max_reuse: Option<u32>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_pooled: 256,
            max_reuse: None,
        }
    }
}

impl PoolSettings {
    /// Settings with a resting-item cap and no reuse limit.
    #[must_use]
    pub fn with_max_pooled(max_pooled: usize) -> Self {
        Self {
            max_pooled,
            max_reuse: None,
        }
    }

    /// Set the per-item reuse limit. A limit of 0 is treated as no limit.
    #[must_use]
    pub fn max_reuse(mut self, limit: u32) -> Self {
        self.max_reuse = (limit > 0).then_some(limit);
        self
    }
}

/// Counters describing pool behaviour since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Items created by the factory.
    pub allocated: u64,
    /// Acquisitions served from a previously released item.
    pub reused: u64,
    /// Released items dropped because of `max_pooled` or `max_reuse`.
    pub evicted: u64,
    /// Times the recycled list was swapped into the primary list.
    pub refills: u64,
    /// Items currently resting in either list.
    pub resting: usize,
    /// Items currently handed out.
    pub outstanding: usize,
}

/// An item together with the number of times it has been handed out.
struct Entry<T> {
    item: T,
    uses: u32,
}

/// State shared between the acquiring handle and every outstanding [`Pooled`].
struct Shared<T> {
    recycled: Mutex<Vec<Entry<T>>>,
    reset_fn: ResetFn<T>,
    settings: PoolSettings,
    resting: AtomicUsize,
    outstanding: AtomicUsize,
    evicted: AtomicU64,
}

impl<T> Shared<T> {
    /// Reset an item and park it on the recycled list, or drop it when a limit is hit.
    fn release(&self, mut entry: Entry<T>) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);

        let worn_out = self
            .settings
            .max_reuse
            .is_some_and(|limit| entry.uses >= limit);
        if worn_out {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            trace!(
                pool_type = std::any::type_name::<T>(),
                uses = entry.uses,
                "Dropping pooled item at reuse limit"
            );
            return;
        }

        // Reserve a resting slot before paying for the reset.
        let reserved = self
            .resting
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.settings.max_pooled).then_some(n + 1)
            })
            .is_ok();
        if !reserved {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            trace!(
                pool_type = std::any::type_name::<T>(),
                max_pooled = self.settings.max_pooled,
                "Pool full, dropping released item"
            );
            return;
        }

        (self.reset_fn)(&mut entry.item);
        self.recycled.lock().push(entry);
    }
}

/// Recycling object pool with a lock-free primary list.
///
/// The pool handle itself is the only acquirer (`acquire` takes `&mut self`);
/// [`Pooled`] guards may be sent anywhere and return their item to the
/// shared recycled list when dropped.
pub struct RecyclePool<T> {
    primary: Vec<Entry<T>>,
    shared: Arc<Shared<T>>,
    factory: FactoryFn<T>,
    allocated: u64,
    reused: u64,
    refills: u64,
}

impl<T: Send + 'static> RecyclePool<T> {
    /// Create an empty pool. Items are created lazily by `factory` and reset by
    /// `reset` every time they are released.
    pub fn new<F, R>(settings: PoolSettings, factory: F, reset: R) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        Self {
            primary: Vec::new(),
            shared: Arc::new(Shared {
                recycled: Mutex::new(Vec::new()),
                reset_fn: Box::new(reset),
                settings,
                resting: AtomicUsize::new(0),
                outstanding: AtomicUsize::new(0),
                evicted: AtomicU64::new(0),
            }),
            factory: Box::new(factory),
            allocated: 0,
            reused: 0,
            refills: 0,
        }
    }

    /// Create a pool and pre-fill it with `count` items (capped at `max_pooled`).
    pub fn with_prefill<F, R>(settings: PoolSettings, count: usize, factory: F, reset: R) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        let mut pool = Self::new(settings, factory, reset);
        let count = count.min(settings.max_pooled);
        pool.primary.reserve(count);
        for _ in 0..count {
            let item = (pool.factory)();
            pool.primary.push(Entry { item, uses: 0 });
        }
        pool.allocated = count as u64;
        pool.shared.resting.store(count, Ordering::Release);
        pool
    }

    /// Hand out an item: from the primary list, else from the recycled list
    /// (swapped in under the lock), else freshly allocated.
    pub fn acquire(&mut self) -> Pooled<T> {
        if self.primary.is_empty() {
            self.refill();
        }

        let entry = match self.primary.pop() {
            Some(mut entry) => {
                self.shared.resting.fetch_sub(1, Ordering::AcqRel);
                self.reused += 1;
                entry.uses = entry.uses.saturating_add(1);
                entry
            }
            None => {
                self.allocated += 1;
                Entry {
                    item: (self.factory)(),
                    uses: 1,
                }
            }
        };

        self.shared.outstanding.fetch_add(1, Ordering::AcqRel);
        Pooled {
            entry: ManuallyDrop::new(entry),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Swap the recycled list into the (empty) primary list.
    fn refill(&mut self) {
        let mut recycled = self.shared.recycled.lock();
        if recycled.is_empty() {
            return;
        }
        std::mem::swap(&mut self.primary, &mut *recycled);
        drop(recycled);

        self.refills += 1;
        debug!(
            pool_type = std::any::type_name::<T>(),
            swapped = self.primary.len(),
            "Refilled primary pool list from recycled list"
        );
    }

    /// Snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.allocated,
            reused: self.reused,
            evicted: self.shared.evicted.load(Ordering::Relaxed),
            refills: self.refills,
            resting: self.shared.resting.load(Ordering::Acquire),
            outstanding: self.shared.outstanding.load(Ordering::Acquire),
        }
    }

    /// Settings the pool was created with.
    #[must_use]
    pub fn settings(&self) -> PoolSettings {
        self.shared.settings
    }
}

/// RAII guard for an item on loan from a [`RecyclePool`].
///
/// Dereferences to the item. Dropping the guard resets the item and returns it
/// to the pool's recycled list (or drops it if a pool limit was reached).
pub struct Pooled<T> {
    entry: ManuallyDrop<Entry<T>>,
    shared: Arc<Shared<T>>,
}

impl<T> Pooled<T> {
    /// Number of times this item has been handed out, including this loan.
    #[must_use]
    pub fn uses(&self) -> u32 {
        self.entry.uses
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.entry.item
    }
}

impl<T> DerefMut for Pooled<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entry.item
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooled")
            .field("item", &self.entry.item)
            .field("uses", &self.entry.uses)
            .finish()
    }
}

impl<T> Drop for Pooled<T> {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        // SAFETY: `entry` is only taken here, and `drop` runs at most once.
        let entry = unsafe { ManuallyDrop::take(&mut self.entry) };
        self.shared.release(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_acquire_release_reuses_item() {
        let mut pool = RecyclePool::new(PoolSettings::default(), || vec![0u32; 16], |v| v.fill(0));

        let mut item = pool.acquire();
        item[0] = 42;
        drop(item);

        let item = pool.acquire();
        assert_eq!(item[0], 0);
        assert_eq!(item.uses(), 2);

        let stats = pool.stats();
        assert_eq!(stats.allocated, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.refills, 1);
        assert_eq!(stats.outstanding, 1);
    }

    #[test]
    fn test_round_trip_preserves_capacity() {
        let mut pool = RecyclePool::new(
            PoolSettings::with_max_pooled(8),
            || Vec::<u32>::with_capacity(4000),
            Vec::clear,
        );

        let first: Vec<_> = (0..8).map(|_| pool.acquire()).collect();
        let capacities: Vec<usize> = first.iter().map(|v| v.capacity()).collect();
        drop(first);

        let second: Vec<_> = (0..8).map(|_| pool.acquire()).collect();
        let mut before = capacities;
        let mut after: Vec<usize> = second.iter().map(|v| v.capacity()).collect();
        before.sort_unstable();
        after.sort_unstable();
        assert!(after.iter().zip(&before).all(|(a, b)| a >= b));
        assert_eq!(pool.stats().allocated, 8);
    }

    #[test]
    fn test_max_pooled_evicts_excess() {
        let mut pool = RecyclePool::new(PoolSettings::with_max_pooled(2), || 0u8, |_| {});

        let items: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        drop(items);

        let stats = pool.stats();
        assert_eq!(stats.resting, 2);
        assert_eq!(stats.evicted, 3);
        assert_eq!(stats.outstanding, 0);
    }

    #[test]
    fn test_max_reuse_forces_fresh_allocation() {
        let mut pool = RecyclePool::new(PoolSettings::default().max_reuse(2), || 7u64, |_| {});

        drop(pool.acquire()); // uses = 1, recycled
        drop(pool.acquire()); // uses = 2, dropped at limit
        let item = pool.acquire();
        assert_eq!(item.uses(), 1);

        let stats = pool.stats();
        assert_eq!(stats.allocated, 2);
        assert_eq!(stats.evicted, 1);
    }

    #[test]
    fn test_reset_called_once_per_release() {
        let resets = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resets);
        let mut pool = RecyclePool::new(PoolSettings::default(), || 0i32, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        drop(pool.acquire());
        drop(pool.acquire());
        assert_eq!(resets.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_prefill_serves_without_allocating() {
        let mut pool = RecyclePool::with_prefill(PoolSettings::default(), 4, || 1u16, |_| {});
        let items: Vec<_> = (0..4).map(|_| pool.acquire()).collect();
        assert_eq!(items.len(), 4);
        assert_eq!(pool.stats().allocated, 4);
        assert_eq!(pool.stats().reused, 4);
    }

    #[test]
    fn test_release_from_other_threads() {
        let mut pool = RecyclePool::new(PoolSettings::with_max_pooled(64), || 0usize, |v| *v = 0);
        let (tx, rx) = crossbeam_channel::bounded::<Pooled<usize>>(8);

        let releaser = std::thread::spawn(move || {
            let mut seen = 0;
            for item in rx {
                seen += 1;
                drop(item);
            }
            seen
        });

        for i in 0..200 {
            let mut item = pool.acquire();
            *item = i;
            tx.send(item).unwrap();
        }
        drop(tx);
        assert_eq!(releaser.join().unwrap(), 200);

        let stats = pool.stats();
        assert_eq!(stats.outstanding, 0);
        assert!(stats.allocated <= 200);
        assert!(stats.resting <= 64);
    }

    #[test]
    fn test_no_item_handed_out_twice() {
        let mut pool = RecyclePool::new(PoolSettings::default(), || Box::new(0u32), |_| {});
        drop(pool.acquire());
        drop(pool.acquire());

        let held: Vec<_> = (0..10).map(|_| pool.acquire()).collect();
        let mut addrs: Vec<usize> = held.iter().map(|b| &***b as *const u32 as usize).collect();
        addrs.sort_unstable();
        addrs.dedup();
        assert_eq!(addrs.len(), 10);
    }
}
