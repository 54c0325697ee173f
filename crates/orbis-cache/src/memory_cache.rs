//! The memory cache and its listener seam.
//!
//! Every entry carries a size in caller-defined units (usually bytes) and a recency stamp
//! drawn from a per-cache monotonic counter. Reads and writes advance the counter, so the
//! stamp order is total and entries inserted earlier always sort before later ones when
//! neither has been touched since. All state lives behind one mutex; listeners run after
//! the lock is released and must not assume they can observe the removed entry.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::CacheError;

/// Receives every entry that leaves the cache, whether evicted, replaced, removed or
/// cleared. Implementations must not call back into the same cache synchronously.
pub trait MemoryCacheListener<K, V>: Send + Sync {
    fn entry_removed(&self, key: &K, value: &V);
}

impl<K, V, F> MemoryCacheListener<K, V> for F
where
    F: Fn(&K, &V) + Send + Sync,
{
    fn entry_removed(&self, key: &K, value: &V) {
        self(key, value)
    }
}

/// Values that know their own cache footprint.
pub trait Cacheable {
    fn size_in_bytes(&self) -> usize;
}

/// Running counters for a cache instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Entry<V> {
    value: V,
    size: usize,
    last_used: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Recency index: `last_used` stamp to key, oldest first.
    order: BTreeMap<u64, K>,
    capacity: usize,
    low_water: usize,
    used: usize,
    clock: u64,
    stats: CacheStats,
    listeners: Vec<Arc<dyn MemoryCacheListener<K, V>>>,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (k, entry) = self.entries.remove_entry(key)?;
        self.order.remove(&entry.last_used);
        self.used -= entry.size;
        Some((k, entry.value))
    }

    /// Evict oldest entries, never `keep`, until usage reaches the low-water mark.
    fn evict_to_low_water(&mut self, keep: Option<&K>, removed: &mut Vec<(K, V)>) {
        let mut cursor = None;
        while self.used > self.low_water {
            let next = match cursor {
                None => self.order.iter().next(),
                Some(after) => self.order.range((after + 1)..).next(),
            };
            let Some((&stamp, key)) = next else {
                break;
            };
            if keep == Some(key) {
                cursor = Some(stamp);
                continue;
            }
            let key = key.clone();
            if let Some(pair) = self.remove::<K>(&key) {
                self.stats.evictions += 1;
                removed.push(pair);
            }
        }
    }
}

/// A capacity-bounded cache with LRU eviction to a low-water mark.
///
/// Usage invariant: `used_capacity()` always equals the sum of the sizes of the live
/// entries, and after any `put` returns it does not exceed `capacity()`.
pub struct MemoryCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache. `low_water` must be strictly below a non-zero `capacity`.
    pub fn new(capacity: usize, low_water: usize) -> Result<Self, CacheError> {
        validate_bounds(capacity, low_water)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                capacity,
                low_water,
                used: 0,
                clock: 0,
                stats: CacheStats::default(),
                listeners: Vec::new(),
            }),
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    #[must_use]
    pub fn low_water(&self) -> usize {
        self.inner.lock().low_water
    }

    #[must_use]
    pub fn used_capacity(&self) -> usize {
        self.inner.lock().used
    }

    #[must_use]
    pub fn free_capacity(&self) -> usize {
        let inner = self.inner.lock();
        inner.capacity.saturating_sub(inner.used)
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().entries.contains_key(key)
    }

    /// Look up `key`, marking the entry as most recently used. A miss is not an error.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let stamp = inner.tick();
        let Some(entry) = inner.entries.get_mut(key) else {
            inner.stats.misses += 1;
            return None;
        };
        let old = std::mem::replace(&mut entry.last_used, stamp);
        let value = entry.value.clone();
        if let Some(k) = inner.order.remove(&old) {
            inner.order.insert(stamp, k);
        }
        inner.stats.hits += 1;
        Some(value)
    }

    /// Insert or replace the entry for `key`.
    ///
    /// Fails with [`CacheError::InvalidSize`] and leaves the cache unchanged when `size` is
    /// zero or larger than the capacity. When the insertion pushes usage above capacity,
    /// least-recently-used entries are evicted until usage is at or below the low-water
    /// mark; the new entry itself is never chosen.
    pub fn put(&self, value: V, key: K, size: usize) -> Result<(), CacheError> {
        let mut removed = Vec::new();
        let listeners = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if size < 1 || size > inner.capacity {
                return Err(CacheError::InvalidSize {
                    size,
                    capacity: inner.capacity,
                });
            }

            if let Some(old) = inner.remove::<K>(&key) {
                removed.push(old);
            }

            let stamp = inner.tick();
            inner.order.insert(stamp, key.clone());
            inner.entries.insert(
                key.clone(),
                Entry {
                    value,
                    size,
                    last_used: stamp,
                },
            );
            inner.used += size;

            if inner.used > inner.capacity {
                let before = removed.len();
                inner.evict_to_low_water(Some(&key), &mut removed);
                log::debug!(
                    "Memory cache evicted {} entries, {} of {} used",
                    removed.len() - before,
                    inner.used,
                    inner.capacity
                );
            }
            snapshot_listeners(inner, &removed)
        };
        notify(&listeners, &removed);
        Ok(())
    }

    /// Remove the entry for `key`, notifying listeners. Returns the removed value.
    pub fn remove_entry_for_key<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (listeners, removed) = {
            let mut inner = self.inner.lock();
            let removed: Vec<(K, V)> = inner.remove(key).into_iter().collect();
            (snapshot_listeners(&inner, &removed), removed)
        };
        notify(&listeners, &removed);
        removed.into_iter().next().map(|(_, v)| v)
    }

    /// Remove every entry, notifying listeners once per entry.
    pub fn clear(&self) {
        let (listeners, removed) = {
            let mut inner = self.inner.lock();
            let mut removed = Vec::with_capacity(inner.entries.len());
            let order = std::mem::take(&mut inner.order);
            for (_, key) in order {
                if let Some(entry) = inner.entries.remove(&key) {
                    removed.push((key, entry.value));
                }
            }
            inner.used = 0;
            (snapshot_listeners(&inner, &removed), removed)
        };
        notify(&listeners, &removed);
    }

    /// Change the capacity. Shrinking below current usage evicts immediately.
    pub fn set_capacity(&self, capacity: usize) -> Result<(), CacheError> {
        let mut removed = Vec::new();
        let listeners = {
            let mut inner = self.inner.lock();
            validate_bounds(capacity, inner.low_water)?;
            inner.capacity = capacity;
            if inner.used > inner.capacity {
                inner.evict_to_low_water(None, &mut removed);
            }
            snapshot_listeners(&inner, &removed)
        };
        notify(&listeners, &removed);
        Ok(())
    }

    pub fn set_low_water(&self, low_water: usize) -> Result<(), CacheError> {
        let mut inner = self.inner.lock();
        validate_bounds(inner.capacity, low_water)?;
        inner.low_water = low_water;
        Ok(())
    }

    /// Register a listener. Registering the same listener twice is allowed; it is then
    /// notified twice per removal.
    pub fn add_listener(&self, listener: Arc<dyn MemoryCacheListener<K, V>>) {
        self.inner.lock().listeners.push(listener);
    }

    /// Unregister every registration of `listener`. Unknown listeners are ignored.
    pub fn remove_listener(&self, listener: &Arc<dyn MemoryCacheListener<K, V>>) {
        self.inner
            .lock()
            .listeners
            .retain(|l| !std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)));
    }
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Cacheable,
{
    /// Insert a value sized by its own [`Cacheable::size_in_bytes`].
    pub fn put_cacheable(&self, value: V, key: K) -> Result<(), CacheError> {
        let size = value.size_in_bytes();
        self.put(value, key, size)
    }
}

fn validate_bounds(capacity: usize, low_water: usize) -> Result<(), CacheError> {
    if capacity == 0 || low_water >= capacity {
        return Err(CacheError::InvalidCapacity {
            capacity,
            low_water,
        });
    }
    Ok(())
}

type ListenerList<K, V> = Vec<Arc<dyn MemoryCacheListener<K, V>>>;

fn snapshot_listeners<K, V>(inner: &Inner<K, V>, removed: &[(K, V)]) -> ListenerList<K, V> {
    if removed.is_empty() {
        Vec::new()
    } else {
        inner.listeners.clone()
    }
}

/// Deliver removals to every listener. A panicking listener is logged and skipped.
fn notify<K, V>(listeners: &[Arc<dyn MemoryCacheListener<K, V>>], removed: &[(K, V)]) {
    for (key, value) in removed {
        for listener in listeners {
            let result = catch_unwind(AssertUnwindSafe(|| listener.entry_removed(key, value)));
            if result.is_err() {
                log::error!("Memory cache listener panicked while handling a removed entry");
            }
        }
    }
}
