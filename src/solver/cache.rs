use crate::config::CacheEviction;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub peak_size: usize,
    pub avg_get: Duration,
    pub avg_put: Duration,
}

struct Entry<V> {
    value: V,
    /// (policy priority, tick), the eviction order key
    order: (u64, u64),
    uses: u64,
}

struct Inner<K: Ord, V> {
    entries: HashMap<K, Entry<V>>,
    /// eviction queue; the minimum element is evicted first
    queue: BTreeSet<(u64, u64, K)>,
    tick: u64,
}

/// A bounded cache in front of the raw infoset table. Eviction policy
/// is configurable (LRU by default); evicting an entry never touches
/// the underlying record. Thread safe behind one mutex, so callers
/// batch where contention matters.
pub struct BoundedCache<K: Ord + std::hash::Hash + Clone, V: Clone> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    policy: CacheEviction,
    timed: bool,
    stats: Mutex<CacheStats>,
    get_time: Mutex<(Duration, u64)>,
    put_time: Mutex<(Duration, u64)>,
}

impl<K: Ord + std::hash::Hash + Clone, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: usize, policy: CacheEviction) -> Self {
        assert!(capacity > 0);
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                queue: BTreeSet::new(),
                tick: 0,
            }),
            capacity,
            policy,
            timed: false,
            stats: Mutex::new(CacheStats::default()),
            get_time: Mutex::new((Duration::ZERO, 0)),
            put_time: Mutex::new((Duration::ZERO, 0)),
        }
    }

    /// enable get/put latency accounting
    pub fn timed(mut self) -> Self {
        self.timed = true;
        self
    }

    fn priority(&self, uses: u64) -> u64 {
        match self.policy {
            CacheEviction::Lru | CacheEviction::Fifo => 0,
            CacheEviction::Lfu => uses,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let started = self.timed.then(Instant::now);
        let mut inner = self.inner.lock();
        let found = inner
            .entries
            .get(key)
            .map(|e| (e.value.clone(), e.order, e.uses + 1));
        let result = match found {
            None => None,
            Some((value, old, uses)) => {
                // FIFO never reorders on access
                if self.policy != CacheEviction::Fifo {
                    inner.tick += 1;
                    let order = (self.priority(uses), inner.tick);
                    inner.queue.remove(&(old.0, old.1, key.clone()));
                    inner.queue.insert((order.0, order.1, key.clone()));
                    let entry = inner.entries.get_mut(key).expect("present");
                    entry.order = order;
                    entry.uses = uses;
                } else {
                    inner.entries.get_mut(key).expect("present").uses = uses;
                }
                Some(value)
            }
        };
        drop(inner);
        let mut stats = self.stats.lock();
        match result {
            Some(_) => stats.hits += 1,
            None => stats.misses += 1,
        }
        drop(stats);
        if let Some(started) = started {
            let mut timing = self.get_time.lock();
            timing.0 += started.elapsed();
            timing.1 += 1;
        }
        result
    }

    pub fn put(&self, key: K, value: V) {
        let started = self.timed.then(Instant::now);
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        if let Some(old) = inner.entries.remove(&key) {
            inner.queue.remove(&(old.order.0, old.order.1, key.clone()));
        }
        while inner.entries.len() >= self.capacity {
            let victim = inner.queue.iter().next().cloned().expect("queue in sync");
            inner.queue.remove(&victim);
            inner.entries.remove(&victim.2);
            self.stats.lock().evictions += 1;
        }
        let order = (self.priority(0), tick);
        inner.queue.insert((order.0, order.1, key.clone()));
        inner.entries.insert(
            key,
            Entry {
                value,
                order,
                uses: 0,
            },
        );
        let size = inner.entries.len();
        drop(inner);
        let mut stats = self.stats.lock();
        stats.peak_size = stats.peak_size.max(size);
        drop(stats);
        if let Some(started) = started {
            let mut timing = self.put_time.lock();
            timing.0 += started.elapsed();
            timing.1 += 1;
        }
    }

    pub fn batch_get(&self, keys: &[K]) -> Vec<Option<V>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    pub fn batch_put(&self, pairs: Vec<(K, V)>) {
        for (key, value) in pairs {
            self.put(key, value);
        }
    }

    /// resolve through the cache, falling back to `create` on a miss
    pub fn get_or_create(&self, key: K, create: impl FnOnce() -> V) -> V {
        match self.get(&key) {
            Some(value) => value,
            None => {
                let value = create();
                self.put(key, value.clone());
                value
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.queue.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().clone();
        let get = self.get_time.lock();
        let put = self.put_time.lock();
        if get.1 > 0 {
            stats.avg_get = get.0 / get.1 as u32;
        }
        if put.1 > 0 {
            stats.avg_put = put.0 / put.1 as u32;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lru(capacity: usize) -> BoundedCache<u64, u64> {
        BoundedCache::new(capacity, CacheEviction::Lru)
    }

    #[test]
    fn get_after_put() {
        let cache = lru(4);
        cache.put(1, 10);
        assert_eq!(cache.get(&1), Some(10));
        assert_eq!(cache.get(&2), None);
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let cache = lru(2);
        cache.put(1, 10);
        cache.put(2, 20);
        cache.get(&1); // 2 is now least recently used
        cache.put(3, 30);
        assert_eq!(cache.get(&1), Some(10));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&3), Some(30));
    }

    #[test]
    fn fifo_ignores_access_order() {
        let cache = BoundedCache::new(2, CacheEviction::Fifo);
        cache.put(1, 10);
        cache.put(2, 20);
        cache.get(&1);
        cache.put(3, 30); // evicts 1, the oldest insert
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(20));
    }

    #[test]
    fn lfu_evicts_least_frequently_used() {
        let cache = BoundedCache::new(2, CacheEviction::Lfu);
        cache.put(1, 10);
        cache.put(2, 20);
        cache.get(&1);
        cache.get(&1);
        cache.get(&2);
        cache.put(3, 30); // evicts 2: fewer uses than 1
        assert_eq!(cache.get(&1), Some(10));
        assert_eq!(cache.get(&2), None);
    }

    #[test]
    fn put_replaces_existing() {
        let cache = lru(2);
        cache.put(1, 10);
        cache.put(1, 11);
        assert_eq!(cache.get(&1), Some(11));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn capacity_is_respected() {
        let cache = lru(8);
        for i in 0..100 {
            cache.put(i, i);
        }
        assert_eq!(cache.len(), 8);
        assert_eq!(cache.stats().evictions, 92);
        assert_eq!(cache.stats().peak_size, 8);
    }

    #[test]
    fn batch_round_trip() {
        let cache = lru(8);
        cache.batch_put((0..4).map(|i| (i, i * 10)).collect());
        let got = cache.batch_get(&[0, 1, 9]);
        assert_eq!(got, vec![Some(0), Some(10), None]);
    }

    #[test]
    fn get_or_create_fills_misses() {
        let cache = lru(4);
        assert_eq!(cache.get_or_create(7, || 70), 70);
        assert_eq!(cache.get(&7), Some(70));
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert!(stats.hits >= 1);
    }

    #[test]
    fn timing_is_collected_when_enabled() {
        let cache = BoundedCache::new(4, CacheEviction::Lru).timed();
        cache.put(1, 1);
        cache.get(&1);
        let stats = cache.stats();
        assert!(stats.avg_put > Duration::ZERO || stats.avg_get >= Duration::ZERO);
    }
}
