use super::cache::BoundedCache;
use super::cache::CacheStats;
use super::infoset::InfoKey;
use super::infoset::InfoSet;
use crate::config::ResourceConfig;
use crate::error::SolverError;
use crate::tree::node::NodeIndex;
use crate::tree::path::Path;
use crate::tree::street::Street;
use crate::tree::tree::GameTree;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// how cumulative regrets absorb a new delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRule {
    /// plain accumulation
    Vanilla,
    /// floor the running sum at zero after every update
    CfrPlus,
}

/// a stable reference to a record, resolved once per visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub key: InfoKey,
    pub shard: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub count: usize,
    pub bytes_est: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub peak_size: usize,
}

/// Owns every InfoSet record. Records live in a table sharded over a
/// fixed power-of-two pool of mutexes; a record's shard is
/// `hash(key) & (pool - 1)`, so all mutations of one record serialize
/// through one lock. Records are created lazily on first visit and
/// only destroyed by pruning or teardown.
pub struct InfoSetStore {
    shards: Vec<Mutex<HashMap<InfoKey, InfoSet>>>,
    mask: usize,
    strict: bool,
    /// bounded lookup cache in front of the raw table; evicting a
    /// cache entry never touches the record behind it
    cache: BoundedCache<InfoKey, Handle>,
    next_id: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    peak: AtomicUsize,
    count: AtomicUsize,
    bytes: AtomicU64,
}

impl InfoSetStore {
    pub fn new(resources: &ResourceConfig) -> Self {
        let pool = resources.lock_pool_size.next_power_of_two();
        Self {
            shards: (0..pool).map(|_| Mutex::new(HashMap::new())).collect(),
            mask: pool - 1,
            strict: true,
            cache: BoundedCache::new(resources.cache_max_entries, resources.cache_eviction),
            next_id: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            peak: AtomicUsize::new(0),
            count: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// tolerant stores log and skip shape mismatches instead of failing
    pub fn tolerant(mut self) -> Self {
        self.strict = false;
        self
    }

    fn shard_of(&self, key: &InfoKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish() as usize & self.mask
    }

    /// idempotent: returns the same handle whether or not the record
    /// already existed, leaving last_iteration untouched
    pub fn get_or_create(&self, key: InfoKey, num_actions: usize) -> Handle {
        let shard = self.shard_of(&key);
        let mut table = self.shards[shard].lock();
        match table.get(&key) {
            Some(record) => {
                debug_assert!(record.num_actions() == num_actions);
                self.hits.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let record = InfoSet::new(id, num_actions);
                self.bytes.fetch_add(record.bytes() as u64, Ordering::Relaxed);
                table.insert(key, record);
                self.misses.fetch_add(1, Ordering::Relaxed);
                let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
                self.peak.fetch_max(count, Ordering::Relaxed);
            }
        }
        Handle { key, shard }
    }

    /// resolve through the lookup cache, hitting the raw table only
    /// on a cache miss. pruning clears the cache, so a cached handle
    /// always refers to a live record.
    pub fn get_or_create_cached(&self, key: InfoKey, num_actions: usize) -> Handle {
        match self.cache.get(&key) {
            Some(handle) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                handle
            }
            None => {
                let handle = self.get_or_create(key, num_actions);
                self.cache.put(key, handle);
                handle
            }
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// clone a record out by key, without creating it
    pub fn lookup(&self, key: &InfoKey) -> Option<InfoSet> {
        self.shards[self.shard_of(key)].lock().get(key).cloned()
    }

    pub fn read_regrets(&self, handle: &Handle) -> Vec<f64> {
        self.shards[handle.shard]
            .lock()
            .get(&handle.key)
            .map(|r| r.regrets.clone())
            .unwrap_or_default()
    }

    pub fn read_strategy_sum(&self, handle: &Handle) -> Vec<f64> {
        self.shards[handle.shard]
            .lock()
            .get(&handle.key)
            .map(|r| r.strategy_sum.clone())
            .unwrap_or_default()
    }

    /// accumulate a regret delta vector under the shard lock.
    /// CFR+ floors each running sum at zero; the record's
    /// last_iteration advances to `iter`.
    pub fn update_regrets(
        &self,
        handle: &Handle,
        deltas: &[f64],
        iter: u64,
        rule: UpdateRule,
    ) -> Result<(), SolverError> {
        let mut table = self.shards[handle.shard].lock();
        let record = match table.get_mut(&handle.key) {
            Some(record) => record,
            None => return Ok(()), // evicted since resolution; recreated on next visit
        };
        if record.num_actions() != deltas.len() {
            return self.mismatch(record.num_actions(), deltas.len());
        }
        for (regret, delta) in record.regrets.iter_mut().zip(deltas.iter()) {
            *regret += delta;
            if rule == UpdateRule::CfrPlus {
                *regret = regret.max(0.0);
            }
        }
        record.last_iteration = iter;
        Ok(())
    }

    /// accumulate `weight * strategy` into the strategy sums
    pub fn update_strategy_sum(
        &self,
        handle: &Handle,
        strategy: &[f64],
        weight: f64,
    ) -> Result<(), SolverError> {
        let mut table = self.shards[handle.shard].lock();
        let record = match table.get_mut(&handle.key) {
            Some(record) => record,
            None => return Ok(()),
        };
        if record.num_actions() != strategy.len() {
            return self.mismatch(record.num_actions(), strategy.len());
        }
        for (sum, sigma) in record.strategy_sum.iter_mut().zip(strategy.iter()) {
            *sum += weight * sigma;
        }
        Ok(())
    }

    fn mismatch(&self, expected: usize, got: usize) -> Result<(), SolverError> {
        if self.strict {
            Err(SolverError::InfoSetShapeMismatch { expected, got })
        } else {
            log::warn!("skipping update: vector of {} against {} actions", got, expected);
            Ok(())
        }
    }

    /// normalized strategy_sum, or uniform when nothing accumulated
    pub fn average_strategy(&self, handle: &Handle) -> Vec<f64> {
        super::policy::average(&self.read_strategy_sum(handle))
    }

    /// drop records untouched for more than `max_inactive` iterations
    pub fn prune(&self, iter: u64, max_inactive: u64) -> usize {
        self.cache.clear();
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut table = shard.lock();
            table.retain(|_, record| {
                let stale = iter.saturating_sub(record.last_iteration) > max_inactive;
                if stale {
                    removed += 1;
                    self.bytes.fetch_sub(record.bytes() as u64, Ordering::Relaxed);
                }
                !stale
            });
        }
        self.count.fetch_sub(removed, Ordering::Relaxed);
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// drop records whose betting line no longer exists in the tree
    pub fn prune_unreferenced(&self, indexer: &Indexer) -> usize {
        self.cache.clear();
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut table = shard.lock();
            table.retain(|key, record| {
                let live = indexer.contains(key.seat, key.street, key.history);
                if !live {
                    removed += 1;
                    self.bytes.fetch_sub(record.bytes() as u64, Ordering::Relaxed);
                }
                live
            });
        }
        self.count.fetch_sub(removed, Ordering::Relaxed);
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        StoreStats {
            count: self.len(),
            bytes_est: self.bytes.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            evictions: self.evictions.load(Ordering::Relaxed),
            peak_size: self.peak.load(Ordering::Relaxed),
        }
    }

    /// stable, ordered dump of every record; the checkpoint format
    /// and the metrics pass both build on this
    pub fn records(&self) -> BTreeMap<InfoKey, InfoSet> {
        let mut all = BTreeMap::new();
        for shard in self.shards.iter() {
            for (key, record) in shard.lock().iter() {
                all.insert(*key, record.clone());
            }
        }
        all
    }

    /// map-reduce over all records in parallel, one shard per task
    pub fn fold<A, M, R>(&self, map: M, zero: A, reduce: R) -> A
    where
        A: Send + Sync + Clone,
        M: Fn(&InfoKey, &InfoSet) -> A + Sync,
        R: Fn(A, A) -> A + Sync + Send,
    {
        use rayon::prelude::*;
        self.shards
            .par_iter()
            .map(|shard| {
                shard
                    .lock()
                    .iter()
                    .map(|(k, v)| map(k, v))
                    .fold(zero.clone(), &reduce)
            })
            .reduce(|| zero.clone(), &reduce)
    }

    /// replace all live state with the given records. restoring twice
    /// with the same records is idempotent.
    pub fn restore(&self, records: impl IntoIterator<Item = (InfoKey, InfoSet)>) {
        self.cache.clear();
        for shard in self.shards.iter() {
            shard.lock().clear();
        }
        self.count.store(0, Ordering::Relaxed);
        self.bytes.store(0, Ordering::Relaxed);
        let mut max_id = 0;
        let mut count = 0;
        for (key, record) in records {
            max_id = max_id.max(record.id + 1);
            count += 1;
            self.bytes.fetch_add(record.bytes() as u64, Ordering::Relaxed);
            let shard = self.shard_of(&key);
            self.shards[shard].lock().insert(key, record);
        }
        self.count.store(count, Ordering::Relaxed);
        self.peak.fetch_max(count, Ordering::Relaxed);
        self.next_id.store(max_id, Ordering::Relaxed);
    }
}

/// The bidirectional map between tree nodes and infoset base keys,
/// built once per tree shape. Keeping both directions from the outset
/// is what lets pruning reconcile integer node ids with card-keyed
/// records.
pub struct Indexer {
    by_node: HashMap<NodeIndex, (u8, Street, Path)>,
    by_base: HashMap<(u8, Street, Path), Vec<NodeIndex>>,
}

impl From<&GameTree> for Indexer {
    fn from(tree: &GameTree) -> Self {
        let mut by_node = HashMap::new();
        let mut by_base: HashMap<_, Vec<NodeIndex>> = HashMap::new();
        for node in tree.player_nodes() {
            let base = node.base_key().expect("player node");
            by_node.insert(node.id, base);
            by_base.entry(base).or_default().push(node.id);
        }
        Self { by_node, by_base }
    }
}

impl Indexer {
    pub fn base_of(&self, node: NodeIndex) -> Option<&(u8, Street, Path)> {
        self.by_node.get(&node)
    }
    pub fn nodes_of(&self, seat: u8, street: Street, history: Path) -> &[NodeIndex] {
        self.by_base
            .get(&(seat, street, history))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
    pub fn contains(&self, seat: u8, street: Street, history: Path) -> bool {
        self.by_base.contains_key(&(seat, street, history))
    }
    pub fn len(&self) -> usize {
        self.by_node.len()
    }
    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arbitrary;

    fn store() -> InfoSetStore {
        InfoSetStore::new(&ResourceConfig::default())
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = store();
        let key = InfoKey::random();
        let a = store.get_or_create(key, 3);
        let b = store.get_or_create(key, 3);
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn fresh_records_are_zeroed() {
        let store = store();
        let handle = store.get_or_create(InfoKey::random(), 3);
        assert_eq!(store.read_regrets(&handle), vec![0.0; 3]);
        assert_eq!(store.read_strategy_sum(&handle), vec![0.0; 3]);
    }

    #[test]
    fn vanilla_updates_accumulate() {
        let store = store();
        let handle = store.get_or_create(InfoKey::random(), 2);
        store
            .update_regrets(&handle, &[2.0, -5.0], 1, UpdateRule::Vanilla)
            .unwrap();
        store
            .update_regrets(&handle, &[1.0, -1.0], 2, UpdateRule::Vanilla)
            .unwrap();
        assert_eq!(store.read_regrets(&handle), vec![3.0, -6.0]);
    }

    #[test]
    fn cfr_plus_floors_at_zero() {
        let store = store();
        let handle = store.get_or_create(InfoKey::random(), 2);
        store
            .update_regrets(&handle, &[2.0, 1.0], 1, UpdateRule::CfrPlus)
            .unwrap();
        store
            .update_regrets(&handle, &[-5.0, 1.0], 2, UpdateRule::CfrPlus)
            .unwrap();
        assert_eq!(store.read_regrets(&handle), vec![0.0, 2.0]);
    }

    #[test]
    fn strategy_sums_are_weighted() {
        let store = store();
        let handle = store.get_or_create(InfoKey::random(), 2);
        store
            .update_strategy_sum(&handle, &[0.6, 0.4], 1.0)
            .unwrap();
        store
            .update_strategy_sum(&handle, &[0.5, 0.5], 2.0)
            .unwrap();
        assert_eq!(store.read_strategy_sum(&handle), vec![1.6, 1.4]);
    }

    #[test]
    fn shape_mismatch_is_fatal_in_strict_mode() {
        let store = store();
        let handle = store.get_or_create(InfoKey::random(), 3);
        let result = store.update_regrets(&handle, &[1.0, 2.0], 1, UpdateRule::Vanilla);
        assert!(matches!(
            result,
            Err(SolverError::InfoSetShapeMismatch { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn shape_mismatch_is_skipped_in_tolerant_mode() {
        let store = InfoSetStore::new(&ResourceConfig::default()).tolerant();
        let handle = store.get_or_create(InfoKey::random(), 3);
        assert!(store
            .update_regrets(&handle, &[1.0, 2.0], 1, UpdateRule::Vanilla)
            .is_ok());
        assert_eq!(store.read_regrets(&handle), vec![0.0; 3]);
    }

    #[test]
    fn prune_removes_stale_records() {
        let store = store();
        let old = store.get_or_create(InfoKey::random(), 2);
        let new = store.get_or_create(InfoKey::random(), 2);
        store
            .update_regrets(&old, &[1.0, 1.0], 1, UpdateRule::Vanilla)
            .unwrap();
        store
            .update_regrets(&new, &[1.0, 1.0], 100, UpdateRule::Vanilla)
            .unwrap();
        let removed = store.prune(100, 50);
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn evicted_records_recreate_zeroed() {
        let store = store();
        let key = InfoKey::random();
        let handle = store.get_or_create(key, 2);
        store
            .update_regrets(&handle, &[5.0, 5.0], 1, UpdateRule::Vanilla)
            .unwrap();
        store.prune(100, 10);
        let handle = store.get_or_create(key, 2);
        assert_eq!(store.read_regrets(&handle), vec![0.0, 0.0]);
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let store = store();
        let key = InfoKey::random();
        store.get_or_create(key, 2);
        store.get_or_create(key, 2);
        store.get_or_create(key, 2);
        let stats = store.stats();
        assert_eq!(stats.count, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!(stats.bytes_est > 0);
        assert_eq!(stats.peak_size, 1);
    }

    #[test]
    fn restore_discards_live_state() {
        let store = store();
        let live = store.get_or_create(InfoKey::random(), 2);
        store
            .update_regrets(&live, &[9.0, 9.0], 1, UpdateRule::Vanilla)
            .unwrap();
        let key = InfoKey::random();
        let mut record = InfoSet::new(0, 2);
        record.regrets = vec![1.0, 2.0];
        store.restore(vec![(key, record.clone())]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.records().get(&key), Some(&record));
    }

    #[test]
    fn fold_reduces_over_all_records() {
        let store = store();
        for _ in 0..10 {
            store.get_or_create(InfoKey::random(), 2);
        }
        let total = store.fold(|_, _| 1usize, 0, |a, b| a + b);
        assert_eq!(total, store.len());
    }

    #[test]
    fn cached_resolution_matches_raw() {
        let store = store();
        let key = InfoKey::random();
        let cached = store.get_or_create_cached(key, 3);
        let raw = store.get_or_create(key, 3);
        assert_eq!(cached, raw);
        // a second cached lookup is served without touching the table
        let again = store.get_or_create_cached(key, 3);
        assert_eq!(again, raw);
        assert!(store.cache_stats().hits >= 1);
    }

    #[test]
    fn cache_is_cleared_by_pruning() {
        let store = store();
        let key = InfoKey::random();
        let handle = store.get_or_create_cached(key, 2);
        store
            .update_regrets(&handle, &[1.0, 1.0], 1, UpdateRule::Vanilla)
            .unwrap();
        store.prune(100, 10);
        // the record was evicted; a cached handle must not resurrect it
        let handle = store.get_or_create_cached(key, 2);
        assert_eq!(store.read_regrets(&handle), vec![0.0, 0.0]);
    }

    #[test]
    fn indexer_is_bidirectional() {
        let tree = GameTree::build(crate::config::GameParams::default()).unwrap();
        let indexer = Indexer::from(&tree);
        assert!(!indexer.is_empty());
        for node in tree.player_nodes() {
            let base = indexer.base_of(node.id).expect("indexed");
            assert!(indexer.nodes_of(base.0, base.1, base.2).contains(&node.id));
        }
    }
}
