use super::traversal::Deal;
use crate::config::LoadBalancing;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// One unit of traversal work: a deal plus the seed its per-item rng
/// derives from. Seeds are fixed when the item is created, so every
/// distribution policy samples the same chance events for the same
/// item; policies differ only in float summation order.
#[derive(Debug, Clone, Copy)]
pub struct WorkItem {
    pub index: usize,
    pub deal: Deal,
    pub seed: u64,
}

/// Distributes a per-iteration batch of work items over a fixed pool
/// of workers. Workers run inside one scoped spawn per iteration;
/// joining the scope is the iteration barrier, after which all
/// workers' writes are visible to the coordinator.
pub struct Scheduler {
    workers: usize,
    policy: LoadBalancing,
}

impl Scheduler {
    pub fn new(workers: usize, policy: LoadBalancing) -> Self {
        assert!(workers > 0);
        Self { workers, policy }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// run one barrier-synchronised phase. the stop flag is polled
    /// between items; a set flag drains the item in progress and
    /// exits cleanly. returns the number of items processed.
    pub fn run_iteration<F>(&self, items: Vec<WorkItem>, stop: &AtomicBool, work: F) -> usize
    where
        F: Fn(&WorkItem) + Sync,
    {
        if items.is_empty() {
            return 0;
        }
        let processed = AtomicUsize::new(0);
        match self.policy {
            LoadBalancing::Static => self.run_static(items, stop, &work, &processed),
            LoadBalancing::Dynamic => self.run_dynamic(items, stop, &work, &processed),
            LoadBalancing::WorkStealing => self.run_stealing(items, stop, &work, &processed),
        }
        processed.load(Ordering::Relaxed)
    }

    /// equal contiguous chunks, one per worker
    fn run_static<F>(
        &self,
        items: Vec<WorkItem>,
        stop: &AtomicBool,
        work: &F,
        processed: &AtomicUsize,
    ) where
        F: Fn(&WorkItem) + Sync,
    {
        let chunk = items.len().div_ceil(self.workers);
        std::thread::scope(|scope| {
            for slice in items.chunks(chunk) {
                scope.spawn(move || {
                    for item in slice {
                        if stop.load(Ordering::Relaxed) {
                            return;
                        }
                        work(item);
                        processed.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
    }

    /// shared atomic counter; workers claim one index at a time
    fn run_dynamic<F>(
        &self,
        items: Vec<WorkItem>,
        stop: &AtomicBool,
        work: &F,
        processed: &AtomicUsize,
    ) where
        F: Fn(&WorkItem) + Sync,
    {
        let cursor = AtomicUsize::new(0);
        let items = &items;
        let cursor = &cursor;
        std::thread::scope(|scope| {
            for _ in 0..self.workers {
                scope.spawn(move || loop {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    let claim = cursor.fetch_add(1, Ordering::Relaxed);
                    match items.get(claim) {
                        None => return,
                        Some(item) => {
                            work(item);
                            processed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });
    }

    /// per-worker deques seeded round-robin; an idle worker steals
    /// half of the longest other deque
    fn run_stealing<F>(
        &self,
        items: Vec<WorkItem>,
        stop: &AtomicBool,
        work: &F,
        processed: &AtomicUsize,
    ) where
        F: Fn(&WorkItem) + Sync,
    {
        let deques: Vec<Mutex<VecDeque<WorkItem>>> =
            (0..self.workers).map(|_| Mutex::new(VecDeque::new())).collect();
        for (index, item) in items.into_iter().enumerate() {
            deques[index % self.workers].lock().push_back(item);
        }
        let deques = &deques;
        std::thread::scope(|scope| {
            for me in 0..self.workers {
                scope.spawn(move || loop {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    let item = deques[me].lock().pop_front();
                    match item {
                        Some(item) => {
                            work(&item);
                            processed.fetch_add(1, Ordering::Relaxed);
                        }
                        None => match Self::steal(deques, me) {
                            Some(item) => {
                                work(&item);
                                processed.fetch_add(1, Ordering::Relaxed);
                            }
                            None => return,
                        },
                    }
                });
            }
        });
    }

    /// take half of the longest deque, keeping one item to work now
    fn steal(deques: &[Mutex<VecDeque<WorkItem>>], me: usize) -> Option<WorkItem> {
        let victim = deques
            .iter()
            .enumerate()
            .filter(|(who, _)| *who != me)
            .map(|(who, deque)| (who, deque.lock().len()))
            .max_by_key(|(_, len)| *len)
            .filter(|(_, len)| *len > 0)
            .map(|(who, _)| who)?;
        let mut theirs = deques[victim].lock();
        let n = theirs.len();
        if n == 0 {
            return None;
        }
        let taken: Vec<WorkItem> = theirs.drain(..n.div_ceil(2)).collect();
        drop(theirs);
        let mut mine = deques[me].lock();
        let (first, rest) = taken.split_first().expect("at least one stolen");
        mine.extend(rest.iter().copied());
        Some(*first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn items(n: usize) -> Vec<WorkItem> {
        let mut rng = SmallRng::seed_from_u64(11);
        (0..n)
            .map(|index| WorkItem {
                index,
                deal: Deal::random(&mut rng),
                seed: index as u64,
            })
            .collect()
    }

    fn run(policy: LoadBalancing, n: usize, workers: usize) -> Vec<usize> {
        let scheduler = Scheduler::new(workers, policy);
        let stop = AtomicBool::new(false);
        let seen = Mutex::new(Vec::new());
        let processed = scheduler.run_iteration(items(n), &stop, |item| {
            seen.lock().push(item.index);
        });
        let seen = seen.into_inner();
        assert_eq!(processed, seen.len());
        seen
    }

    #[test]
    fn static_processes_everything_once() {
        let seen = run(LoadBalancing::Static, 100, 4);
        assert_eq!(seen.len(), 100);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 100);
    }

    #[test]
    fn dynamic_processes_everything_once() {
        let seen = run(LoadBalancing::Dynamic, 101, 3);
        assert_eq!(seen.len(), 101);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 101);
    }

    #[test]
    fn stealing_processes_everything_once() {
        let seen = run(LoadBalancing::WorkStealing, 103, 4);
        assert_eq!(seen.len(), 103);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 103);
    }

    #[test]
    fn single_worker_works() {
        for policy in [
            LoadBalancing::Static,
            LoadBalancing::Dynamic,
            LoadBalancing::WorkStealing,
        ] {
            assert_eq!(run(policy, 10, 1).len(), 10);
        }
    }

    #[test]
    fn more_workers_than_items() {
        assert_eq!(run(LoadBalancing::WorkStealing, 3, 8).len(), 3);
        assert_eq!(run(LoadBalancing::Static, 3, 8).len(), 3);
    }

    #[test]
    fn stop_flag_halts_early() {
        let scheduler = Scheduler::new(2, LoadBalancing::Dynamic);
        let stop = AtomicBool::new(false);
        let count = AtomicUsize::new(0);
        let processed = scheduler.run_iteration(items(10_000), &stop, |_| {
            if count.fetch_add(1, Ordering::Relaxed) == 10 {
                stop.store(true, Ordering::Relaxed);
            }
        });
        assert!(processed < 10_000);
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let scheduler = Scheduler::new(2, LoadBalancing::Static);
        let stop = AtomicBool::new(false);
        assert_eq!(scheduler.run_iteration(Vec::new(), &stop, |_| {}), 0);
    }
}
