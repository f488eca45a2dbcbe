use super::checkpoint::Snapshot;
use super::memory::MemoryManager;
use super::memory::Pressure;
use super::metrics::ConvergenceReport;
use super::metrics::Metrics;
use super::scheduler::Scheduler;
use super::scheduler::WorkItem;
use super::store::InfoSetStore;
use super::store::StoreStats;
use super::traversal::Deal;
use super::traversal::Traverser;
use super::traversal::VisitCounters;
use crate::config::TrainConfig;
use crate::error::SolverError;
use crate::tree::tree::GameTree;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// bound on the retained exploitability history
const HISTORY_LIMIT: usize = 256;

/// Cooperative cancellation. Workers poll between items; the control
/// loop polls between iterations.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
    pub fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

/// periodic progress, handed to the on_progress hook
#[derive(Debug, Clone)]
pub struct Progress {
    pub iteration: u64,
    pub max_iterations: u64,
    pub elapsed: Duration,
    pub eta: Option<Duration>,
    pub exploitability: Option<f64>,
    pub infosets: usize,
    pub items_processed: usize,
}

/// Exploitability is only ever read through this hook; the engine
/// ships no best-response computation of its own.
pub type ExploitabilityHook = Box<dyn Fn(&GameTree, &InfoSetStore) -> f64 + Send + Sync>;

#[derive(Default)]
pub struct Hooks {
    pub on_progress: Option<Box<dyn Fn(&Progress) + Send + Sync>>,
    pub on_checkpoint: Option<Box<dyn Fn(&std::path::Path, u64) + Send + Sync>>,
    pub compute_exploitability: Option<ExploitabilityHook>,
}

#[derive(Debug, Clone)]
pub struct IterationReport {
    pub iteration: u64,
    pub items_processed: usize,
    pub duration: Duration,
    pub store: StoreStats,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub iterations: u64,
    pub elapsed: Duration,
    pub stopping_reason: String,
    pub exploitability: Option<f64>,
    pub checkpoints_written: usize,
    pub convergence: ConvergenceReport,
}

/// The iteration loop: drives the scheduler over the tree, watches
/// memory, evaluates the stopping rules in order, and snapshots on
/// the configured cadence.
pub struct Trainer {
    tree: GameTree,
    store: InfoSetStore,
    config: TrainConfig,
    hooks: Hooks,
    scheduler: Scheduler,
    memory: MemoryManager,
    metrics: Metrics,
    visits: VisitCounters,
    cancel: CancelToken,
    seed: u64,
    iteration: u64,
    history: VecDeque<f64>,
    best: Option<f64>,
    checkpoints_written: usize,
    last_checkpoint_at: Option<Instant>,
    exploitability_at_checkpoint: Option<f64>,
}

impl Trainer {
    pub fn new(config: TrainConfig, hooks: Hooks) -> Result<Self, SolverError> {
        config.validate()?;
        let tree = GameTree::build(config.game.clone())?;
        let store = InfoSetStore::new(&config.resources);
        Self::assemble(tree, store, config, hooks, 0, VecDeque::new())
    }

    /// rebuild from a snapshot: the tree comes back from the stored
    /// configuration, the records from the dump
    pub fn resume(snapshot: Snapshot, hooks: Hooks) -> Result<Self, SolverError> {
        let config = snapshot.config.clone();
        config.validate()?;
        let tree = GameTree::build(config.game.clone())?;
        let store = InfoSetStore::new(&config.resources);
        snapshot.restore_into(&store);
        let mut trainer = Self::assemble(
            tree,
            store,
            config,
            hooks,
            snapshot.iteration,
            snapshot.history.iter().copied().collect(),
        )?;
        trainer.seed = snapshot.seed;
        Ok(trainer)
    }

    fn assemble(
        tree: GameTree,
        store: InfoSetStore,
        config: TrainConfig,
        hooks: Hooks,
        iteration: u64,
        history: VecDeque<f64>,
    ) -> Result<Self, SolverError> {
        let workers = config.resources.workers();
        let scheduler = Scheduler::new(workers, config.resources.load_balancing);
        let memory = MemoryManager::new(&config.resources);
        let visits = VisitCounters::new(tree.len());
        let seed = config.seed.unwrap_or(0x1ace_5eed);
        Ok(Self {
            tree,
            store,
            config,
            hooks,
            scheduler,
            memory,
            metrics: Metrics::new(),
            visits,
            cancel: CancelToken::new(),
            seed,
            iteration,
            history,
            best: None,
            checkpoints_written: 0,
            last_checkpoint_at: None,
            exploitability_at_checkpoint: None,
        })
    }

    pub fn tree(&self) -> &GameTree {
        &self.tree
    }
    pub fn store(&self) -> &InfoSetStore {
        &self.store
    }
    pub fn iteration(&self) -> u64 {
        self.iteration
    }
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        let history: Vec<f64> = self.history.iter().copied().collect();
        Snapshot::capture(&self.store, self.iteration, self.seed, &self.config, &history)
    }

    /// deterministic per-item seed, independent of which worker runs it
    fn item_seed(&self, iteration: u64, index: usize) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        iteration.hash(&mut hasher);
        index.hash(&mut hasher);
        hasher.finish()
    }

    fn deals(&self, iteration: u64) -> Vec<WorkItem> {
        let count = self.config.resources.chunk_size * self.scheduler.workers();
        (0..count)
            .map(|index| {
                let seed = self.item_seed(iteration, index);
                let mut rng = SmallRng::seed_from_u64(seed);
                WorkItem {
                    index,
                    deal: Deal::random(&mut rng),
                    seed: rng.gen(),
                }
            })
            .collect()
    }

    /// run exactly one barrier-synchronised CFR iteration
    pub fn cfr_iteration(&mut self) -> Result<IterationReport, SolverError> {
        self.iteration += 1;
        let iteration = self.iteration;
        let started = Instant::now();
        let items = self.deals(iteration);
        let failure: Mutex<Option<SolverError>> = Mutex::new(None);
        let traverser =
            Traverser::new(&self.tree, &self.store, &self.config.iter, iteration)
                .counting(&self.visits);
        let processed = self.scheduler.run_iteration(items, self.cancel.flag(), |item| {
            let mut rng = SmallRng::seed_from_u64(item.seed);
            if let Err(e) = traverser.run(&item.deal, &mut rng) {
                let mut slot = failure.lock();
                if slot.is_none() {
                    *slot = Some(e);
                }
            }
        });
        if let Some(error) = failure.into_inner() {
            return Err(error);
        }
        Ok(IterationReport {
            iteration,
            items_processed: processed,
            duration: started.elapsed(),
            store: self.store.stats(),
        })
    }

    pub fn train(&mut self) -> Result<TrainReport, SolverError> {
        let started = Instant::now();
        self.last_checkpoint_at = Some(started);
        let mut reason: Option<String> = None;
        let mut exploitability: Option<f64> = None;
        log::info!(
            "training: {} workers, {} deals per iteration, tree of {} nodes",
            self.scheduler.workers(),
            self.config.resources.chunk_size * self.scheduler.workers(),
            self.tree.len(),
        );
        while reason.is_none() {
            if self.cancel.is_cancelled() {
                reason = Some("cancelled".into());
                break;
            }
            let report = self.cfr_iteration()?;
            if let Err(e) = self.relieve_memory() {
                log::error!("{}", e);
                reason = Some("memory".into());
                break;
            }
            if self.should_check() {
                exploitability = self.estimate_exploitability();
                reason = self.stopping_reason(started, exploitability);
            }
            self.maybe_checkpoint(exploitability)?;
            self.emit_progress(&report, started, exploitability);
        }
        let reason = reason.unwrap_or_else(|| "cancelled".into());
        log::info!("training stopped: {}", reason);
        Ok(TrainReport {
            iterations: self.iteration,
            elapsed: started.elapsed(),
            stopping_reason: reason,
            exploitability,
            checkpoints_written: self.checkpoints_written,
            convergence: self.metrics.observe(&self.store),
        })
    }

    /// the first satisfied stopping rule wins
    fn stopping_reason(&self, started: Instant, exploitability: Option<f64>) -> Option<String> {
        let iter = self.config.iter.clone();
        if self.iteration >= iter.max_iterations {
            return Some(format!("max iterations reached ({})", self.iteration));
        }
        if let Some(estimate) = exploitability {
            if estimate <= iter.target_exploitability {
                return Some(format!(
                    "target exploitability reached ({:.6} <= {:.6})",
                    estimate, iter.target_exploitability
                ));
            }
        }
        if started.elapsed().as_secs_f64() >= iter.max_time_seconds {
            return Some(format!(
                "time limit reached ({:.0}s)",
                iter.max_time_seconds
            ));
        }
        if self.cancel.is_cancelled() {
            return Some("cancelled".into());
        }
        None
    }

    /// criteria are evaluated at most every check_frequency
    /// iterations and never before min_iterations; the iteration cap
    /// is also honored off-cadence so the loop cannot overrun it
    fn should_check(&self) -> bool {
        let iter = &self.config.iter;
        self.iteration >= iter.min_iterations
            && (self.iteration % iter.check_frequency == 0
                || self.iteration >= iter.max_iterations)
    }

    fn estimate_exploitability(&mut self) -> Option<f64> {
        let estimate = self
            .hooks
            .compute_exploitability
            .as_ref()
            .map(|hook| hook(&self.tree, &self.store));
        if let Some(value) = estimate {
            if self.history.len() == HISTORY_LIMIT {
                self.history.pop_front();
            }
            self.history.push_back(value);
        }
        estimate
    }

    /// critical memory pressure prunes once; if that is not enough,
    /// training ends with stopping_reason = "memory"
    fn relieve_memory(&mut self) -> Result<(), SolverError> {
        if self.memory.pressure(&self.tree, &self.store) != Pressure::Critical {
            return Ok(());
        }
        let visits = self.visits.snapshot();
        self.memory.prune(&mut self.tree, &self.store, Some(&visits));
        // node indices changed; visit counts restart
        self.visits = VisitCounters::new(self.tree.len());
        if self.memory.pressure(&self.tree, &self.store) == Pressure::Critical {
            self.cancel.cancel();
            return Err(SolverError::ResourceExhausted {
                resident_bytes: self.memory.resident_bytes(&self.tree, &self.store),
                limit_bytes: self.memory.limit_bytes(),
            });
        }
        Ok(())
    }

    fn maybe_checkpoint(&mut self, exploitability: Option<f64>) -> Result<(), SolverError> {
        let cadence = self.config.checkpoints.clone();
        let mut due = false;
        if let Some(every) = cadence.every_iterations {
            due |= self.iteration % every.max(1) == 0;
        }
        if let (Some(seconds), Some(at)) = (cadence.every_seconds, self.last_checkpoint_at) {
            due |= at.elapsed().as_secs_f64() >= seconds;
        }
        if let (Some(delta), Some(now)) = (cadence.every_improvement, exploitability) {
            due |= match self.exploitability_at_checkpoint {
                Some(then) => then - now >= delta,
                None => true,
            };
        }
        if due {
            let path = cadence.directory.join(Snapshot::file_name(self.iteration));
            self.write_checkpoint(&path, exploitability)?;
        }
        if cadence.keep_best {
            if let Some(now) = exploitability {
                if self.best.map_or(true, |best| now < best) {
                    self.best = Some(now);
                    let path = cadence.directory.join("best.ckpt");
                    self.write_checkpoint(&path, exploitability)?;
                }
            }
        }
        Ok(())
    }

    /// a failed write is recoverable: it surfaces in the log and
    /// training continues
    fn write_checkpoint(
        &mut self,
        path: &std::path::Path,
        exploitability: Option<f64>,
    ) -> Result<(), SolverError> {
        match self.snapshot().write(path) {
            Ok(()) => {
                self.checkpoints_written += 1;
                self.last_checkpoint_at = Some(Instant::now());
                self.exploitability_at_checkpoint = exploitability.or(self.exploitability_at_checkpoint);
                if let Some(hook) = self.hooks.on_checkpoint.as_ref() {
                    hook(path, self.iteration);
                }
                Ok(())
            }
            Err(e) => {
                log::warn!("checkpoint write failed, continuing: {}", e);
                Ok(())
            }
        }
    }

    fn emit_progress(&self, report: &IterationReport, started: Instant, exploitability: Option<f64>) {
        if let Some(hook) = self.hooks.on_progress.as_ref() {
            let elapsed = started.elapsed();
            let remaining = self.config.iter.max_iterations.saturating_sub(self.iteration);
            let eta = match self.iteration {
                0 => None,
                n => Some(Duration::from_secs_f64(
                    elapsed.as_secs_f64() / n as f64 * remaining as f64,
                )),
            };
            hook(&Progress {
                iteration: self.iteration,
                max_iterations: self.config.iter.max_iterations,
                elapsed,
                eta,
                exploitability,
                infosets: self.store.len(),
                items_processed: report.items_processed,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameParams;
    use crate::config::IterConfig;
    use crate::config::ResourceConfig;
    use crate::config::SamplingStrategy;

    fn quick_config(max_iterations: u64) -> TrainConfig {
        TrainConfig {
            game: GameParams {
                preflop_only: true,
                ..GameParams::default()
            },
            iter: IterConfig {
                max_iterations,
                check_frequency: 1,
                use_sampling: true,
                sampling_strategy: SamplingStrategy::Outcome,
                ..IterConfig::default()
            },
            resources: ResourceConfig {
                num_threads: 2,
                chunk_size: 4,
                ..ResourceConfig::default()
            },
            checkpoints: Default::default(),
            seed: Some(77),
        }
    }

    #[test]
    fn stops_at_max_iterations() {
        let mut trainer = Trainer::new(quick_config(5), Hooks::default()).unwrap();
        let report = trainer.train().unwrap();
        assert_eq!(report.iterations, 5);
        assert!(report.stopping_reason.contains("max iterations"));
        assert!(!trainer.store().is_empty());
    }

    #[test]
    fn stops_on_target_exploitability() {
        let hooks = Hooks {
            compute_exploitability: Some(Box::new(|_, _| 0.0)),
            ..Default::default()
        };
        let mut config = quick_config(1000);
        config.iter.target_exploitability = 0.5;
        let mut trainer = Trainer::new(config, hooks).unwrap();
        let report = trainer.train().unwrap();
        assert_eq!(report.iterations, 1);
        assert!(report.stopping_reason.contains("target exploitability"));
        assert_eq!(report.exploitability, Some(0.0));
    }

    #[test]
    fn respects_min_iterations() {
        let hooks = Hooks {
            compute_exploitability: Some(Box::new(|_, _| 0.0)),
            ..Default::default()
        };
        let mut config = quick_config(1000);
        config.iter.target_exploitability = 1.0;
        config.iter.min_iterations = 7;
        let mut trainer = Trainer::new(config, hooks).unwrap();
        let report = trainer.train().unwrap();
        assert_eq!(report.iterations, 7);
    }

    #[test]
    fn cancellation_wins() {
        let mut trainer = Trainer::new(quick_config(1_000_000), Hooks::default()).unwrap();
        trainer.cancel_token().cancel();
        let report = trainer.train().unwrap();
        assert_eq!(report.stopping_reason, "cancelled");
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn progress_hook_fires() {
        use std::sync::atomic::AtomicUsize;
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let hooks = Hooks {
            on_progress: Some(Box::new(move |progress| {
                assert!(progress.iteration > 0);
                seen.fetch_add(1, Ordering::Relaxed);
            })),
            ..Default::default()
        };
        let mut trainer = Trainer::new(quick_config(3), hooks).unwrap();
        trainer.train().unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn single_iteration_reports() {
        let mut trainer = Trainer::new(quick_config(10), Hooks::default()).unwrap();
        let report = trainer.cfr_iteration().unwrap();
        assert_eq!(report.iteration, 1);
        assert_eq!(report.items_processed, 8); // 2 workers x 4
        assert!(report.store.count > 0);
    }

    #[test]
    fn deterministic_across_schedules() {
        // identical per-item seeds mean static and dynamic schedules
        // build identical stores when updates commute (single worker)
        let run = |threads: usize, balancing: crate::config::LoadBalancing| {
            let mut config = quick_config(4);
            config.resources.num_threads = threads;
            config.resources.load_balancing = balancing;
            let mut trainer = Trainer::new(config, Hooks::default()).unwrap();
            trainer.train().unwrap();
            trainer.store.records()
        };
        let a = run(1, crate::config::LoadBalancing::Static);
        let b = run(1, crate::config::LoadBalancing::Dynamic);
        assert_eq!(a.len(), b.len());
        for ((ka, ra), (kb, rb)) in a.iter().zip(b.iter()) {
            assert_eq!(ka, kb);
            assert_eq!(ra.regrets, rb.regrets);
        }
    }

    #[test]
    fn snapshot_resume_round_trip() {
        let mut trainer = Trainer::new(quick_config(3), Hooks::default()).unwrap();
        trainer.train().unwrap();
        let snapshot = trainer.snapshot();
        let resumed = Trainer::resume(snapshot.clone(), Hooks::default()).unwrap();
        assert_eq!(resumed.iteration(), 3);
        assert_eq!(resumed.store().records(), snapshot.records);
    }

    #[test]
    fn checkpoints_on_iteration_cadence() {
        let dir = std::env::temp_dir().join("limitcfr-control-tests");
        let _ = std::fs::remove_dir_all(&dir);
        let mut config = quick_config(4);
        config.checkpoints.directory = dir.clone();
        config.checkpoints.every_iterations = Some(2);
        let mut trainer = Trainer::new(config, Hooks::default()).unwrap();
        let report = trainer.train().unwrap();
        assert_eq!(report.checkpoints_written, 2);
        let entries = Snapshot::list(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].iteration, 4);
    }

    #[test]
    fn keep_best_tracks_minimum() {
        use std::sync::atomic::AtomicUsize;
        let dir = std::env::temp_dir().join("limitcfr-best-tests");
        let _ = std::fs::remove_dir_all(&dir);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        // exploitability goes down, up, down
        let series = [0.5, 0.9, 0.1, 0.2];
        let hooks = Hooks {
            compute_exploitability: Some(Box::new(move |_, _| {
                series[counter.fetch_add(1, Ordering::Relaxed).min(3)]
            })),
            ..Default::default()
        };
        let mut config = quick_config(4);
        config.checkpoints.directory = dir.clone();
        config.checkpoints.keep_best = true;
        let mut trainer = Trainer::new(config, hooks).unwrap();
        trainer.train().unwrap();
        let best = Snapshot::read(&dir.join("best.ckpt")).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        // the best write happened at the 0.1 estimate, iteration 3
        assert_eq!(best.iteration, 3);
    }
}
