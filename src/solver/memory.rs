use super::store::Indexer;
use super::store::InfoSetStore;
use crate::config::PruneStrategy;
use crate::config::ResourceConfig;
use crate::tree::node::GameNode;
use crate::tree::tree::GameTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pressure {
    Nominal,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneReport {
    pub nodes_removed: usize,
    pub records_removed: usize,
}

/// Watches the engine's resident estimate against the configured
/// budget and, at critical pressure, prunes the tree and sweeps
/// orphaned infoset records. Runs strictly between iterations; the
/// retained subtrees keep their exact semantics.
pub struct MemoryManager {
    limit_bytes: u64,
    warning_fraction: f64,
    critical_fraction: f64,
    strategy: PruneStrategy,
    /// depth strategy: decisions kept from the root
    pub max_depth: usize,
    /// importance/adaptive strategies: node count to prune down to
    pub target_nodes: usize,
    /// frequency strategy: visits below this are dropped
    pub min_visits: u64,
}

impl MemoryManager {
    pub fn new(resources: &ResourceConfig) -> Self {
        Self {
            limit_bytes: resources.memory_limit_bytes(),
            warning_fraction: resources.warning_fraction,
            critical_fraction: resources.critical_fraction,
            strategy: resources.prune_strategy,
            max_depth: 12,
            target_nodes: 1 << 12,
            min_visits: 2,
        }
    }

    /// rough resident estimate: arena plus record heap
    pub fn resident_bytes(&self, tree: &GameTree, store: &InfoSetStore) -> u64 {
        let arena = tree
            .iter()
            .map(|n| std::mem::size_of::<GameNode>() + n.children.len() * 16)
            .sum::<usize>() as u64;
        arena + store.stats().bytes_est
    }

    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    pub fn pressure(&self, tree: &GameTree, store: &InfoSetStore) -> Pressure {
        let resident = self.resident_bytes(tree, store) as f64;
        let limit = self.limit_bytes as f64;
        if resident >= limit * self.critical_fraction {
            Pressure::Critical
        } else if resident >= limit * self.warning_fraction {
            Pressure::Warning
        } else {
            Pressure::Nominal
        }
    }

    /// apply the configured pruning strategy, then drop records whose
    /// betting line disappeared with the pruned nodes
    pub fn prune(
        &self,
        tree: &mut GameTree,
        store: &InfoSetStore,
        visits: Option<&[u64]>,
    ) -> PruneReport {
        let keep = match self.strategy {
            PruneStrategy::Depth => self.keep_by_depth(tree),
            PruneStrategy::Frequency => self.keep_by_frequency(tree, visits),
            PruneStrategy::Importance => self.keep_by_importance(tree, self.target_nodes),
            PruneStrategy::Adaptive => {
                // aim for the live record population, bounded below
                let target = store.len().max(1 << 8).min(tree.len());
                self.keep_by_importance(tree, target)
            }
        };
        let nodes_removed = tree.compact(&keep);
        let records_removed = match nodes_removed {
            0 => 0,
            _ => store.prune_unreferenced(&Indexer::from(&*tree)),
        };
        log::info!(
            "pruned {} nodes and {} records ({:?})",
            nodes_removed,
            records_removed,
            self.strategy,
        );
        PruneReport {
            nodes_removed,
            records_removed,
        }
    }

    fn keep_by_depth(&self, tree: &GameTree) -> Vec<bool> {
        tree.iter()
            .map(|n| n.history.len() <= self.max_depth)
            .collect()
    }

    fn keep_by_frequency(&self, tree: &GameTree, visits: Option<&[u64]>) -> Vec<bool> {
        match visits {
            // without counters there is nothing to rank; keep all
            None => vec![true; tree.len()],
            Some(counts) => tree
                .iter()
                .map(|n| counts.get(n.id as usize).copied().unwrap_or(0) >= self.min_visits)
                .collect(),
        }
    }

    /// shallow, branchy, non-terminal nodes carry the subtree; score
    /// and keep the best `target` of them
    fn keep_by_importance(&self, tree: &GameTree, target: usize) -> Vec<bool> {
        if tree.len() <= target {
            return vec![true; tree.len()];
        }
        let mut scored: Vec<(i64, usize)> = tree
            .iter()
            .map(|n| (Self::importance(n), n.id as usize))
            .collect();
        scored.sort_unstable_by(|a, b| b.cmp(a));
        let mut keep = vec![false; tree.len()];
        for (_, index) in scored.into_iter().take(target) {
            keep[index] = true;
        }
        keep
    }

    fn importance(node: &GameNode) -> i64 {
        let branching = node.children.len() as i64;
        let depth = node.history.len() as i64;
        let terminal = node.is_terminal() as i64;
        branching * 4 - depth - terminal * 2
    }
}
