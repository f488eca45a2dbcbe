pub mod cache;
pub mod checkpoint;
pub mod control;
pub mod export;
pub mod infoset;
pub mod memory;
pub mod metrics;
pub mod policy;
pub mod sampling;
pub mod scheduler;
pub mod store;
pub mod traversal;

use crate::config::GameParams;
use crate::config::ResourceConfig;
use crate::error::SolverError;
use crate::tree::tree::GameTree;

/// construct the extensive-form betting tree for a game
pub fn build_tree(params: GameParams) -> Result<GameTree, SolverError> {
    GameTree::build(params)
}

/// construct an empty infoset store sized by the resource budget
pub fn new_store(resources: &ResourceConfig) -> store::InfoSetStore {
    store::InfoSetStore::new(resources)
}

/// the average (Nash-approximating) strategy at one information set
pub fn average_strategy(store: &store::InfoSetStore, key: infoset::InfoKey) -> Option<Vec<f64>> {
    store
        .lookup(&key)
        .map(|record| policy::average(&record.strategy_sum))
}

/// dump the store and its context into a restorable snapshot
pub fn snapshot(trainer: &control::Trainer) -> checkpoint::Snapshot {
    trainer.snapshot()
}

/// rebuild a trainer from a snapshot, discarding any live state
pub fn restore(
    snapshot: checkpoint::Snapshot,
    hooks: control::Hooks,
) -> Result<control::Trainer, SolverError> {
    control::Trainer::resume(snapshot, hooks)
}
