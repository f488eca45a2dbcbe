use super::infoset::InfoKey;
use super::policy;
use super::store::InfoSetStore;
use std::collections::HashMap;

/// Convergence indicators computed over the whole store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvergenceReport {
    pub infosets: usize,
    /// mean over records of the mean positive regret per action
    pub mean_positive_regret: f64,
    /// mean Shannon entropy of the average strategies, in nats
    pub mean_entropy: f64,
    /// mean L1 distance between the average strategy now and at the
    /// previous observation, over records seen both times
    pub strategy_drift: f64,
}

/// Observes the store between iterations and reports how far the
/// average strategies have settled. Keeps the previous observation's
/// average strategies to measure drift.
#[derive(Default)]
pub struct Metrics {
    previous: HashMap<InfoKey, Vec<f64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, store: &InfoSetStore) -> ConvergenceReport {
        // one parallel pass for the scalar aggregates
        let (count, regret_sum, entropy_sum) = store.fold(
            |_, record| {
                let positive: f64 = record
                    .regrets
                    .iter()
                    .map(|r| r.max(0.0))
                    .sum::<f64>()
                    / record.num_actions() as f64;
                let entropy = policy::entropy(&policy::average(&record.strategy_sum));
                (1usize, positive, entropy)
            },
            (0usize, 0.0f64, 0.0f64),
            |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2),
        );
        let current: HashMap<InfoKey, Vec<f64>> = store
            .records()
            .into_iter()
            .map(|(key, record)| (key, policy::average(&record.strategy_sum)))
            .collect();
        let mut drift_sum = 0.0;
        let mut drift_count = 0usize;
        for (key, now) in current.iter() {
            if let Some(then) = self.previous.get(key) {
                if then.len() == now.len() {
                    drift_sum += now
                        .iter()
                        .zip(then.iter())
                        .map(|(a, b)| (a - b).abs())
                        .sum::<f64>();
                    drift_count += 1;
                }
            }
        }
        self.previous = current;
        ConvergenceReport {
            infosets: count,
            mean_positive_regret: if count == 0 { 0.0 } else { regret_sum / count as f64 },
            mean_entropy: if count == 0 { 0.0 } else { entropy_sum / count as f64 },
            strategy_drift: if drift_count == 0 {
                0.0
            } else {
                drift_sum / drift_count as f64
            },
        }
    }
}
