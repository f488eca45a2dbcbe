use crate::Entropy;
use crate::Probability;
use crate::Utility;

/// Regret matching: play each action proportionally to the positive
/// part of its cumulative regret, uniformly when no regret is
/// positive. When `prune_threshold` is finite, actions whose raw
/// regret sits below it are zeroed out and the rest renormalized;
/// if that empties the distribution it falls back to uniform.
pub fn regret_matching(regrets: &[Utility], prune_threshold: Utility) -> Vec<Probability> {
    let n = regrets.len();
    assert!(n > 0);
    let positive: Vec<Utility> = regrets.iter().map(|r| r.max(0.0)).collect();
    let sum: Utility = positive.iter().sum();
    let mut sigma: Vec<Probability> = if sum > 0.0 {
        positive.iter().map(|p| p / sum).collect()
    } else {
        vec![1.0 / n as Probability; n]
    };
    if prune_threshold.is_finite() {
        for (s, r) in sigma.iter_mut().zip(regrets.iter()) {
            if *r < prune_threshold {
                *s = 0.0;
            }
        }
        let kept: Probability = sigma.iter().sum();
        if kept > 0.0 {
            for s in sigma.iter_mut() {
                *s /= kept;
            }
        } else {
            sigma = vec![1.0 / n as Probability; n];
        }
    }
    sigma
}

/// Average strategy: normalized strategy sums, uniform when nothing
/// has been accumulated yet.
pub fn average(strategy_sum: &[Probability]) -> Vec<Probability> {
    let n = strategy_sum.len();
    if n == 0 {
        return Vec::new();
    }
    let total: Probability = strategy_sum.iter().sum();
    if total > 0.0 {
        strategy_sum.iter().map(|s| s / total).collect()
    } else {
        vec![1.0 / n as Probability; n]
    }
}

/// Shannon entropy in nats; zero-probability actions contribute zero.
pub fn entropy(sigma: &[Probability]) -> Entropy {
    sigma
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| -p * p.ln())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn fresh_regrets_are_uniform() {
        let sigma = regret_matching(&[0.0, 0.0, 0.0], f64::NEG_INFINITY);
        assert!(close(&sigma, &[1.0 / 3.0; 3]));
    }

    #[test]
    fn positive_regrets_are_proportional() {
        let sigma = regret_matching(&[10.0, -5.0, 3.0], f64::NEG_INFINITY);
        assert!(close(&sigma, &[10.0 / 13.0, 0.0, 3.0 / 13.0]));
    }

    #[test]
    fn all_negative_regrets_are_uniform() {
        let sigma = regret_matching(&[-1.0, -2.0], f64::NEG_INFINITY);
        assert!(close(&sigma, &[0.5, 0.5]));
    }

    #[test]
    fn matching_sums_to_one() {
        let sigma = regret_matching(&[0.3, 0.0, 12.5, 1e-9], f64::NEG_INFINITY);
        assert!((sigma.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn threshold_prunes_and_renormalizes() {
        let sigma = regret_matching(&[10.0, 2.0, 8.0], 5.0);
        assert!(close(&sigma, &[10.0 / 18.0, 0.0, 8.0 / 18.0]));
    }

    #[test]
    fn threshold_pruning_everything_is_uniform() {
        let sigma = regret_matching(&[1.0, 2.0], 100.0);
        assert!(close(&sigma, &[0.5, 0.5]));
    }

    #[test]
    fn average_normalizes() {
        let avg = average(&[3.0, 1.0]);
        assert!(close(&avg, &[0.75, 0.25]));
    }

    #[test]
    fn average_of_nothing_is_uniform() {
        let avg = average(&[0.0, 0.0]);
        assert!(close(&avg, &[0.5, 0.5]));
    }

    #[test]
    fn entropy_of_uniform_is_maximal() {
        let uniform = entropy(&[0.5, 0.5]);
        let skewed = entropy(&[0.9, 0.1]);
        let pure = entropy(&[1.0, 0.0]);
        assert!(uniform > skewed);
        assert!(skewed > pure);
        assert!((pure - 0.0).abs() < 1e-12);
        assert!((uniform - (2.0f64).ln()).abs() < 1e-12);
    }
}
