use crate::config::SamplingStrategy;
use rand::rngs::SmallRng;
use rand::Rng;

/// Chance-node sampling. Given `n` equally likely alternatives, the
/// sampler picks which of them a traversal descends into; values of
/// the chosen children are averaged with equal weight, which keeps
/// the estimate unbiased for uniform chance.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    strategy: SamplingStrategy,
    probability: f64,
}

impl Sampler {
    pub fn new(strategy: SamplingStrategy, probability: f64) -> Self {
        assert!(probability > 0.0 && probability <= 1.0);
        Self {
            strategy,
            probability,
        }
    }

    /// full enumeration, regardless of configuration
    pub fn exhaustive() -> Self {
        Self::new(SamplingStrategy::None, 1.0)
    }

    /// indices of the chance children to explore, in increasing order
    pub fn select(&self, n: usize, rng: &mut SmallRng) -> Vec<usize> {
        assert!(n > 0);
        match self.strategy {
            SamplingStrategy::None => (0..n).collect(),
            SamplingStrategy::Outcome => vec![rng.gen_range(0..n)],
            // external falls back to chance sampling: without the
            // acting-seat context of the walker there is no opponent
            // chance distinction to exploit
            SamplingStrategy::Chance | SamplingStrategy::External => {
                let k = ((n as f64 * self.probability).round() as usize).max(1);
                if k >= n {
                    (0..n).collect()
                } else {
                    Self::reservoir(n, k, rng)
                }
            }
        }
    }

    /// sample k of n indices without replacement
    fn reservoir(n: usize, k: usize, rng: &mut SmallRng) -> Vec<usize> {
        let mut chosen: Vec<usize> = (0..k).collect();
        for i in k..n {
            let j = rng.gen_range(0..=i);
            if j < k {
                chosen[j] = i;
            }
        }
        chosen.sort_unstable();
        chosen
    }
}
