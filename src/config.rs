use crate::error::SolverError;
use crate::Chips;
use serde::Deserialize;
use serde::Serialize;

/// Rules of the game being solved. Validated once at tree construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameParams {
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub stack: Chips,
    pub max_raises_per_street: u8,
    pub rake_milli_bb: u32,
    pub preflop_only: bool,
    pub use_suit_isomorphism: bool,
    pub use_card_abstraction: bool,
    pub abstraction_buckets: u32,
}

impl Default for GameParams {
    fn default() -> Self {
        Self {
            small_blind: 1,
            big_blind: 2,
            stack: 200,
            max_raises_per_street: 4,
            rake_milli_bb: 0,
            preflop_only: false,
            use_suit_isomorphism: true,
            use_card_abstraction: true,
            abstraction_buckets: 4096,
        }
    }
}

impl GameParams {
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.small_blind <= 0 {
            return Err(SolverError::ConfigInvalid("small_blind must be > 0".into()));
        }
        if self.big_blind <= self.small_blind {
            return Err(SolverError::ConfigInvalid(
                "big_blind must exceed small_blind".into(),
            ));
        }
        if self.stack <= 0 {
            return Err(SolverError::ConfigInvalid("stack must be > 0".into()));
        }
        if self.max_raises_per_street < 1 {
            return Err(SolverError::ConfigInvalid(
                "max_raises_per_street must be >= 1".into(),
            ));
        }
        if self.abstraction_buckets == 0 {
            return Err(SolverError::ConfigInvalid(
                "abstraction_buckets must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// chips added by a bet or raise on this street:
    /// one big blind before the turn, two big blinds after
    pub fn bet_size(&self, street: crate::tree::street::Street) -> Chips {
        use crate::tree::street::Street;
        match street {
            Street::Pre | Street::Flop => self.big_blind,
            Street::Turn | Street::River => self.big_blind * 2,
        }
    }

    /// chips withheld from the winner's take
    pub fn rake(&self) -> f64 {
        self.rake_milli_bb as f64 * self.big_blind as f64 / 1000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    None,
    Chance,
    Outcome,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancing {
    Static,
    Dynamic,
    WorkStealing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEviction {
    Lru,
    Lfu,
    Fifo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneStrategy {
    Depth,
    Importance,
    Frequency,
    Adaptive,
}

fn no_prune_threshold() -> f64 {
    f64::NEG_INFINITY
}

/// JSON has no -inf; a disabled threshold travels as null
mod threshold {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_some(value)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NEG_INFINITY))
    }
}

/// Per-iteration CFR behavior and the stopping criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterConfig {
    pub use_cfr_plus: bool,
    pub use_linear_weighting: bool,
    pub discount_factor: f64,
    pub use_sampling: bool,
    pub sampling_strategy: SamplingStrategy,
    pub sampling_probability: f64,
    /// regrets below this are zeroed out of the matched strategy;
    /// NEG_INFINITY (JSON null) disables pruning
    #[serde(
        default = "no_prune_threshold",
        serialize_with = "threshold::serialize",
        deserialize_with = "threshold::deserialize"
    )]
    pub prune_threshold: f64,
    pub max_iterations: u64,
    pub min_iterations: u64,
    pub target_exploitability: f64,
    pub max_time_seconds: f64,
    pub check_frequency: u64,
}

impl Default for IterConfig {
    fn default() -> Self {
        Self {
            use_cfr_plus: true,
            use_linear_weighting: true,
            discount_factor: 1.0,
            use_sampling: false,
            sampling_strategy: SamplingStrategy::None,
            sampling_probability: 1.0,
            prune_threshold: f64::NEG_INFINITY,
            max_iterations: 10_000,
            min_iterations: 0,
            target_exploitability: 0.0,
            max_time_seconds: 3600.0,
            check_frequency: 10,
        }
    }
}

impl IterConfig {
    pub fn validate(&self) -> Result<(), SolverError> {
        if !(0.0..=1.0).contains(&self.discount_factor) || self.discount_factor == 0.0 {
            return Err(SolverError::ConfigInvalid(
                "discount_factor must be in (0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sampling_probability) || self.sampling_probability == 0.0 {
            return Err(SolverError::ConfigInvalid(
                "sampling_probability must be in (0, 1]".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(SolverError::ConfigInvalid("max_iterations must be > 0".into()));
        }
        if self.target_exploitability < 0.0 {
            return Err(SolverError::ConfigInvalid(
                "target_exploitability must be >= 0".into(),
            ));
        }
        if self.max_time_seconds <= 0.0 {
            return Err(SolverError::ConfigInvalid(
                "max_time_seconds must be > 0".into(),
            ));
        }
        if self.check_frequency == 0 {
            return Err(SolverError::ConfigInvalid(
                "check_frequency must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Threads, memory, and cache budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// 0 = one worker per logical cpu
    pub num_threads: usize,
    /// traversal work items issued per worker per iteration
    pub chunk_size: usize,
    pub load_balancing: LoadBalancing,
    pub max_memory_gb: f64,
    pub warning_fraction: f64,
    pub critical_fraction: f64,
    pub prune_strategy: PruneStrategy,
    pub cache_max_entries: usize,
    pub cache_eviction: CacheEviction,
    /// shard locks protecting infoset records; rounded up to a power of two
    pub lock_pool_size: usize,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            chunk_size: 64,
            load_balancing: LoadBalancing::WorkStealing,
            max_memory_gb: 4.0,
            warning_fraction: 0.7,
            critical_fraction: 0.9,
            prune_strategy: PruneStrategy::Adaptive,
            cache_max_entries: 1 << 16,
            cache_eviction: CacheEviction::Lru,
            lock_pool_size: 1 << 8,
        }
    }
}

impl ResourceConfig {
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.chunk_size == 0 {
            return Err(SolverError::ConfigInvalid("chunk_size must be > 0".into()));
        }
        if self.max_memory_gb <= 0.0 {
            return Err(SolverError::ConfigInvalid("max_memory_gb must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.warning_fraction)
            || !(0.0..1.0).contains(&self.critical_fraction)
            || self.warning_fraction <= 0.0
            || self.warning_fraction >= self.critical_fraction
        {
            return Err(SolverError::ConfigInvalid(
                "fractions must satisfy 0 < warning < critical < 1".into(),
            ));
        }
        if self.cache_max_entries == 0 {
            return Err(SolverError::ConfigInvalid(
                "cache_max_entries must be > 0".into(),
            ));
        }
        if self.lock_pool_size == 0 {
            return Err(SolverError::ConfigInvalid(
                "lock_pool_size must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn workers(&self) -> usize {
        match self.num_threads {
            0 => num_cpus::get(),
            n => n,
        }
    }

    pub fn memory_limit_bytes(&self) -> u64 {
        (self.max_memory_gb * (1u64 << 30) as f64) as u64
    }
}

/// Checkpoint cadence for the training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub directory: std::path::PathBuf,
    pub every_iterations: Option<u64>,
    pub every_seconds: Option<f64>,
    /// snapshot whenever exploitability improves by at least this much
    pub every_improvement: Option<f64>,
    pub keep_best: bool,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            directory: std::path::PathBuf::from("checkpoints"),
            every_iterations: None,
            every_seconds: None,
            every_improvement: None,
            keep_best: false,
        }
    }
}

/// Everything `train` needs, bundled for the CLI surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub game: GameParams,
    pub iter: IterConfig,
    pub resources: ResourceConfig,
    pub checkpoints: CheckpointConfig,
    pub seed: Option<u64>,
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), SolverError> {
        self.game.validate()?;
        self.iter.validate()?;
        self.resources.validate()?;
        Ok(())
    }

    pub fn load(path: &std::path::Path) -> Result<Self, SolverError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SolverError::ConfigInvalid(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| SolverError::ConfigInvalid(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn blinds_must_be_ordered() {
        let params = GameParams {
            small_blind: 2,
            big_blind: 2,
            ..GameParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn raise_cap_must_be_positive() {
        let params = GameParams {
            max_raises_per_street: 0,
            ..GameParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn fractions_must_be_ordered() {
        let resources = ResourceConfig {
            warning_fraction: 0.9,
            critical_fraction: 0.7,
            ..ResourceConfig::default()
        };
        assert!(resources.validate().is_err());
    }

    #[test]
    fn discount_factor_range() {
        let iter = IterConfig {
            discount_factor: 0.0,
            ..IterConfig::default()
        };
        assert!(iter.validate().is_err());
        let iter = IterConfig {
            discount_factor: 1.5,
            ..IterConfig::default()
        };
        assert!(iter.validate().is_err());
    }

    #[test]
    fn json_round_trip() {
        let config = TrainConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        let back: TrainConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(config.game, back.game);
        assert_eq!(back.iter.prune_threshold, f64::NEG_INFINITY);
        let pruned: IterConfig =
            serde_json::from_str(r#"{"use_cfr_plus":true,"use_linear_weighting":true,"discount_factor":1.0,"use_sampling":false,"sampling_strategy":"none","sampling_probability":1.0,"prune_threshold":-5.0,"max_iterations":10,"min_iterations":0,"target_exploitability":0.0,"max_time_seconds":10.0,"check_frequency":1}"#)
                .unwrap();
        assert_eq!(pruned.prune_threshold, -5.0);
    }
}
