//! Configuration of [`ReplayBuffer`](super::ReplayBuffer).
use crate::{error::CrafterError, SpaceConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration for prioritized experience replay (PER).
///
/// ```rust
/// use crafter_core::replay_buffer::PerConfig;
///
/// let config = PerConfig::default()
///     .alpha(0.6)
///     .beta_0(0.4)
///     .beta_frames(1_000_000);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PerConfig {
    /// Exponent of priorities. `0` gives uniform sampling.
    pub alpha: f64,

    /// Initial exponent of importance weights.
    pub beta_0: f64,

    /// Final exponent of importance weights.
    pub beta_final: f64,

    /// Number of sampling calls over which `beta` is annealed from
    /// `beta_0` to `beta_final`.
    pub beta_frames: usize,
}

impl Default for PerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            beta_0: 0.4,
            beta_final: 1.0,
            beta_frames: 1_000_000,
        }
    }
}

impl PerConfig {
    /// Sets the exponent of priorities.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the initial exponent of importance weights.
    pub fn beta_0(mut self, beta_0: f64) -> Self {
        self.beta_0 = beta_0;
        self
    }

    /// Sets the final exponent of importance weights.
    pub fn beta_final(mut self, beta_final: f64) -> Self {
        self.beta_final = beta_final;
        self
    }

    /// Sets the annealing horizon of `beta` in sampling calls.
    pub fn beta_frames(mut self, beta_frames: usize) -> Self {
        self.beta_frames = beta_frames;
        self
    }
}

/// Configuration of [`ReplayBuffer`](super::ReplayBuffer).
///
/// ```rust
/// use crafter_core::{replay_buffer::{PerConfig, ReplayBufferConfig}, SpaceConfig};
///
/// let config = ReplayBufferConfig::default()
///     .capacity(100_000)
///     .space(SpaceConfig::new([3, 64, 64], 17))
///     .per_config(Some(PerConfig::default()));
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Maximum number of transitions. When the buffer is full, new
    /// transitions replace the oldest ones.
    pub capacity: usize,

    /// Random seed used for sampling.
    pub seed: u64,

    /// Observation shape and number of actions.
    pub space: SpaceConfig,

    /// If `None`, transitions are sampled uniformly at random.
    pub per_config: Option<PerConfig>,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            seed: 42,
            space: SpaceConfig::default(),
            per_config: None,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the random seed for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the observation and action spaces.
    pub fn space(mut self, space: SpaceConfig) -> Self {
        self.space = space;
        self
    }

    /// Sets the configuration for prioritized experience replay.
    pub fn per_config(mut self, per_config: Option<PerConfig>) -> Self {
        self.per_config = per_config;
        self
    }

    pub(super) fn validate(&self) -> Result<(), CrafterError> {
        if self.capacity == 0 {
            return Err(CrafterError::InvalidConfig("capacity must be positive".into()));
        }
        if self.space.obs_len() == 0 {
            return Err(CrafterError::InvalidConfig("observation shape is empty".into()));
        }
        if let Some(per) = &self.per_config {
            if per.alpha < 0.0 || per.beta_0 < 0.0 {
                return Err(CrafterError::InvalidConfig(
                    "alpha and beta_0 must be nonnegative".into(),
                ));
            }
        }
        Ok(())
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
