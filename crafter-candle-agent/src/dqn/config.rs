//! Configuration of DQN agent.
use crate::{explorer::DqnExplorer, model::QNetworkConfig, model::SubModel1, Device};
use anyhow::Result;
use candle_core::Tensor;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Munchausen regularization.
///
/// `clamp(alpha * log softmax(Q / tau)(a | s), -1, 0)` is added to the reward
/// before bootstrapping, with `Q` the online action values of the current
/// observation.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct MunchausenConfig {
    /// Scale of the log-policy bonus.
    pub alpha: f64,

    /// Temperature of the softmax policy.
    pub tau: f64,
}

impl Default for MunchausenConfig {
    fn default() -> Self {
        Self {
            alpha: 0.9,
            tau: 0.03,
        }
    }
}

/// Configuration of [`Dqn`](super::Dqn).
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    /// Configuration of the Q-network and its optimizer.
    pub model_config: QNetworkConfig<Q::Config>,

    /// Batch size for training.
    pub batch_size: usize,

    /// Discount factor.
    pub gamma: f64,

    /// Horizon of the returns stored in the replay buffer. Targets bootstrap with `gamma^n_step`.
    pub n_step: usize,

    /// If `true`, the online network selects the next action and the target network evaluates it.
    pub double_dqn: bool,

    /// Munchausen regularization, disabled if `None`.
    pub munchausen: Option<MunchausenConfig>,

    /// Threshold of the global gradient norm.
    pub max_grad_norm: f64,

    /// Optimization is skipped while the buffer holds fewer transitions than
    /// `max(batch_size, min_transitions_warmup)`.
    pub min_transitions_warmup: usize,

    /// Number of initial actions in training mode drawn uniformly at random.
    pub n_random_actions: usize,

    /// Explorer used in training mode.
    pub explorer: DqnExplorer,

    /// Device of the networks.
    pub device: Option<Device>,

    /// Seed of parameter initialization and exploration.
    pub seed: u64,
}

impl<Q> Clone for DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            model_config: self.model_config.clone(),
            batch_size: self.batch_size,
            gamma: self.gamma,
            n_step: self.n_step,
            double_dqn: self.double_dqn,
            munchausen: self.munchausen.clone(),
            max_grad_norm: self.max_grad_norm,
            min_transitions_warmup: self.min_transitions_warmup,
            n_random_actions: self.n_random_actions,
            explorer: self.explorer.clone(),
            device: self.device,
            seed: self.seed,
        }
    }
}

impl<Q> Default for DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            batch_size: 32,
            gamma: 0.99,
            n_step: 1,
            double_dqn: true,
            munchausen: None,
            max_grad_norm: 10.0,
            min_transitions_warmup: 0,
            n_random_actions: 0,
            explorer: DqnExplorer::default(),
            device: None,
            seed: 42,
        }
    }
}

impl<Q> DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    /// Sets the configuration of the model.
    pub fn model_config(mut self, model_config: QNetworkConfig<Q::Config>) -> Self {
        self.model_config = model_config;
        self
    }

    /// Batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Horizon of the stored returns.
    pub fn n_step(mut self, v: usize) -> Self {
        self.n_step = v.max(1);
        self
    }

    /// Enables or disables Double DQN targets.
    pub fn double_dqn(mut self, v: bool) -> Self {
        self.double_dqn = v;
        self
    }

    /// Munchausen regularization.
    pub fn munchausen(mut self, v: Option<MunchausenConfig>) -> Self {
        self.munchausen = v;
        self
    }

    /// Threshold of the global gradient norm.
    pub fn max_grad_norm(mut self, v: f64) -> Self {
        self.max_grad_norm = v;
        self
    }

    /// Minimum number of transitions before optimization.
    pub fn min_transitions_warmup(mut self, v: usize) -> Self {
        self.min_transitions_warmup = v;
        self
    }

    /// Number of initial random actions in training mode.
    pub fn n_random_actions(mut self, v: usize) -> Self {
        self.n_random_actions = v;
        self
    }

    /// Explorer.
    pub fn explorer(mut self, v: DqnExplorer) -> Self {
        self.explorer = v;
        self
    }

    /// Device.
    pub fn device(mut self, device: candle_core::Device) -> Self {
        self.device = Some((&device).into());
        self
    }

    /// Seed of parameter initialization and exploration.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Constructs [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{DuelingQNet, DuelingQNetConfig};
    use crafter_core::schedule::ScheduleConfig;
    use tempdir::TempDir;

    #[test]
    fn test_serde_dqn_config() -> Result<()> {
        let config = DqnConfig::<DuelingQNet>::default()
            .model_config(QNetworkConfig::default().q_config(DuelingQNetConfig::default()))
            .n_step(3)
            .munchausen(Some(MunchausenConfig::default()))
            .explorer(DqnExplorer::epsilon_greedy(ScheduleConfig::linear(1.0, 0.01, 50_000)))
            .device(candle_core::Device::Cpu);

        let dir = TempDir::new("dqn_config")?;
        let path = dir.path().join("dqn_config.yaml");
        config.save(&path)?;
        let config_ = DqnConfig::<DuelingQNet>::load(&path)?;
        assert_eq!(config.model_config, config_.model_config);
        assert_eq!(config_.n_step, 3);
        assert_eq!(config.explorer, config_.explorer);
        assert_eq!(serde_yaml::to_string(&config)?, serde_yaml::to_string(&config_)?);
        Ok(())
    }
}
