//! Configuration of [`Trainer`](super::Trainer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
///
/// All intervals count environment steps.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Number of environment steps of the whole run.
    pub max_env_steps: usize,

    /// Environment steps before the first optimization step.
    pub training_starts: usize,

    /// Interval of optimization steps.
    pub opt_interval: usize,

    /// Interval of copying the online model into the target model.
    pub target_update_interval: usize,

    /// Interval of evaluation.
    pub eval_interval: usize,

    /// Interval of saving model parameters.
    pub save_interval: usize,

    /// Interval of flushing records.
    pub flush_record_interval: usize,

    /// Interval of logging a summary of the progress.
    pub log_interval: usize,

    /// Where to save the trained model. Nothing is saved if `None`.
    pub model_dir: Option<String>,

    /// Seed of the training environment.
    pub env_seed: i64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_env_steps: 1_000_000,
            training_starts: 5_000,
            opt_interval: 4,
            target_update_interval: 2_500,
            eval_interval: 50_000,
            save_interval: 100_000,
            flush_record_interval: 1_000,
            log_interval: 10_000,
            model_dir: None,
            env_seed: 0,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of environment steps of the whole run.
    pub fn max_env_steps(mut self, v: usize) -> Self {
        self.max_env_steps = v;
        self
    }

    /// Sets the number of environment steps before the first optimization step.
    pub fn training_starts(mut self, v: usize) -> Self {
        self.training_starts = v;
        self
    }

    /// Sets the interval of optimization steps.
    pub fn opt_interval(mut self, v: usize) -> Self {
        self.opt_interval = v;
        self
    }

    /// Sets the interval of target synchronization.
    pub fn target_update_interval(mut self, v: usize) -> Self {
        self.target_update_interval = v;
        self
    }

    /// Sets the interval of evaluation.
    pub fn eval_interval(mut self, v: usize) -> Self {
        self.eval_interval = v;
        self
    }

    /// Sets the interval of saving model parameters.
    pub fn save_interval(mut self, v: usize) -> Self {
        self.save_interval = v;
        self
    }

    /// Sets the interval of flushing records.
    pub fn flush_record_interval(mut self, v: usize) -> Self {
        self.flush_record_interval = v;
        self
    }

    /// Sets the interval of progress logs.
    pub fn log_interval(mut self, v: usize) -> Self {
        self.log_interval = v;
        self
    }

    /// Sets the directory where models are saved.
    pub fn model_dir(mut self, v: impl Into<String>) -> Self {
        self.model_dir = Some(v.into());
        self
    }

    /// Sets the seed of the training environment.
    pub fn env_seed(mut self, v: i64) -> Self {
        self.env_seed = v;
        self
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_trainer_config() -> Result<()> {
        let config = TrainerConfig::default()
            .max_env_steps(100)
            .eval_interval(10)
            .model_dir("some/directory");

        let dir = TempDir::new("trainer_config")?;
        let path = dir.path().join("trainer_config.yaml");
        config.save(&path)?;
        let config_ = TrainerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}
