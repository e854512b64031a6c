//! A one-step bandit for tests.
#![allow(dead_code)]
use anyhow::Result;
use crafter_core::{
    record::Record,
    replay_buffer::{ReplayBuffer, ReplayBufferConfig, Transition},
    Env, ExperienceBufferBase, Observation, ReplayBufferBase, SpaceConfig, Step,
};
use crafter_candle_agent::{
    model::QNetworkConfig,
    net::{DuelingQNetConfig, QuantileQNetConfig, TorsoConfig},
    opt::OptimizerConfig,
};
use ndarray::ArrayD;

pub const OBS_SHAPE: [usize; 1] = [2];
pub const NUM_ACTIONS: usize = 2;

#[derive(Clone)]
pub struct BanditConfig;

/// Every episode is one step long. Action 0 gives reward 1, action 1 nothing.
pub struct Bandit;

pub fn bandit_obs() -> Observation {
    ArrayD::from_elem(vec![2], 0.5)
}

impl Env for Bandit {
    type Config = BanditConfig;
    type Info = ();

    fn build(_config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self)
    }

    fn reset(&mut self) -> Result<Observation> {
        Ok(bandit_obs())
    }

    fn step(&mut self, act: usize) -> Result<(Step<Self>, Record)> {
        let reward = if act == 0 { 1.0 } else { 0.0 };
        let step = Step::new(bandit_obs(), act, reward, true, false, ());
        Ok((step, Record::empty()))
    }
}

pub fn space() -> SpaceConfig {
    SpaceConfig::new(OBS_SHAPE, NUM_ACTIONS)
}

pub fn torso() -> TorsoConfig {
    TorsoConfig::Mlp { units: vec![16] }
}

pub fn dueling_model_config() -> QNetworkConfig<DuelingQNetConfig> {
    QNetworkConfig::default()
        .q_config(
            DuelingQNetConfig::default()
                .space(space())
                .torso(torso())
                .hidden_dim(16),
        )
        .opt_config(OptimizerConfig::default().learning_rate(5e-3))
}

pub fn quantile_model_config() -> QNetworkConfig<QuantileQNetConfig> {
    QNetworkConfig::default()
        .q_config(
            QuantileQNetConfig::default()
                .space(space())
                .torso(torso())
                .hidden_dim(16)
                .num_quantiles(8),
        )
        .opt_config(OptimizerConfig::default().learning_rate(5e-3))
}

pub fn buffer_config() -> ReplayBufferConfig {
    ReplayBufferConfig::default().capacity(1000).space(space())
}

/// A buffer holding both bandit transitions `n` times each.
pub fn filled_buffer(config: &ReplayBufferConfig, n: usize) -> Result<ReplayBuffer> {
    let mut buffer = ReplayBuffer::build(config)?;
    for _ in 0..n {
        for act in 0..NUM_ACTIONS {
            buffer.push(Transition {
                obs: bandit_obs(),
                act,
                reward: if act == 0 { 1.0 } else { 0.0 },
                next_obs: bandit_obs(),
                is_done: true,
            })?;
        }
    }
    Ok(buffer)
}
