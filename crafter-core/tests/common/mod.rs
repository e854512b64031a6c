//! A tiny episodic environment for tests.
#![allow(dead_code)]
use anyhow::Result;
use crafter_core::{record::Record, Env, Info, Observation, Policy, Step};
use ndarray::ArrayD;
use std::collections::BTreeMap;

#[derive(Clone)]
pub struct ChainEnvConfig {
    pub episode_len: usize,
}

#[derive(Default)]
pub struct ChainInfo {
    achievements: BTreeMap<String, bool>,
}

impl Info for ChainInfo {
    fn achievements(&self) -> Option<&BTreeMap<String, bool>> {
        Some(&self.achievements)
    }
}

/// Episodes of fixed length. Action 0 gives reward 1 and unlocks
/// `collect_wood`; any other action gives nothing.
pub struct ChainEnv {
    episode_len: usize,
    t: usize,
    wood: bool,
}

impl ChainEnv {
    fn obs(&self) -> Observation {
        ArrayD::from_shape_vec(vec![2], vec![self.t as f32 / self.episode_len as f32, 0.5])
            .unwrap()
    }
}

impl Env for ChainEnv {
    type Config = ChainEnvConfig;
    type Info = ChainInfo;

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            episode_len: config.episode_len,
            t: 0,
            wood: false,
        })
    }

    fn reset(&mut self) -> Result<Observation> {
        self.t = 0;
        self.wood = false;
        Ok(self.obs())
    }

    fn step(&mut self, act: usize) -> Result<(Step<Self>, Record)> {
        self.t += 1;
        let reward = if act == 0 { 1.0 } else { 0.0 };
        self.wood |= act == 0;
        let info = ChainInfo {
            achievements: BTreeMap::from([
                ("collect_wood".to_string(), self.wood),
                ("place_table".to_string(), false),
            ]),
        };
        let is_truncated = self.t >= self.episode_len;
        let step = Step::new(self.obs(), act, reward, false, is_truncated, info);
        Ok((step, Record::empty()))
    }
}

/// Always takes the same action.
pub struct ConstPolicy(pub usize);

impl Policy<ChainEnv> for ConstPolicy {
    fn sample(&mut self, _obs: &Observation) -> Result<usize> {
        Ok(self.0)
    }
}
