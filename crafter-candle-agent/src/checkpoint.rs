//! Saving and loading the parameters and counters of an agent.
use crate::model::{QNetwork, SubModel1};
use anyhow::Result;
use candle_core::Tensor;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, Write},
    path::Path,
};

const QNET_FILE: &str = "qnet.safetensors";
const QNET_TGT_FILE: &str = "qnet_tgt.safetensors";
const STATE_FILE: &str = "state.yaml";

/// Counters stored next to the parameters.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Default)]
pub struct AgentState {
    /// Number of optimization steps.
    pub n_opts: usize,

    /// Time step of the exploration schedule.
    pub explorer_t: usize,
}

impl AgentState {
    /// Loads counters from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves counters as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Writes `qnet.safetensors`, `qnet_tgt.safetensors` and `state.yaml` into `dir`.
pub fn save<Q>(dir: &Path, qnet: &QNetwork<Q>, qnet_tgt: &QNetwork<Q>, state: &AgentState) -> Result<()>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    fs::create_dir_all(dir)?;
    qnet.save(dir.join(QNET_FILE))?;
    qnet_tgt.save(dir.join(QNET_TGT_FILE))?;
    state.save(dir.join(STATE_FILE))?;
    info!("Saved agent to {:?} after {} optimization steps", dir, state.n_opts);
    Ok(())
}

/// Restores what [`save`] wrote into `dir`.
pub fn load<Q>(dir: &Path, qnet: &mut QNetwork<Q>, qnet_tgt: &mut QNetwork<Q>) -> Result<AgentState>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    qnet.load(dir.join(QNET_FILE))?;
    qnet_tgt.load(dir.join(QNET_TGT_FILE))?;
    let state = AgentState::load(dir.join(STATE_FILE))?;
    info!("Loaded agent from {:?}", dir);
    Ok(state)
}
