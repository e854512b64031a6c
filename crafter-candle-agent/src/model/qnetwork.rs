use super::SubModel1;
use crate::{
    opt::{Optimizer, OptimizerConfig},
    util::{clip_grad_norm, hard_update, reinit_params},
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use rand::Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`QNetwork`].
pub struct QNetworkConfig<C> {
    /// Configuration of the network.
    pub q_config: Option<C>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,
}

impl<C> Default for QNetworkConfig<C> {
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<C> QNetworkConfig<C>
where
    C: DeserializeOwned + Serialize,
{
    /// Sets the configuration of the network.
    pub fn q_config(mut self, v: C) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets the configuration of the optimizer.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`QNetworkConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`QNetworkConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// A Q-network together with its variables and optimizer.
///
/// The network `Q` maps a batch of observations to either action values or
/// return quantiles. An online network and its target are two instances
/// built from the same configuration.
pub struct QNetwork<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
{
    varmap: VarMap,
    q: Q,
    opt: Optimizer,
}

impl<Q> QNetwork<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs [`QNetwork`].
    pub fn build(config: QNetworkConfig<Q::Config>, device: Device) -> Result<Self> {
        let q_config = config.q_config.context("q_config is not set.")?;
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Q::build(vb, q_config)?
        };
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            varmap,
            q,
            opt,
        })
    }

    /// Re-initializes all parameters from `rng`.
    pub fn reinit(&mut self, rng: &mut impl Rng) -> Result<()> {
        reinit_params(&self.varmap, rng)
    }

    /// Outputs the action values or quantiles of a batch of observations.
    pub fn forward(&self, obs: &Tensor) -> Result<Tensor> {
        self.q.forward(obs)
    }

    /// Backpropagates `loss`, clips the global gradient norm and takes an optimizer step.
    ///
    /// Returns the gradient norm before clipping.
    pub fn backward_step(&mut self, loss: &Tensor, max_grad_norm: f64) -> Result<f64> {
        let mut grads = loss.backward()?;
        let vars = self.varmap.all_vars();
        let norm = clip_grad_norm(&vars, &mut grads, max_grad_norm)?;
        self.opt.step(&grads)?;
        Ok(norm)
    }

    /// Overwrites the parameters with those of `src`.
    pub fn copy_from(&mut self, src: &Self) -> Result<()> {
        hard_update(&self.varmap, &src.varmap)
    }

    /// Saves the parameters in a safetensors file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save qnetwork to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters from a safetensors file written by [`QNetwork::save`].
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load qnetwork from {:?}", path.as_ref());
        Ok(())
    }
}
