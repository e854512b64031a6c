use super::{Torso, TorsoConfig};
use crate::model::SubModel1;
use anyhow::{ensure, Result};
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};
use crafter_core::SpaceConfig;
use serde::{Deserialize, Serialize};

/// Configuration of [`QuantileQNet`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct QuantileQNetConfig {
    /// Observation shape and number of actions.
    pub space: SpaceConfig,

    /// Feature extractor.
    pub torso: TorsoConfig,

    /// Width of the shared fully connected layer.
    pub hidden_dim: usize,

    /// Number of quantiles per action.
    pub num_quantiles: usize,
}

impl Default for QuantileQNetConfig {
    fn default() -> Self {
        Self {
            space: SpaceConfig::default(),
            torso: TorsoConfig::default(),
            hidden_dim: 512,
            num_quantiles: 51,
        }
    }
}

impl QuantileQNetConfig {
    /// Sets the observation shape and the number of actions.
    pub fn space(mut self, v: SpaceConfig) -> Self {
        self.space = v;
        self
    }

    /// Sets the feature extractor.
    pub fn torso(mut self, v: TorsoConfig) -> Self {
        self.torso = v;
        self
    }

    /// Sets the width of the shared fully connected layer.
    pub fn hidden_dim(mut self, v: usize) -> Self {
        self.hidden_dim = v;
        self
    }

    /// Sets the number of quantiles per action.
    pub fn num_quantiles(mut self, v: usize) -> Self {
        self.num_quantiles = v;
        self
    }
}

/// Dueling network over return quantiles.
///
/// Output shape is `[batch, num_actions, num_quantiles]`. Each quantile is
/// decomposed as `Z = V + A - mean_a A` where `V` has one value per quantile
/// shared by all actions.
pub struct QuantileQNet {
    torso: Torso,
    fc: Linear,
    value_head: Linear,
    adv_head: Linear,
    num_actions: usize,
    num_quantiles: usize,
}

impl SubModel1 for QuantileQNet {
    type Config = QuantileQNetConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        ensure!(config.num_quantiles > 0, "num_quantiles must be positive");
        let torso = Torso::build(vb.pp("torso"), &config.torso, &config.space.observation_shape)?;
        let (a, n) = (config.space.num_actions, config.num_quantiles);
        let fc = linear(torso.out_dim(), config.hidden_dim, vb.pp("fc"))?;
        let value_head = linear(config.hidden_dim, n, vb.pp("value_head"))?;
        let adv_head = linear(config.hidden_dim, a * n, vb.pp("adv_head"))?;
        Ok(Self {
            torso,
            fc,
            value_head,
            adv_head,
            num_actions: a,
            num_quantiles: n,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.fc.forward(&self.torso.forward(xs)?)?.relu()?;
        let batch_size = xs.dims()[0];
        let v = self.value_head.forward(&xs)?.unsqueeze(1)?;
        let a = self
            .adv_head
            .forward(&xs)?
            .reshape((batch_size, self.num_actions, self.num_quantiles))?;
        let a = a.broadcast_sub(&a.mean_keepdim(1)?)?;
        Ok(a.broadcast_add(&v)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, D};
    use candle_nn::VarMap;

    #[test]
    fn test_output_shape() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = QuantileQNetConfig::default()
            .space(SpaceConfig::new([3, 64, 64], 17))
            .hidden_dim(16)
            .num_quantiles(5);
        let qnet = QuantileQNet::build(vb, config)?;
        let xs = Tensor::rand(0f32, 1.0, (3, 3, 64, 64), &Device::Cpu)?;
        assert_eq!(qnet.forward(&xs)?.dims(), &[3, 17, 5]);
        Ok(())
    }

    #[test]
    fn test_advantage_is_centered() -> Result<()> {
        // the mean over actions of each quantile equals the value stream
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = QuantileQNetConfig::default()
            .space(SpaceConfig::new([4], 3))
            .torso(TorsoConfig::Mlp { units: vec![8] })
            .hidden_dim(8)
            .num_quantiles(4);
        let qnet = QuantileQNet::build(vb, config)?;
        let xs = Tensor::rand(0f32, 1.0, (2, 4), &Device::Cpu)?;

        let z_mean = qnet.forward(&xs)?.mean(1)?;
        let h = qnet.fc.forward(&qnet.torso.forward(&xs)?)?.relu()?;
        let v = qnet.value_head.forward(&h)?;
        let diff = (z_mean - v)?.abs()?.max(D::Minus1)?.max(0)?.to_scalar::<f32>()?;
        assert!(diff < 1e-5);
        Ok(())
    }

    #[test]
    fn test_rejects_zero_quantiles() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = QuantileQNetConfig::default().num_quantiles(0);
        assert!(QuantileQNet::build(vb, config).is_err());
    }
}
