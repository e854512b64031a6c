use super::{Torso, TorsoConfig};
use crate::model::SubModel1;
use anyhow::Result;
use candle_core::{Tensor, D};
use candle_nn::{linear, Linear, Module, VarBuilder};
use crafter_core::SpaceConfig;
use serde::{Deserialize, Serialize};

/// Configuration of [`DuelingQNet`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DuelingQNetConfig {
    /// Observation shape and number of actions.
    pub space: SpaceConfig,

    /// Feature extractor.
    pub torso: TorsoConfig,

    /// Width of the fully connected layers.
    pub hidden_dim: usize,

    /// If `false`, a plain three-layer head replaces the two streams.
    pub dueling: bool,
}

impl Default for DuelingQNetConfig {
    fn default() -> Self {
        Self {
            space: SpaceConfig::default(),
            torso: TorsoConfig::default(),
            hidden_dim: 512,
            dueling: true,
        }
    }
}

impl DuelingQNetConfig {
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

    /// Sets the width of the fully connected layers.
    pub fn hidden_dim(mut self, v: usize) -> Self {
        self.hidden_dim = v;
        self
    }

    /// Switches between the dueling and the plain head.
    pub fn dueling(mut self, v: bool) -> Self {
        self.dueling = v;
        self
    }
}

enum Head {
    Dueling {
        fc_shared: Linear,
        fc_value: Linear,
        value_head: Linear,
        fc_advantage: Linear,
        advantage_head: Linear,
    },
    Plain {
        fc1: Linear,
        fc2: Linear,
        fc_out: Linear,
    },
}

/// Action-value network with a dueling head.
///
/// The dueling head computes `Q = V + A - mean_a A` from a value stream and
/// an advantage stream on top of a shared fully connected layer. Output shape
/// is `[batch, num_actions]`.
pub struct DuelingQNet {
    torso: Torso,
    head: Head,
}

impl SubModel1 for DuelingQNet {
    type Config = DuelingQNetConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let torso = Torso::build(vb.pp("torso"), &config.torso, &config.space.observation_shape)?;
        let (d, h, n) = (torso.out_dim(), config.hidden_dim, config.space.num_actions);
        let head = if config.dueling {
            Head::Dueling {
                fc_shared: linear(d, h, vb.pp("fc_shared"))?,
                fc_value: linear(h, h, vb.pp("fc_value"))?,
                value_head: linear(h, 1, vb.pp("value_head"))?,
                fc_advantage: linear(h, h, vb.pp("fc_advantage"))?,
                advantage_head: linear(h, n, vb.pp("advantage_head"))?,
            }
        } else {
            Head::Plain {
                fc1: linear(d, h, vb.pp("fc1"))?,
                fc2: linear(h, h, vb.pp("fc2"))?,
                fc_out: linear(h, n, vb.pp("fc_out"))?,
            }
        };
        Ok(Self { torso, head })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.torso.forward(xs)?;
        let q = match &self.head {
            Head::Dueling {
                fc_shared,
                fc_value,
                value_head,
                fc_advantage,
                advantage_head,
            } => {
                let xs = fc_shared.forward(&xs)?.relu()?;
                let v = value_head.forward(&fc_value.forward(&xs)?.relu()?)?;
                let a = advantage_head.forward(&fc_advantage.forward(&xs)?.relu()?)?;
                let a = a.broadcast_sub(&a.mean_keepdim(D::Minus1)?)?;
                a.broadcast_add(&v)?
            }
            Head::Plain { fc1, fc2, fc_out } => {
                let xs = fc1.forward(&xs)?.relu()?;
                let xs = fc2.forward(&xs)?.relu()?;
                fc_out.forward(&xs)?
            }
        };
        Ok(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn build(dueling: bool) -> Result<(VarMap, DuelingQNet)> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = DuelingQNetConfig::default()
            .space(SpaceConfig::new([3, 64, 64], 17))
            .hidden_dim(32)
            .dueling(dueling);
        let qnet = DuelingQNet::build(vb, config)?;
        Ok((varmap, qnet))
    }

    #[test]
    fn test_output_shape() -> Result<()> {
        for dueling in [true, false] {
            let (_, qnet) = build(dueling)?;
            let xs = Tensor::rand(0f32, 1.0, (2, 3, 64, 64), &Device::Cpu)?;
            assert_eq!(qnet.forward(&xs)?.dims(), &[2, 17]);
        }
        Ok(())
    }

    #[test]
    fn test_variable_names() -> Result<()> {
        let (varmap, _) = build(true)?;
        let data = varmap.data().lock().unwrap();
        for name in [
            "torso.conv1.weight",
            "torso.conv3.bias",
            "fc_shared.weight",
            "value_head.weight",
            "advantage_head.bias",
        ] {
            assert!(data.contains_key(name), "{}", name);
        }
        assert_eq!(data["fc_shared.weight"].dims(), &[32, 1024]);
        Ok(())
    }
}
