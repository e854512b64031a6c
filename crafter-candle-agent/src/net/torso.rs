use anyhow::{ensure, Result};
use candle_core::Tensor;
use candle_nn::{
    conv::Conv2dConfig,
    conv2d, linear,
    sequential::{seq, Sequential},
    Module, VarBuilder,
};
use serde::{Deserialize, Serialize};

/// Feature extractor in front of the heads.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum TorsoConfig {
    /// Convolutions of the Nature DQN on `[C, H, W]` observations in the unit range:
    /// 32 filters 8x8 stride 4, 64 filters 4x4 stride 2, 64 filters 3x3 stride 1,
    /// each followed by ReLU, then flattened.
    Cnn,

    /// Fully connected layers with ReLU on flattened observations.
    Mlp {
        /// Output size of each layer.
        units: Vec<usize>,
    },
}

impl Default for TorsoConfig {
    fn default() -> Self {
        Self::Cnn
    }
}

/// Feature extractor built from a [`TorsoConfig`].
pub struct Torso {
    seq: Sequential,
    out_dim: usize,
}

fn conv_out(size: usize, kernel: usize, stride: usize) -> usize {
    (size - kernel) / stride + 1
}

fn stride(s: usize) -> Conv2dConfig {
    Conv2dConfig {
        stride: s,
        ..Default::default()
    }
}

impl Torso {
    fn create_cnn(vb: &VarBuilder, obs_shape: &[usize]) -> Result<(Sequential, usize)> {
        ensure!(
            obs_shape.len() == 3,
            "the convolutional torso needs [C, H, W] observations, got {:?}",
            obs_shape
        );
        let (c, h, w) = (obs_shape[0], obs_shape[1], obs_shape[2]);
        ensure!(
            h >= 36 && w >= 36,
            "observations of {}x{} are too small for the convolutional torso",
            h,
            w
        );
        let h = conv_out(conv_out(conv_out(h, 8, 4), 4, 2), 3, 1);
        let w = conv_out(conv_out(conv_out(w, 8, 4), 4, 2), 3, 1);

        let seq = seq()
            .add(conv2d(c, 32, 8, stride(4), vb.pp("conv1"))?)
            .add_fn(|xs| xs.relu())
            .add(conv2d(32, 64, 4, stride(2), vb.pp("conv2"))?)
            .add_fn(|xs| xs.relu())
            .add(conv2d(64, 64, 3, stride(1), vb.pp("conv3"))?)
            .add_fn(|xs| xs.relu()?.flatten_from(1));

        Ok((seq, 64 * h * w))
    }

    fn create_mlp(vb: &VarBuilder, obs_shape: &[usize], units: &[usize]) -> Result<(Sequential, usize)> {
        let mut in_dim: usize = obs_shape.iter().product();
        let mut seq = seq().add_fn(|xs| xs.flatten_from(1));
        for (i, &out_dim) in units.iter().enumerate() {
            seq = seq
                .add(linear(in_dim, out_dim, vb.pp(format!("ln{}", i)))?)
                .add_fn(|xs| xs.relu());
            in_dim = out_dim;
        }
        Ok((seq, in_dim))
    }

    /// Builds the torso for observations of the given shape.
    pub fn build(vb: VarBuilder, config: &TorsoConfig, obs_shape: &[usize]) -> Result<Self> {
        let (seq, out_dim) = match config {
            TorsoConfig::Cnn => Self::create_cnn(&vb, obs_shape)?,
            TorsoConfig::Mlp { units } => Self::create_mlp(&vb, obs_shape, units)?,
        };
        Ok(Self { seq, out_dim })
    }

    /// Size of the feature vector.
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Maps a batch of observations to features of shape `[batch, out_dim]`.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        Ok(self.seq.forward(xs)?)
    }
}
