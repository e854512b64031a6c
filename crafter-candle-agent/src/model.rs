//! Interface of neural networks used in the agents.
mod qnetwork;
use anyhow::Result;
use candle_core::{Tensor, D};
use candle_nn::VarBuilder;
pub use qnetwork::{QNetwork, QNetworkConfig};

/// Neural network model not owing its [`VarMap`] internally.
///
/// [`VarMap`]: candle_nn::VarMap
pub trait SubModel1 {
    /// Configuration from which [`SubModel1`] is constructed.
    type Config;

    /// Input of the [`SubModel1`].
    type Input;

    /// Output of the [`SubModel1`].
    type Output;

    /// Builds [`SubModel1`] with [`VarBuilder`] and [`SubModel1::Config`].
    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// A generalized forward function.
    fn forward(&self, input: &Self::Input) -> Result<Self::Output>;
}

/// Output of a Q-network for a batch of observations.
#[derive(Debug, Clone)]
pub enum ActionValue {
    /// Action values, shape `[batch, num_actions]`.
    Scalar(Tensor),

    /// Return quantiles, shape `[batch, num_actions, num_quantiles]`.
    Quantile(Tensor),
}

impl ActionValue {
    /// Expected action values, shape `[batch, num_actions]`.
    ///
    /// Quantiles are averaged.
    pub fn q_values(&self) -> Result<Tensor> {
        match self {
            Self::Scalar(q) => Ok(q.clone()),
            Self::Quantile(z) => Ok(z.mean(D::Minus1)?),
        }
    }

    /// Number of actions.
    pub fn num_actions(&self) -> usize {
        match self {
            Self::Scalar(t) | Self::Quantile(t) => t.dims().get(1).copied().unwrap_or(0),
        }
    }

    /// Number of observations in the batch.
    pub fn batch_size(&self) -> usize {
        match self {
            Self::Scalar(t) | Self::Quantile(t) => t.dims().first().copied().unwrap_or(0),
        }
    }

    /// Action maximizing the expected value for each observation.
    pub fn greedy_actions(&self) -> Result<Vec<usize>> {
        let ixs = self.q_values()?.argmax(D::Minus1)?.to_vec1::<u32>()?;
        Ok(ixs.into_iter().map(|ix| ix as usize).collect())
    }
}
