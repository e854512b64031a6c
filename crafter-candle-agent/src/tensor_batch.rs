//! Batches of transitions as tensors.
use crate::util::{arrayd_to_tensor, vec_to_tensor};
use anyhow::Result;
use candle_core::{Device, Tensor};
use crafter_core::replay_buffer::{SlotId, TransitionBatch};

/// A [`TransitionBatch`] moved onto a device.
///
/// Actions are `u32` for gathering, everything else is `f32`.
pub struct TensorBatch {
    /// Observations, shape `[batch, ...]`.
    pub obs: Tensor,

    /// Actions, shape `[batch]`.
    pub act: Tensor,

    /// Next observations, shape `[batch, ...]`.
    pub next_obs: Tensor,

    /// Discounted returns, shape `[batch]`.
    pub reward: Tensor,

    /// `1 - done`, shape `[batch]`.
    pub not_done: Tensor,

    /// Importance weights, shape `[batch]`, if the batch comes from PER.
    pub weight: Option<Tensor>,

    /// Sampled slots for priority feedback.
    pub ids: Vec<SlotId>,
}

impl TensorBatch {
    /// Converts a batch of transitions.
    pub fn from_batch(batch: TransitionBatch, device: &Device) -> Result<Self> {
        let not_done: Vec<f32> = batch.is_done.iter().map(|&d| (1 - d) as f32).collect();
        let weight = match &batch.weight {
            Some(ws) => Some(vec_to_tensor::<f32, f32>(ws, device)?),
            None => None,
        };

        Ok(Self {
            obs: arrayd_to_tensor::<f32, f32>(&batch.obs, false, device)?,
            act: vec_to_tensor::<usize, u32>(&batch.act, device)?,
            next_obs: arrayd_to_tensor::<f32, f32>(&batch.next_obs, false, device)?,
            reward: vec_to_tensor::<f32, f32>(&batch.reward, device)?,
            not_done: vec_to_tensor::<f32, f32>(&not_done, device)?,
            weight,
            ids: batch.ix_sample,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    #[test]
    fn test_from_batch() -> Result<()> {
        let batch = TransitionBatch {
            obs: ArrayD::from_elem(vec![2, 3], 0.5),
            act: vec![1, 0],
            next_obs: ArrayD::from_elem(vec![2, 3], 1.0),
            reward: vec![1.0, -1.0],
            is_done: vec![0, 1],
            ix_sample: vec![
                SlotId { ix: 4, generation: 5 },
                SlotId { ix: 1, generation: 2 },
            ],
            weight: Some(vec![1.0, 0.5]),
        };
        let batch = TensorBatch::from_batch(batch, &Device::Cpu)?;
        assert_eq!(batch.ids.len(), 2);
        assert_eq!(batch.obs.dims(), &[2, 3]);
        assert_eq!(batch.act.to_vec1::<u32>()?, vec![1, 0]);
        assert_eq!(batch.not_done.to_vec1::<f32>()?, vec![1.0, 0.0]);
        assert_eq!(batch.weight.unwrap().to_vec1::<f32>()?, vec![1.0, 0.5]);
        Ok(())
    }
}
