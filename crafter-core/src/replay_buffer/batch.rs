//! Transitions and batches of transitions.
use crate::Observation;
use ndarray::ArrayD;

/// A single transition `(o_t, a_t, R_t, o_t+n, done)`.
///
/// `reward` is the (possibly multi-step) discounted return and `next_obs` is
/// the observation the return bootstraps from.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Observation.
    pub obs: Observation,

    /// Action.
    pub act: usize,

    /// Discounted return.
    pub reward: f32,

    /// Next observation.
    pub next_obs: Observation,

    /// If `true`, no bootstrapping from `next_obs`.
    pub is_done: bool,
}

/// Identifies a sampled slot of a replay buffer.
///
/// `generation` is the write count of the slot at sampling time. A priority
/// update carrying an outdated generation refers to a transition that has
/// already been evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId {
    /// Index of the slot.
    pub ix: usize,

    /// Write generation of the slot when it was sampled.
    pub generation: u64,
}

/// A batch of transitions.
///
/// Observations are decoded to `f32` in the unit range with a leading batch
/// dimension.
#[derive(Debug, Clone)]
pub struct TransitionBatch {
    /// Observations, shape `[batch, ...]`.
    pub obs: ArrayD<f32>,

    /// Actions.
    pub act: Vec<usize>,

    /// Next observations, shape `[batch, ...]`.
    pub next_obs: ArrayD<f32>,

    /// Discounted returns.
    pub reward: Vec<f32>,

    /// Done flags, `1` means no bootstrapping.
    pub is_done: Vec<i8>,

    /// Sampled slots.
    pub ix_sample: Vec<SlotId>,

    /// Importance weights, present only under prioritized sampling.
    pub weight: Option<Vec<f32>>,
}

impl TransitionBatch {
    /// Unpack the data `(o_t, a_t, o_t+n, R_t, is_done_t, ix_sample, weight)`.
    #[allow(clippy::type_complexity)]
    pub fn unpack(
        self,
    ) -> (
        ArrayD<f32>,
        Vec<usize>,
        ArrayD<f32>,
        Vec<f32>,
        Vec<i8>,
        Vec<SlotId>,
        Option<Vec<f32>>,
    ) {
        (
            self.obs,
            self.act,
            self.next_obs,
            self.reward,
            self.is_done,
            self.ix_sample,
            self.weight,
        )
    }

    /// Returns the number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch has no transitions.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }
}
