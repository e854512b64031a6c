//! Replay buffer interface.
//!
//! Storing transitions and generating batches are separate concerns.
//! [`ExperienceBufferBase`] is used by the sampler pushing transitions,
//! [`ReplayBufferBase`] by the agent drawing batches.
use anyhow::Result;

/// Interface for buffers that store experiences from environments.
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes a new experience into the buffer.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the current number of experiences in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer holds no experience.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for replay buffers that generate batches for training.
pub trait ReplayBufferBase {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Identifies a sampled slot for priority feedback.
    type SampleId;

    /// Builds a new replay buffer from the given configuration.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Constructs a batch of experiences for training.
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;

    /// Updates the priorities of sampled experiences given their errors.
    ///
    /// Buffers without prioritization ignore the call. Identifiers whose slot
    /// was overwritten after sampling are ignored as well.
    fn update_priority(&mut self, ids: &[Self::SampleId], td_errs: &[f32]);
}
