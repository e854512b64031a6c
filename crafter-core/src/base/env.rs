//! Environment.
use super::{Info, Observation, Step};
use crate::record::Record;
use anyhow::Result;

/// Represents an environment with a discrete action space.
///
/// The game itself is an external collaborator. This trait is the only
/// surface through which it is consumed.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Information in the [`Step`] object.
    type Info: Info;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment and returns the first observation of an episode.
    fn reset(&mut self) -> Result<Observation>;

    /// Performes an environment step.
    ///
    /// The returned [`Record`] carries environment-specific values to be logged.
    fn step(&mut self, act: usize) -> Result<(Step<Self>, Record)>
    where
        Self: Sized;

    /// Resets the environment with a given index.
    ///
    /// The index is used in an arbitrary way, for example as a seed of the
    /// episode. This method is called by [`DefaultEvaluator`].
    ///
    /// [`DefaultEvaluator`]: crate::DefaultEvaluator
    fn reset_with_index(&mut self, _ix: usize) -> Result<Observation> {
        self.reset()
    }

    /// Performes an environment step and resets the environment if the episode ends.
    ///
    /// When the episode ends, the first observation of the next episode is
    /// stored in [`Step::init_obs`].
    fn step_with_reset(&mut self, act: usize) -> Result<(Step<Self>, Record)>
    where
        Self: Sized,
    {
        let (mut step, record) = self.step(act)?;
        if step.is_done() {
            step.init_obs = Some(self.reset()?);
        }
        Ok((step, record))
    }
}
