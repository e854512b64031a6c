//! Agent.
use super::{Env, Policy, ReplayBufferBase};
use crate::record::Record;
use anyhow::Result;
use std::path::Path;

/// Represents a trainable policy on an environment.
///
/// An agent owns an online value model and a target copy of it. The training
/// loop drives three independent periods: sampling actions via [`Policy`],
/// optimization steps via [`Agent::opt_with_record`] and target
/// synchronization via [`Agent::sync_target`].
pub trait Agent<E: Env, R: ReplayBufferBase>: Policy<E> {
    /// Set the policy to training mode.
    fn train(&mut self);

    /// Set the policy to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Performs an optimization step.
    ///
    /// Returns `false` if the step was skipped, for example because the
    /// replay buffer holds fewer transitions than the warmup level.
    fn opt(&mut self, buffer: &mut R) -> Result<bool> {
        Ok(self.opt_with_record(buffer)?.is_some())
    }

    /// Performs an optimization step and returns some information.
    ///
    /// `buffer` is a replay buffer from which transitions will be taken
    /// for updating model parameters. `None` is returned when the step was
    /// skipped.
    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Option<Record>>;

    /// Copies the parameters of the online model into the target model.
    fn sync_target(&mut self) -> Result<()>;

    /// Save the parameters of the agent in the given directory.
    ///
    /// This method creates a number of files in the directory, for example
    /// the online and target models and the counters of the agent.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
