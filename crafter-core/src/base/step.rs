//! Environment step.
use super::{Env, Observation};
use std::collections::BTreeMap;

/// Additional information returned with every environment step.
pub trait Info {
    /// Achievements of the current episode, `name -> unlocked`.
    ///
    /// Used only for logging. Environments without achievements keep the
    /// default, which returns `None`.
    fn achievements(&self) -> Option<&BTreeMap<String, bool>> {
        None
    }
}

impl Info for () {}

/// Represents an action, observation and reward tuple `(a_t, o_t+1, r_t)`
/// with some additional information.
///
/// An environment emits [`Step`] object at every interaction steps.
/// This object is used to create transitions `(o_t, a_t, o_t+1, r_t, done_t)`.
pub struct Step<E: Env> {
    /// Action.
    pub act: usize,

    /// Observation.
    pub obs: Observation,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if episode is terminated.
    pub is_terminated: bool,

    /// Flag denoting if episode is truncated.
    pub is_truncated: bool,

    /// Information defined by the environment.
    pub info: E::Info,

    /// First observation of the next episode, set by [`Env::step_with_reset`]
    /// when this step ends the episode.
    pub init_obs: Option<Observation>,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(
        obs: Observation,
        act: usize,
        reward: f32,
        is_terminated: bool,
        is_truncated: bool,
        info: E::Info,
    ) -> Self {
        Step {
            act,
            obs,
            reward,
            is_terminated,
            is_truncated,
            info,
            init_obs: None,
        }
    }

    #[inline]
    /// Terminated or truncated.
    pub fn is_done(&self) -> bool {
        self.is_terminated || self.is_truncated
    }
}

/// Process [`Step`] and output an item [`Self::Output`].
///
/// This trait is used in [`Trainer`](crate::Trainer). [`Step`] objects are
/// transformed to [`Self::Output`], which will be pushed into a replay buffer
/// implementing [`ExperienceBufferBase`](crate::ExperienceBufferBase).
/// A processor may hold steps back, in which case [`StepProcessor::process`]
/// returns `None`.
pub trait StepProcessor<E: Env> {
    /// Configuration.
    type Config: Clone;

    /// The type of transitions produced by this trait.
    type Output;

    /// Build a producer.
    fn build(config: &Self::Config) -> Self;

    /// Resets the object with the first observation of an episode.
    fn reset(&mut self, init_obs: Observation);

    /// Processes a [`Step`] object.
    fn process(&mut self, step: Step<E>) -> Option<Self::Output>;
}
