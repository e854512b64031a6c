//! Core functionalities.
mod agent;
mod env;
mod policy;
mod replay_buffer;
mod step;
pub use agent::Agent;
pub use env::Env;
pub use policy::{Configurable, Policy};
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
pub use step::{Info, Step, StepProcessor};

/// An observation of the environment.
///
/// Observations are dense `f32` arrays in the unit range, for example a
/// channel-first image of shape `[3, 64, 64]`. A leading batch dimension is
/// never included.
pub type Observation = ndarray::ArrayD<f32>;
