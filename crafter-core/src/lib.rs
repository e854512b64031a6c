#![warn(missing_docs)]
//! Core of a value-based reinforcement learning pipeline.
//!
//! This crate is backend-free. It defines the interfaces between an environment,
//! an agent and a replay buffer, and provides the pieces that do not depend on a
//! tensor library:
//!
//! * [`replay_buffer`]: a ring buffer of byte-quantized transitions with optional
//!   prioritized sampling, and the n-step [`StepProcessor`] feeding it.
//! * [`schedule`]: linear and cosine schedules used for exploration annealing.
//! * [`record`]: metrics records and recorders.
//! * [`Trainer`] and [`Evaluator`]: the training loop and greedy evaluation.
pub mod error;
pub mod record;
pub mod replay_buffer;
pub mod schedule;

mod base;
pub use base::{
    Agent, Configurable, Env, ExperienceBufferBase, Info, Observation, Policy, ReplayBufferBase,
    Step, StepProcessor,
};

mod space;
pub use space::SpaceConfig;

mod seed;
pub use seed::SeedContext;

mod evaluator;
pub use evaluator::{DefaultEvaluator, Evaluator};

mod trainer;
pub use trainer::{Sampler, Trainer, TrainerConfig};
