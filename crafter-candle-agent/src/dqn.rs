//! DQN agent.
//!
//! Scalar TD learner with Double DQN targets, n-step bootstrapping, optional
//! Munchausen regularization and optional prioritized replay.
mod base;
mod config;
pub use base::Dqn;
pub use config::{DqnConfig, MunchausenConfig};
