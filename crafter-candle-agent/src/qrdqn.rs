//! QR-DQN agent.
mod base;
mod config;
pub use base::QrDqn;
pub use config::QrDqnConfig;
