//! Q-network architectures.
mod dueling;
mod quantile;
mod torso;
pub use dueling::{DuelingQNet, DuelingQNetConfig};
pub use quantile::{QuantileQNet, QuantileQNetConfig};
pub use torso::{Torso, TorsoConfig};
