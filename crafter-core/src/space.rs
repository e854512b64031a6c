//! Observation and action spaces.
use crate::error::CrafterError;
use serde::{Deserialize, Serialize};

/// Shape of observations and number of discrete actions.
///
/// Declared explicitly and shared by replay buffers, models and policies.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct SpaceConfig {
    /// Shape of a single observation, e.g. `[3, 64, 64]`.
    pub observation_shape: Vec<usize>,

    /// Number of discrete actions.
    pub num_actions: usize,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            observation_shape: vec![3, 64, 64],
            num_actions: 17,
        }
    }
}

impl SpaceConfig {
    /// Creates a space configuration.
    pub fn new(observation_shape: impl Into<Vec<usize>>, num_actions: usize) -> Self {
        Self {
            observation_shape: observation_shape.into(),
            num_actions,
        }
    }

    /// Number of scalar elements in one observation.
    pub fn obs_len(&self) -> usize {
        self.observation_shape.iter().product()
    }

    /// Checks that `shape` matches the observation shape.
    pub fn check_obs_shape(&self, shape: &[usize]) -> Result<(), CrafterError> {
        if shape == self.observation_shape.as_slice() {
            Ok(())
        } else {
            Err(CrafterError::ObservationShape {
                expected: self.observation_shape.clone(),
                got: shape.to_vec(),
            })
        }
    }
}
