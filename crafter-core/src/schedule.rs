//! Schedules mapping a step counter to a scalar.
//!
//! Used for annealing the exploration rate of epsilon-greedy policies.
//! Both schedules hold the end value beyond the decay horizon and are pure
//! functions of the step.
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A pure function of a step counter.
pub trait Schedule {
    /// Value at step `t`.
    fn value(&self, t: usize) -> f64;
}

/// Linear interpolation from `start` to `end` over `decay_steps`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct LinearSchedule {
    start: f64,
    end: f64,
    decay_steps: usize,
}

impl LinearSchedule {
    /// Creates a linear schedule. `decay_steps` is floored at 1.
    pub fn new(start: f64, end: f64, decay_steps: usize) -> Self {
        Self {
            start,
            end,
            decay_steps: decay_steps.max(1),
        }
    }
}

impl Schedule for LinearSchedule {
    fn value(&self, t: usize) -> f64 {
        let frac = (t as f64 / self.decay_steps.max(1) as f64).min(1.0);
        self.start + frac * (self.end - self.start)
    }
}

/// Cosine annealing from `start` to `end` over `decay_steps`, then `end`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CosineSchedule {
    start: f64,
    end: f64,
    decay_steps: usize,
}

impl CosineSchedule {
    /// Creates a cosine schedule. `decay_steps` is floored at 1.
    pub fn new(start: f64, end: f64, decay_steps: usize) -> Self {
        Self {
            start,
            end,
            decay_steps: decay_steps.max(1),
        }
    }
}

impl Schedule for CosineSchedule {
    fn value(&self, t: usize) -> f64 {
        let decay_steps = self.decay_steps.max(1);
        if t >= decay_steps {
            return self.end;
        }
        let cos = (1.0 + (PI * t as f64 / decay_steps as f64).cos()) / 2.0;
        self.end + (self.start - self.end) * cos
    }
}

/// Serializable choice of schedule.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum ScheduleConfig {
    /// See [`LinearSchedule`].
    Linear(LinearSchedule),

    /// See [`CosineSchedule`].
    Cosine(CosineSchedule),

    /// Always the same value.
    Constant(f64),
}

impl ScheduleConfig {
    /// Linear schedule.
    pub fn linear(start: f64, end: f64, decay_steps: usize) -> Self {
        Self::Linear(LinearSchedule::new(start, end, decay_steps))
    }

    /// Cosine schedule.
    pub fn cosine(start: f64, end: f64, decay_steps: usize) -> Self {
        Self::Cosine(CosineSchedule::new(start, end, decay_steps))
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::linear(1.0, 0.01, 50_000)
    }
}

impl Schedule for ScheduleConfig {
    fn value(&self, t: usize) -> f64 {
        match self {
            Self::Linear(s) => s.value(t),
            Self::Cosine(s) => s.value(t),
            Self::Constant(v) => *v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_linear_endpoints() {
        let s = LinearSchedule::new(1.0, 0.1, 100);
        assert!(close(s.value(0), 1.0));
        assert!(close(s.value(50), 0.55));
        assert!(close(s.value(100), 0.1));
        assert!(close(s.value(1_000_000), 0.1));
    }

    #[test]
    fn test_linear_monotone() {
        let s = LinearSchedule::new(1.0, 0.0, 37);
        let vs: Vec<f64> = (0..50).map(|t| s.value(t)).collect();
        assert!(vs.windows(2).all(|w| w[1] <= w[0]));
        assert!(vs.iter().all(|v| (0.0..=1.0).contains(v)));

        let s = LinearSchedule::new(0.2, 0.8, 10);
        assert!((0..20).map(|t| s.value(t)).collect::<Vec<_>>().windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_cosine_endpoints() {
        let s = CosineSchedule::new(1.0, 0.0, 100);
        assert!(close(s.value(0), 1.0));
        assert!(close(s.value(50), 0.5));
        assert!(close(s.value(100), 0.0));
        assert!(close(s.value(101), 0.0));
        assert!((0..100).all(|t| (0.0..=1.0).contains(&s.value(t))));
    }

    #[test]
    fn test_zero_decay_steps() {
        let s = LinearSchedule::new(1.0, 0.5, 0);
        assert!(close(s.value(0), 1.0));
        assert!(close(s.value(1), 0.5));
        let s = CosineSchedule::new(1.0, 0.5, 0);
        assert!(close(s.value(1), 0.5));
    }

    #[test]
    fn test_config_yaml() {
        let config = ScheduleConfig::cosine(1.0, 0.05, 1000);
        let yaml = serde_yaml::to_string(&config).unwrap();
        let config_: ScheduleConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, config_);
        assert!(close(config_.value(2000), 0.05));
    }
}
