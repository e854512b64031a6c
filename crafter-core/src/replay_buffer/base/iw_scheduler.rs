//! Scheduling the exponent of importance weight for PER.
use serde::{Deserialize, Serialize};

/// Scheduler of the exponent of importance weight for PER.
///
/// $\beta$ moves linearly from `beta_0` to `beta_final` over `n_final`
/// sampling calls and stays there. The counter is monotonic.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct IwScheduler {
    /// Initial value of $\beta$.
    pub beta_0: f64,

    /// Final value of $\beta$.
    pub beta_final: f64,

    /// Sampling calls when beta reaches its final value.
    pub n_final: usize,

    /// Sampling calls so far.
    pub n: usize,
}

impl IwScheduler {
    /// Creates a scheduler.
    pub fn new(beta_0: f64, beta_final: f64, n_final: usize) -> Self {
        Self {
            beta_0,
            beta_final,
            n_final,
            n: 0,
        }
    }

    /// Gets the exponent of importance sampling weight.
    pub fn beta(&self) -> f64 {
        if self.n >= self.n_final {
            self.beta_final
        } else {
            let d = self.beta_final - self.beta_0;
            self.beta_0 + d * (self.n as f64 / self.n_final as f64)
        }
    }

    /// Counts a sampling call.
    pub fn step(&mut self) {
        self.n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beta_annealing() {
        let mut s = IwScheduler::new(0.4, 1.0, 4);
        let mut betas = vec![];
        for _ in 0..6 {
            betas.push(s.beta());
            s.step();
        }
        let expected = [0.4, 0.55, 0.7, 0.85, 1.0, 1.0];
        for (b, e) in betas.iter().zip(expected.iter()) {
            assert!((b - e).abs() < 1e-12, "{} != {}", b, e);
        }
    }

    #[test]
    fn test_zero_horizon() {
        let s = IwScheduler::new(0.4, 1.0, 0);
        assert_eq!(s.beta(), 1.0);
    }
}
