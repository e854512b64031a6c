//! Action selection from the output of a Q-network.
use crate::model::ActionValue;
use anyhow::Result;
use crafter_core::schedule::{Schedule, ScheduleConfig};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Takes the action with the largest expected value.
///
/// Quantile outputs are averaged over quantiles before the arg-max. Ties are
/// broken toward the lowest action index.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct Greedy;

impl Greedy {
    /// Returns the greedy action for each observation in the batch.
    pub fn action(&self, av: &ActionValue) -> Result<Vec<usize>> {
        av.greedy_actions()
    }
}

/// Epsilon-greedy explorer with an annealed exploration rate.
///
/// `epsilon = schedule.value(t)`, where `t` counts the calls to
/// [`EpsilonGreedy::action`] on both the random and the greedy branch.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    /// Schedule of the exploration rate.
    pub schedule: ScheduleConfig,

    /// Number of calls so far.
    pub t: usize,
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self::new(ScheduleConfig::default())
    }
}

impl EpsilonGreedy {
    /// Constructs epsilon-greedy explorer.
    pub fn new(schedule: ScheduleConfig) -> Self {
        Self { schedule, t: 0 }
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> f64 {
        self.schedule.value(self.t)
    }

    /// Takes an action for each observation in the batch.
    ///
    /// A single uniform draw decides between a random and the greedy action.
    /// With `force_random` the action is random regardless of epsilon.
    pub fn action(
        &mut self,
        av: &ActionValue,
        rng: &mut impl Rng,
        force_random: bool,
    ) -> Result<Vec<usize>> {
        let eps = self.epsilon();
        self.t += 1;

        if force_random || rng.gen::<f64>() < eps {
            let (n_samples, n_actions) = (av.batch_size(), av.num_actions());
            Ok((0..n_samples).map(|_| rng.gen_range(0..n_actions)).collect())
        } else {
            av.greedy_actions()
        }
    }
}

/// Explorers used by the value-based agents in training mode.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum DqnExplorer {
    /// Greedy action selection.
    Greedy(Greedy),

    /// Epsilon-greedy action selection.
    EpsilonGreedy(EpsilonGreedy),
}

impl Default for DqnExplorer {
    fn default() -> Self {
        Self::EpsilonGreedy(EpsilonGreedy::default())
    }
}

impl DqnExplorer {
    /// Epsilon-greedy explorer with the given schedule.
    pub fn epsilon_greedy(schedule: ScheduleConfig) -> Self {
        Self::EpsilonGreedy(EpsilonGreedy::new(schedule))
    }

    /// Takes an action for each observation in the batch.
    pub fn action(
        &mut self,
        av: &ActionValue,
        rng: &mut impl Rng,
        force_random: bool,
    ) -> Result<Vec<usize>> {
        match self {
            Self::Greedy(greedy) => greedy.action(av),
            Self::EpsilonGreedy(egreedy) => egreedy.action(av, rng, force_random),
        }
    }

    /// Current exploration rate, zero for the greedy explorer.
    pub fn epsilon(&self) -> f64 {
        match self {
            Self::Greedy(_) => 0.0,
            Self::EpsilonGreedy(egreedy) => egreedy.epsilon(),
        }
    }

    /// Time step of the exploration schedule.
    pub fn t(&self) -> usize {
        match self {
            Self::Greedy(_) => 0,
            Self::EpsilonGreedy(egreedy) => egreedy.t,
        }
    }

    pub(crate) fn set_t(&mut self, t: usize) {
        if let Self::EpsilonGreedy(egreedy) = self {
            egreedy.t = t;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};
    use rand::{rngs::StdRng, SeedableRng};

    fn action_value() -> ActionValue {
        let q = Tensor::new(&[[0.0f32, 1.0, 0.5, -1.0]], &Device::Cpu).unwrap();
        ActionValue::Scalar(q)
    }

    #[test]
    fn test_greedy() {
        assert_eq!(Greedy.action(&action_value()).unwrap(), vec![1]);
    }

    #[test]
    fn test_epsilon_zero_is_greedy() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut explorer = EpsilonGreedy::new(ScheduleConfig::Constant(0.0));
        for _ in 0..100 {
            assert_eq!(explorer.action(&action_value(), &mut rng, false).unwrap(), vec![1]);
        }
        assert_eq!(explorer.t, 100);
    }

    #[test]
    fn test_epsilon_one_is_uniform() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut explorer = EpsilonGreedy::new(ScheduleConfig::Constant(1.0));
        let mut counts = [0usize; 4];
        for _ in 0..4000 {
            let a = explorer.action(&action_value(), &mut rng, false).unwrap()[0];
            counts[a] += 1;
        }
        assert!(counts.iter().all(|&c| (900..1100).contains(&c)), "{:?}", counts);
    }

    #[test]
    fn test_force_random() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut explorer = EpsilonGreedy::new(ScheduleConfig::Constant(0.0));
        let actions: Vec<usize> = (0..200)
            .map(|_| explorer.action(&action_value(), &mut rng, true).unwrap()[0])
            .collect();
        assert!(actions.iter().any(|&a| a != 1));
    }

    #[test]
    fn test_schedule_advances_per_call() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut explorer = DqnExplorer::epsilon_greedy(ScheduleConfig::linear(1.0, 0.0, 10));
        assert_eq!(explorer.epsilon(), 1.0);
        for _ in 0..5 {
            explorer.action(&action_value(), &mut rng, false).unwrap();
        }
        assert_eq!(explorer.t(), 5);
        assert!((explorer.epsilon() - 0.5).abs() < 1e-12);

        for _ in 0..10 {
            explorer.action(&action_value(), &mut rng, false).unwrap();
        }
        assert_eq!(explorer.epsilon(), 0.0);
        assert_eq!(explorer.action(&action_value(), &mut rng, false).unwrap(), vec![1]);
    }
}
