//! Evaluate a [`Policy`].
use crate::{record::Record, Env, Policy};
use anyhow::Result;
mod default_evaluator;
pub use default_evaluator::DefaultEvaluator;

/// Evaluate a [`Policy`].
pub trait Evaluator<E: Env> {
    /// Runs evaluation episodes with `policy` and returns the results.
    ///
    /// The returned record must hold `eval/return_mean`, which the
    /// [`Trainer`](crate::Trainer) uses to keep the best model. The caller
    /// handles the mode of the policy, for example switching an agent to
    /// greedy action selection beforehand.
    fn evaluate<P: Policy<E>>(&mut self, policy: &mut P) -> Result<Record>;
}
