use super::Evaluator;
use crate::{
    record::{Record, RecordValue::Scalar},
    Env, Info, Policy,
};
use anyhow::Result;
use log::info;
use std::collections::{BTreeMap, BTreeSet};

/// Runs a fixed number of episodes and summarizes them.
///
/// The record returned by [`Evaluator::evaluate`] holds
///
/// * `eval/return_mean`, `eval/return_std`: mean and population standard
///   deviation of the episode returns,
/// * `eval/length_mean`: mean episode length,
/// * `eval/achievement/<name>`: percentage of episodes in which the
///   achievement was unlocked at any step, for environments reporting
///   achievements.
///
/// Episode `i` starts with [`Env::reset_with_index`]`(i)`.
pub struct DefaultEvaluator<E: Env> {
    n_episodes: usize,
    env: E,
}

struct EpisodeSummary {
    ret: f32,
    len: usize,
    unlocked: BTreeSet<String>,
}

impl<E: Env> DefaultEvaluator<E> {
    /// Builds the environment with `seed` and creates the evaluator.
    pub fn new(config: &E::Config, seed: i64, n_episodes: usize) -> Result<Self> {
        anyhow::ensure!(n_episodes > 0, "n_episodes must be positive");
        Ok(Self {
            n_episodes,
            env: E::build(config, seed)?,
        })
    }

    fn run_episode<P: Policy<E>>(&mut self, ix: usize, policy: &mut P) -> Result<EpisodeSummary> {
        let mut obs = self.env.reset_with_index(ix)?;
        let mut summary = EpisodeSummary {
            ret: 0.0,
            len: 0,
            unlocked: BTreeSet::new(),
        };
        loop {
            let act = policy.sample(&obs)?;
            let (step, _) = self.env.step(act)?;
            summary.ret += step.reward;
            summary.len += 1;
            if let Some(achievements) = step.info.achievements() {
                let unlocked = achievements.iter().filter(|(_, u)| **u);
                summary.unlocked.extend(unlocked.map(|(name, _)| name.clone()));
            }
            if step.is_done() {
                return Ok(summary);
            }
            obs = step.obs;
        }
    }
}

impl<E: Env> Evaluator<E> for DefaultEvaluator<E> {
    fn evaluate<P: Policy<E>>(&mut self, policy: &mut P) -> Result<Record> {
        let mut returns = Vec::with_capacity(self.n_episodes);
        let mut lengths = Vec::with_capacity(self.n_episodes);
        let mut unlocks = BTreeMap::<String, usize>::new();

        for ix in 0..self.n_episodes {
            let summary = self.run_episode(ix, policy)?;
            returns.push(summary.ret);
            lengths.push(summary.len as f32);
            for name in summary.unlocked {
                *unlocks.entry(name).or_insert(0) += 1;
            }
        }

        let n = self.n_episodes as f32;
        let return_mean = returns.iter().sum::<f32>() / n;
        let return_std =
            (returns.iter().map(|r| (r - return_mean).powi(2)).sum::<f32>() / n).sqrt();
        let length_mean = lengths.iter().sum::<f32>() / n;
        info!(
            "Evaluation over {} episodes: return {:.3} +- {:.3}, length {:.1}",
            self.n_episodes, return_mean, return_std, length_mean
        );

        let mut record = Record::empty();
        record.insert("eval/return_mean", Scalar(return_mean));
        record.insert("eval/return_std", Scalar(return_std));
        record.insert("eval/length_mean", Scalar(length_mean));
        for (name, count) in unlocks {
            record.insert(
                format!("eval/achievement/{}", name),
                Scalar(100.0 * count as f32 / n),
            );
        }
        Ok(record)
    }
}
