//! Environment interaction for training.
use crate::{
    record::{Record, RecordValue::Scalar},
    Env, ExperienceBufferBase, Info, Observation, Policy, StepProcessor,
};
use anyhow::{anyhow, Result};
use std::collections::BTreeSet;

/// Runs the training environment and feeds the replay buffer.
///
/// Every call of [`Sampler::sample_and_push`] performs one environment step.
/// The step goes through the [`StepProcessor`] and whatever comes out is
/// pushed into the buffer. When an episode ends, the returned record holds
/// `episode_return`, `episode_length` and `achievement/<name>` for each
/// achievement unlocked during the episode.
pub struct Sampler<E, P>
where
    E: Env,
    P: StepProcessor<E>,
{
    env: E,
    step_processor: P,
    prev_obs: Option<Observation>,
    episode_return: f32,
    episode_length: usize,
    unlocked: BTreeSet<String>,
    n_episodes: usize,
}

impl<E, P> Sampler<E, P>
where
    E: Env,
    P: StepProcessor<E>,
{
    /// Creates a sampler.
    pub fn new(env: E, step_processor: P) -> Self {
        Self {
            env,
            step_processor,
            prev_obs: None,
            episode_return: 0.0,
            episode_length: 0,
            unlocked: BTreeSet::new(),
            n_episodes: 0,
        }
    }

    /// Number of finished episodes.
    pub fn n_episodes(&self) -> usize {
        self.n_episodes
    }

    fn end_episode(&mut self) -> Record {
        let mut record = Record::empty();
        record.insert("episode_return", Scalar(self.episode_return));
        record.insert("episode_length", Scalar(self.episode_length as f32));
        for name in std::mem::take(&mut self.unlocked) {
            record.insert(format!("achievement/{}", name), Scalar(1.0));
        }
        self.episode_return = 0.0;
        self.episode_length = 0;
        self.n_episodes += 1;
        record
    }

    /// Performs an environment step with an action of `policy` and pushes
    /// the resulting transition, if any, into `buffer`.
    pub fn sample_and_push<A, B>(&mut self, policy: &mut A, buffer: &mut B) -> Result<Record>
    where
        A: Policy<E>,
        B: ExperienceBufferBase<Item = P::Output>,
    {
        let obs = match self.prev_obs.take() {
            Some(obs) => obs,
            None => {
                let obs = self.env.reset()?;
                self.step_processor.reset(obs.clone());
                obs
            }
        };

        let act = policy.sample(&obs)?;
        let (mut step, mut record) = self.env.step_with_reset(act)?;
        let is_done = step.is_done();

        self.episode_return += step.reward;
        self.episode_length += 1;
        if let Some(achievements) = step.info.achievements() {
            let unlocked = achievements.iter().filter(|(_, u)| **u);
            self.unlocked.extend(unlocked.map(|(name, _)| name.clone()));
        }

        let init_obs = step.init_obs.take();
        self.prev_obs = Some(match is_done {
            true => init_obs.ok_or_else(|| anyhow!("episode ended without a first observation"))?,
            false => step.obs.clone(),
        });

        if let Some(transition) = self.step_processor.process(step) {
            buffer.push(transition)?;
        }

        if is_done {
            if let Some(obs) = self.prev_obs.as_ref() {
                self.step_processor.reset(obs.clone());
            }
            record.merge_inplace(self.end_episode());
        }

        Ok(record)
    }
}
