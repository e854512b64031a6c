//! Train [`Agent`].
mod config;
mod sampler;
use crate::{
    record::{AggregateRecorder, Record, RecordValue::Scalar},
    Agent, Env, Evaluator, ExperienceBufferBase, ReplayBufferBase, StepProcessor,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::{info, warn};
pub use sampler::Sampler;
use std::{path::Path, time::SystemTime};

#[inline]
fn is_due(step: usize, interval: usize) -> bool {
    interval > 0 && step % interval == 0
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop.
///
/// # Training loop
///
/// The loop is driven by environment steps. For `step` in
/// `0..max_env_steps`:
///
/// 1. The [`Sampler`] takes an action of the agent, steps the environment and
///    pushes the transition produced by the [`StepProcessor`] into the
///    replay buffer.
/// 2. If `step >= training_starts` and `step % opt_interval == 0`, the agent
///    performs an optimization step. The agent may skip it, for example while
///    the buffer is below its warmup level.
/// 3. If `step % target_update_interval == 0`, the target model is synchronized.
/// 4. With `env_steps = step + 1`:
///     * if `env_steps % eval_interval == 0`, the agent is evaluated in
///       evaluation mode. If `eval/return_mean` is the best so far, the
///       agent is saved in `(model_dir)/best`.
///     * if `env_steps % save_interval == 0`, the agent is saved in
///       `(model_dir)/(env_steps)`.
///     * if `env_steps % flush_record_interval == 0`, the recorder is flushed.
///
/// After the loop, the agent is saved in `(model_dir)/final`. An interval of
/// zero disables the corresponding action.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|action|B[Env]
///     B -->|Observation|A
///     B -->|"Step&lt;E: Env&gt;"|C[StepProcessor]
///     C -->|Transition|D[ReplayBuffer]
///     D -->|TransitionBatch|A
///     A -->|"priorities"|D
/// ```
pub struct Trainer<E, P, R>
where
    E: Env,
    P: StepProcessor<E>,
    R: ExperienceBufferBase<Item = P::Output> + ReplayBufferBase,
{
    config: TrainerConfig,
    env_config_train: E::Config,
    step_proc_config: P::Config,
    replay_buffer_config: R::Config,
}

impl<E, P, R> Trainer<E, P, R>
where
    E: Env,
    P: StepProcessor<E>,
    R: ExperienceBufferBase<Item = P::Output> + ReplayBufferBase,
{
    /// Constructs a trainer.
    pub fn build(
        config: TrainerConfig,
        env_config_train: E::Config,
        step_proc_config: P::Config,
        replay_buffer_config: R::Config,
    ) -> Self {
        Self {
            config,
            env_config_train,
            step_proc_config,
            replay_buffer_config,
        }
    }

    fn save_model<A: Agent<E, R>>(agent: &A, model_dir: &Path) {
        match agent.save_params(model_dir) {
            Ok(()) => info!("Saved the model in {:?}", model_dir),
            Err(e) => warn!("Failed to save the model in {:?}: {}", model_dir, e),
        }
    }

    fn save_model_in<A: Agent<E, R>>(&self, agent: &A, sub_dir: &str) {
        if let Some(model_dir) = self.config.model_dir.as_ref() {
            Self::save_model(agent, &Path::new(model_dir).join(sub_dir));
        }
    }

    /// Performs an environment step and, when due, an optimization step.
    ///
    /// `step` is the index of the environment step, starting from zero.
    /// The second element of the returned tuple tells if an optimization
    /// step was done.
    pub fn train_step<A: Agent<E, R>>(
        &self,
        agent: &mut A,
        buffer: &mut R,
        sampler: &mut Sampler<E, P>,
        step: usize,
    ) -> Result<(Record, bool)> {
        let mut record = sampler.sample_and_push(agent, buffer)?;

        let mut is_opt = false;
        if step >= self.config.training_starts && is_due(step, self.config.opt_interval) {
            if let Some(record_agent) = agent.opt_with_record(buffer)? {
                record.merge_inplace(record_agent);
                is_opt = true;
            }
        }

        if is_due(step, self.config.target_update_interval) {
            agent.sync_target()?;
        }

        Ok((record, is_opt))
    }

    /// Trains the agent.
    pub fn train<A, D>(
        &mut self,
        agent: &mut A,
        recorder: &mut dyn AggregateRecorder,
        evaluator: &mut D,
    ) -> Result<()>
    where
        A: Agent<E, R>,
        D: Evaluator<E>,
    {
        let env = E::build(&self.env_config_train, self.config.env_seed)?;
        let step_proc = P::build(&self.step_proc_config);
        let mut buffer = R::build(&self.replay_buffer_config)?;
        let mut sampler = Sampler::new(env, step_proc);
        let mut max_eval_return = f32::MIN;
        let mut opt_steps = 0usize;
        let mut timer = SystemTime::now();
        agent.train();

        for step in 0..self.config.max_env_steps {
            let (mut record, is_opt) = self.train_step(agent, &mut buffer, &mut sampler, step)?;
            opt_steps += is_opt as usize;
            let env_steps = step + 1;

            if is_due(env_steps, self.config.eval_interval) {
                agent.eval();
                let record_eval = evaluator.evaluate(agent)?;
                agent.train();

                let eval_return = record_eval.get_scalar("eval/return_mean")?;
                if eval_return > max_eval_return {
                    max_eval_return = eval_return;
                    self.save_model_in(agent, "best");
                }
                record.merge_inplace(record_eval);
            }

            if is_due(env_steps, self.config.save_interval) {
                self.save_model_in(agent, &env_steps.to_string());
            }

            if is_due(env_steps, self.config.log_interval) {
                let secs = timer.elapsed()?.as_secs_f32();
                let fps = self.config.log_interval as f32 / secs.max(f32::EPSILON);
                timer = SystemTime::now();
                info!(
                    "env_steps: {}, episodes: {}, opt_steps: {}, fps: {:.0}",
                    env_steps,
                    sampler.n_episodes(),
                    opt_steps,
                    fps
                );
                record.insert("fps", Scalar(fps));
            }

            if !record.is_empty() {
                recorder.store(record);
            }

            if is_due(env_steps, self.config.flush_record_interval) {
                recorder.flush(env_steps as _);
            }
        }

        recorder.flush(self.config.max_env_steps as _);
        self.save_model_in(agent, "final");

        Ok(())
    }
}
