mod common;
use anyhow::Result;
use common::{ChainEnv, ChainEnvConfig};
use crafter_core::{
    record::{BufferedRecorder, Record},
    replay_buffer::{NStepProcessor, NStepProcessorConfig, ReplayBuffer, ReplayBufferConfig},
    Agent, DefaultEvaluator, Observation, Policy, ReplayBufferBase, SpaceConfig, Trainer,
    TrainerConfig,
};
use std::path::Path;
use tempdir::TempDir;

/// Counts the calls made by the trainer.
#[derive(Default)]
struct CountingAgent {
    is_train: bool,
    n_samples: usize,
    n_opts: usize,
    n_syncs: usize,
    n_evals: usize,
}

impl Policy<ChainEnv> for CountingAgent {
    fn sample(&mut self, _obs: &Observation) -> Result<usize> {
        self.n_samples += 1;
        Ok(0)
    }
}

impl Agent<ChainEnv, ReplayBuffer> for CountingAgent {
    fn train(&mut self) {
        self.is_train = true;
    }

    fn eval(&mut self) {
        self.is_train = false;
        self.n_evals += 1;
    }

    fn is_train(&self) -> bool {
        self.is_train
    }

    fn opt_with_record(&mut self, buffer: &mut ReplayBuffer) -> Result<Option<Record>> {
        assert!(self.is_train);
        let batch = buffer.batch(2)?;
        self.n_opts += 1;
        let reward_mean = batch.reward.iter().sum::<f32>() / batch.len() as f32;
        Ok(Some(Record::from_scalar("reward_mean", reward_mean)))
    }

    fn sync_target(&mut self) -> Result<()> {
        self.n_syncs += 1;
        Ok(())
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        std::fs::write(path.join("agent.txt"), self.n_opts.to_string())?;
        Ok(())
    }

    fn load_params(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_train_loop_intervals() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new("trainer")?;
    let model_dir = dir.path().join("model");

    let config = TrainerConfig::default()
        .max_env_steps(20)
        .training_starts(5)
        .opt_interval(2)
        .target_update_interval(4)
        .eval_interval(10)
        .save_interval(10)
        .flush_record_interval(5)
        .log_interval(10)
        .model_dir(model_dir.to_string_lossy());
    let env_config = ChainEnvConfig { episode_len: 4 };
    let step_proc_config = NStepProcessorConfig::default().n_step(2).gamma(0.5);
    let buffer_config = ReplayBufferConfig::default()
        .capacity(100)
        .space(SpaceConfig::new([2], 2));

    let mut trainer = Trainer::<ChainEnv, NStepProcessor, ReplayBuffer>::build(
        config,
        env_config.clone(),
        step_proc_config,
        buffer_config,
    );
    let mut agent = CountingAgent::default();
    let mut recorder = BufferedRecorder::new();
    let mut evaluator = DefaultEvaluator::<ChainEnv>::new(&env_config, 1, 2)?;
    trainer.train(&mut agent, &mut recorder, &mut evaluator)?;

    // optimization at steps 6, 8, ..., 18
    assert_eq!(agent.n_opts, 7);
    // target sync at steps 0, 4, 8, 12, 16
    assert_eq!(agent.n_syncs, 5);
    assert_eq!(agent.n_evals, 2);
    // 20 training steps plus 2 evaluations of 2 episodes of 4 steps
    assert_eq!(agent.n_samples, 36);
    assert!(agent.is_train());

    for sub_dir in ["best", "10", "20", "final"] {
        assert!(model_dir.join(sub_dir).join("agent.txt").exists(), "{}", sub_dir);
    }

    let steps: Vec<f32> = recorder
        .iter()
        .map(|r| r.get_scalar("step").unwrap())
        .collect();
    assert_eq!(steps, vec![5.0, 10.0, 15.0, 20.0]);

    let records: Vec<&Record> = recorder.iter().collect();
    assert_eq!(records[1].get_scalar("eval/return_mean")?, 4.0);
    assert_eq!(records[1].get_scalar("eval/achievement/collect_wood")?, 100.0);
    // one episode ends within the first five steps
    assert_eq!(records[0].get_scalar("episode_return")?, 4.0);
    assert_eq!(records[0].get_scalar("achievement/collect_wood")?, 1.0);
    // two-step returns with gamma 0.5
    assert_eq!(records[2].get_scalar("reward_mean_mean")?, 1.5);
    Ok(())
}
