mod common;
use anyhow::Result;
use common::{ChainEnv, ChainEnvConfig, ConstPolicy};
use crafter_core::{DefaultEvaluator, Evaluator, Observation, Policy};

/// Takes action 0 for the first `n` calls and action 1 afterwards.
struct FirstN {
    n: usize,
    calls: usize,
}

impl Policy<ChainEnv> for FirstN {
    fn sample(&mut self, _obs: &Observation) -> Result<usize> {
        self.calls += 1;
        Ok(if self.calls <= self.n { 0 } else { 1 })
    }
}

#[test]
fn test_return_and_length() -> Result<()> {
    let config = ChainEnvConfig { episode_len: 5 };
    let mut evaluator = DefaultEvaluator::<ChainEnv>::new(&config, 0, 3)?;
    let record = evaluator.evaluate(&mut ConstPolicy(0))?;

    assert_eq!(record.get_scalar("eval/return_mean")?, 5.0);
    assert_eq!(record.get_scalar("eval/return_std")?, 0.0);
    assert_eq!(record.get_scalar("eval/length_mean")?, 5.0);
    assert_eq!(record.get_scalar("eval/achievement/collect_wood")?, 100.0);
    assert!(record.get("eval/achievement/place_table").is_none());
    Ok(())
}

#[test]
fn test_achievement_success_rate() -> Result<()> {
    let config = ChainEnvConfig { episode_len: 4 };
    let mut evaluator = DefaultEvaluator::<ChainEnv>::new(&config, 0, 2)?;

    // only the first episode unlocks anything
    let mut policy = FirstN { n: 4, calls: 0 };
    let record = evaluator.evaluate(&mut policy)?;

    assert_eq!(record.get_scalar("eval/return_mean")?, 2.0);
    assert_eq!(record.get_scalar("eval/return_std")?, 2.0);
    assert_eq!(record.get_scalar("eval/achievement/collect_wood")?, 50.0);
    Ok(())
}

#[test]
fn test_zero_episodes_rejected() {
    let config = ChainEnvConfig { episode_len: 4 };
    assert!(DefaultEvaluator::<ChainEnv>::new(&config, 0, 0).is_err());
}
