//! DQN agent implemented with candle.
use super::config::{DqnConfig, MunchausenConfig};
use crate::{
    checkpoint::{self, AgentState},
    explorer::{DqnExplorer, Greedy},
    model::{ActionValue, QNetwork, SubModel1},
    tensor_batch::TensorBatch,
    util::{arrayd_to_tensor, mean_std, smooth_l1_loss},
};
use anyhow::{Context, Result};
use candle_core::{Device, Tensor, D};
use candle_nn::ops::log_softmax;
use crafter_core::{
    record::{Record, RecordValue},
    replay_buffer::{SlotId, TransitionBatch},
    Agent, Configurable, Env, ExperienceBufferBase, Observation, Policy, ReplayBufferBase,
    SeedContext,
};
use log::trace;
use rand::rngs::StdRng;
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, marker::PhantomData, path::Path};

/// Value of the next observation under the bootstrap action, shape `[batch]`.
///
/// With Double DQN the online values pick the action, otherwise the target
/// values do. The target values are always the ones evaluated.
pub(crate) fn next_value(q_next_online: &Tensor, q_next_tgt: &Tensor, double_dqn: bool) -> Result<Tensor> {
    let a = match double_dqn {
        true => q_next_online.argmax_keepdim(D::Minus1)?,
        false => q_next_tgt.argmax_keepdim(D::Minus1)?,
    };
    Ok(q_next_tgt.gather(&a, D::Minus1)?.squeeze(D::Minus1)?)
}

/// `clamp(alpha * log softmax(q / tau)(act), -1, 0)`, shape `[batch]`.
pub(crate) fn munchausen_bonus(q: &Tensor, act: &Tensor, config: &MunchausenConfig) -> Result<Tensor> {
    let log_pi = log_softmax(&q.affine(1.0 / config.tau, 0.0)?, D::Minus1)?;
    let log_pi_a = log_pi.gather(&act.unsqueeze(D::Minus1)?, D::Minus1)?.squeeze(D::Minus1)?;
    Ok(log_pi_a.affine(config.alpha, 0.0)?.clamp(-1f32, 0f32)?)
}

/// `reward + not_done * discount * next_q`.
pub(crate) fn td_target(reward: &Tensor, not_done: &Tensor, discount: f64, next_q: &Tensor) -> Result<Tensor> {
    Ok(reward.add(&not_done.mul(next_q)?.affine(discount, 0.0)?)?)
}

#[allow(clippy::upper_case_acronyms)]
/// DQN agent implemented with candle.
///
/// The online network is trained on n-step transitions towards
/// `r + (1 - done) gamma^n Q_tgt(s', a*)` with a smooth L1 loss, where `a*`
/// is chosen by the online network when `double_dqn` is set. Batches carrying
/// importance weights are weighted accordingly and their absolute TD errors
/// are fed back to the replay buffer as priorities.
pub struct Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch, SampleId = SlotId> + ExperienceBufferBase,
{
    qnet: QNetwork<Q>,
    qnet_tgt: QNetwork<Q>,
    batch_size: usize,

    /// `gamma^n_step`.
    discount: f64,

    double_dqn: bool,
    munchausen: Option<MunchausenConfig>,
    max_grad_norm: f64,
    min_transitions_warmup: usize,
    n_random_actions: usize,
    explorer: DqnExplorer,
    device: Device,
    train: bool,
    n_opts: usize,
    n_samples: usize,
    rng: StdRng,
    phantom: PhantomData<(E, R)>,
}

impl<E, Q, R> Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch, SampleId = SlotId> + ExperienceBufferBase,
{
    fn update_critic(&mut self, buffer: &mut R) -> Result<Record> {
        let batch = TensorBatch::from_batch(buffer.batch(self.batch_size)?, &self.device)?;

        let q = self.qnet.forward(&batch.obs)?;
        let pred = q
            .gather(&batch.act.unsqueeze(D::Minus1)?, D::Minus1)?
            .squeeze(D::Minus1)?;

        let tgt = {
            let q_next_tgt = self.qnet_tgt.forward(&batch.next_obs)?.detach();
            let next_q = match self.double_dqn {
                true => {
                    let q_next_online = self.qnet.forward(&batch.next_obs)?.detach();
                    next_value(&q_next_online, &q_next_tgt, true)?
                }
                false => next_value(&q_next_tgt, &q_next_tgt, false)?,
            };
            let reward = match &self.munchausen {
                Some(config) => batch
                    .reward
                    .add(&munchausen_bonus(&q.detach(), &batch.act, config)?)?,
                None => batch.reward.clone(),
            };
            td_target(&reward, &batch.not_done, self.discount, &next_q)?.detach()
        };

        let loss = smooth_l1_loss(&pred, &tgt, batch.weight.as_ref())?;
        let grad_norm = self.qnet.backward_step(&loss, self.max_grad_norm)?;

        if batch.weight.is_some() {
            let td_errs = pred.detach().sub(&tgt)?.abs()?.to_vec1::<f32>()?;
            buffer.update_priority(&batch.ids, &td_errs);
        }
        self.n_opts += 1;

        let loss = loss.to_scalar::<f32>()?;
        let (q_mean, q_std) = mean_std(&pred)?;
        let (target_mean, _) = mean_std(&tgt)?;
        trace!("Dqn::update_critic(): n_opts = {}, loss = {}", self.n_opts, loss);

        Ok(Record::from_slice(&[
            ("loss", RecordValue::Scalar(loss)),
            ("q_mean", RecordValue::Scalar(q_mean)),
            ("q_std", RecordValue::Scalar(q_std)),
            ("target_mean", RecordValue::Scalar(target_mean)),
            ("grad_norm", RecordValue::Scalar(grad_norm as f32)),
            ("epsilon", RecordValue::Scalar(self.explorer.epsilon() as f32)),
        ]))
    }

    fn forward_obs(qnet: &QNetwork<Q>, obs: &Observation, device: &Device) -> Result<ActionValue> {
        let obs = arrayd_to_tensor::<f32, f32>(obs, true, device)?;
        Ok(ActionValue::Scalar(qnet.forward(&obs)?))
    }

    /// Action values of the online network for a single observation, shape `[1, num_actions]`.
    pub fn action_values(&self, obs: &Observation) -> Result<ActionValue> {
        Self::forward_obs(&self.qnet, obs, &self.device)
    }

    /// Action values of the target network for a single observation.
    pub fn target_action_values(&self, obs: &Observation) -> Result<ActionValue> {
        Self::forward_obs(&self.qnet_tgt, obs, &self.device)
    }

    /// Number of optimization steps so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> f64 {
        self.explorer.epsilon()
    }
}

impl<E, Q, R> Configurable for Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch, SampleId = SlotId> + ExperienceBufferBase,
{
    type Config = DqnConfig<Q>;

    /// Constructs DQN agent.
    ///
    /// Both networks start from the same parameters drawn from the seed.
    fn build(config: Self::Config) -> Result<Self> {
        let device = Device::try_from(config.device.unwrap_or(crate::Device::Cpu))
            .context("failed to open the device of DQN agent")?;
        let seeds = SeedContext::new(config.seed);
        let mut qnet = QNetwork::build(config.model_config.clone(), device.clone())?;
        qnet.reinit(&mut seeds.rng("qnet"))?;
        let mut qnet_tgt = QNetwork::build(config.model_config, device.clone())?;
        qnet_tgt.copy_from(&qnet)?;

        Ok(Dqn {
            qnet,
            qnet_tgt,
            batch_size: config.batch_size,
            discount: config.gamma.powi(config.n_step.max(1) as i32),
            double_dqn: config.double_dqn,
            munchausen: config.munchausen,
            max_grad_norm: config.max_grad_norm,
            min_transitions_warmup: config.min_transitions_warmup,
            n_random_actions: config.n_random_actions,
            explorer: config.explorer,
            device,
            train: false,
            n_opts: 0,
            n_samples: 0,
            rng: seeds.rng("explorer"),
            phantom: PhantomData,
        })
    }
}

impl<E, Q, R> Policy<E> for Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch, SampleId = SlotId> + ExperienceBufferBase,
{
    /// Explores in training mode, acts greedily in evaluation mode.
    fn sample(&mut self, obs: &Observation) -> Result<usize> {
        let av = self.action_values(obs)?;
        let act = if self.train {
            let force_random = self.n_samples < self.n_random_actions;
            self.n_samples += 1;
            self.explorer.action(&av, &mut self.rng, force_random)?
        } else {
            Greedy.action(&av)?
        };
        act.first().copied().context("no action for the observation")
    }
}

impl<E, Q, R> Agent<E, R> for Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch, SampleId = SlotId> + ExperienceBufferBase,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Option<Record>> {
        if buffer.len() < self.batch_size.max(self.min_transitions_warmup) {
            return Ok(None);
        }
        Ok(Some(self.update_critic(buffer)?))
    }

    fn sync_target(&mut self) -> Result<()> {
        self.qnet_tgt.copy_from(&self.qnet)
    }

    /// Writes `qnet.safetensors`, `qnet_tgt.safetensors` and `state.yaml` into `path`.
    fn save_params(&self, path: &Path) -> Result<()> {
        let state = AgentState {
            n_opts: self.n_opts,
            explorer_t: self.explorer.t(),
        };
        checkpoint::save(path, &self.qnet, &self.qnet_tgt, &state)
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        let state = checkpoint::load(path, &mut self.qnet, &mut self.qnet_tgt)?;
        self.n_opts = state.n_opts;
        self.explorer.set_t(state.explorer_t);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor2(v: &[[f32; 3]; 2]) -> Tensor {
        Tensor::new(v, &candle_core::Device::Cpu).unwrap()
    }

    #[test]
    fn test_double_dqn_selection() -> Result<()> {
        let q_online = tensor2(&[[1.0, 5.0, 2.0], [0.0, 0.0, 9.0]]);
        let q_tgt = tensor2(&[[7.0, 3.0, 4.0], [8.0, 6.0, 1.0]]);

        // the online network selects, the target network evaluates
        let v = next_value(&q_online, &q_tgt, true)?.to_vec1::<f32>()?;
        assert_eq!(v, vec![3.0, 1.0]);

        // swapping the tables swaps the roles
        let v = next_value(&q_tgt, &q_online, true)?.to_vec1::<f32>()?;
        assert_eq!(v, vec![1.0, 0.0]);

        // without Double DQN the target maximum is used
        let v = next_value(&q_online, &q_tgt, false)?.to_vec1::<f32>()?;
        assert_eq!(v, vec![7.0, 8.0]);
        Ok(())
    }

    #[test]
    fn test_td_target() -> Result<()> {
        let dev = candle_core::Device::Cpu;
        let reward = Tensor::new(&[1f32, 2.0], &dev)?;
        let not_done = Tensor::new(&[1f32, 0.0], &dev)?;
        let next_q = Tensor::new(&[10f32, 10.0], &dev)?;
        let tgt = td_target(&reward, &not_done, 0.9f64.powi(3), &next_q)?.to_vec1::<f32>()?;
        assert!((tgt[0] - 8.29).abs() < 1e-5);
        assert_eq!(tgt[1], 2.0);
        Ok(())
    }

    #[test]
    fn test_munchausen_bonus_is_clamped() -> Result<()> {
        let q = tensor2(&[[1.0, 0.0, 0.0], [1.0, 1.0, 1.0]]);
        let act = Tensor::new(&[1u32, 2], &candle_core::Device::Cpu)?;
        let config = MunchausenConfig::default();
        let bonus = munchausen_bonus(&q, &act, &config)?.to_vec1::<f32>()?;

        // a strongly dispreferred action hits the lower bound
        assert_eq!(bonus[0], -1.0);

        // uniform policy gives alpha * ln(1/3)
        assert!((bonus[1] + 0.9 * 3f32.ln()).abs() < 1e-5);
        assert!(bonus.iter().all(|b| (-1.0..=0.0).contains(b)));

        // the greedy action of a sharp policy gets no penalty beyond rounding
        let q = tensor2(&[[5.0, 0.0, 0.0], [0.0, 5.0, 0.0]]);
        let act = Tensor::new(&[0u32, 1], &candle_core::Device::Cpu)?;
        let bonus = munchausen_bonus(&q, &act, &config)?.to_vec1::<f32>()?;
        assert!(bonus.iter().all(|b| b.abs() < 1e-5));
        Ok(())
    }
}
