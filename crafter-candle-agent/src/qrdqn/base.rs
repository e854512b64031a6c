//! QR-DQN agent implemented with candle.
use super::config::QrDqnConfig;
use crate::{
    checkpoint::{self, AgentState},
    explorer::{DqnExplorer, Greedy},
    model::{ActionValue, QNetwork, SubModel1},
    tensor_batch::TensorBatch,
    util::{arrayd_to_tensor, mean_std, quantile_huber_loss},
};
use anyhow::{Context, Result};
use candle_core::{Device, Tensor, D};
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

/// Quantiles of the given action for each item.
///
/// `z` has shape `[batch, num_actions, num_quantiles]` and `act` holds `u32`
/// actions of shape `[batch]` or `[batch, 1]`. Returns `[batch, num_quantiles]`.
pub(crate) fn gather_quantiles(z: &Tensor, act: &Tensor) -> Result<Tensor> {
    let (batch_size, _, n) = z.dims3()?;
    let ix = act
        .reshape((batch_size, 1, 1))?
        .broadcast_as((batch_size, 1, n))?
        .contiguous()?;
    Ok(z.gather(&ix, 1)?.squeeze(1)?)
}

/// `reward + (1 - done) * discount * z_next` for each quantile, shape `[batch, num_quantiles]`.
pub(crate) fn quantile_target(
    reward: &Tensor,
    not_done: &Tensor,
    discount: f64,
    z_next: &Tensor,
) -> Result<Tensor> {
    let scale = not_done.affine(discount, 0.0)?.unsqueeze(1)?;
    Ok(reward
        .unsqueeze(1)?
        .broadcast_add(&z_next.broadcast_mul(&scale)?)?)
}

/// QR-DQN agent implemented with candle.
///
/// The return distribution of each action is modelled by `N` quantiles at
/// fractions `tau_j = (j + 0.5) / N`. The next action is the arg-max of the
/// online quantile means and the target network provides its quantiles. Each
/// predicted quantile regresses on `r + (1 - done) gamma^n z'_j` under the
/// quantile Huber loss. The mean absolute quantile error of each item is fed
/// back to a prioritized replay buffer.
pub struct QrDqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch, SampleId = SlotId> + ExperienceBufferBase,
{
    qnet: QNetwork<Q>,
    qnet_tgt: QNetwork<Q>,
    batch_size: usize,
    discount: f64,
    kappa: f64,
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

impl<E, Q, R> QrDqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch, SampleId = SlotId> + ExperienceBufferBase,
{
    fn update_critic(&mut self, buffer: &mut R) -> Result<Record> {
        let batch = TensorBatch::from_batch(buffer.batch(self.batch_size)?, &self.device)?;

        let z_pred = gather_quantiles(&self.qnet.forward(&batch.obs)?, &batch.act)?;

        let z_tgt = {
            let z_next_online = ActionValue::Quantile(self.qnet.forward(&batch.next_obs)?.detach());
            let a_next = z_next_online.q_values()?.argmax_keepdim(D::Minus1)?;
            let z_next = gather_quantiles(&self.qnet_tgt.forward(&batch.next_obs)?.detach(), &a_next)?;
            quantile_target(&batch.reward, &batch.not_done, self.discount, &z_next)?.detach()
        };

        let (loss_items, td_abs) = quantile_huber_loss(&z_pred, &z_tgt, self.kappa)?;
        let loss = match &batch.weight {
            Some(w) => loss_items.mul(w)?.mean_all()?,
            None => loss_items.mean_all()?,
        };
        let grad_norm = self.qnet.backward_step(&loss, self.max_grad_norm)?;

        let td_abs = td_abs.to_vec1::<f32>()?;
        if batch.weight.is_some() {
            buffer.update_priority(&batch.ids, &td_abs);
        }
        self.n_opts += 1;

        let loss = loss.to_scalar::<f32>()?;
        let (q_mean, q_std) = mean_std(&z_pred.detach().mean(D::Minus1)?)?;
        let (target_mean, _) = mean_std(&z_tgt.mean(D::Minus1)?)?;
        let td_abs_mean = td_abs.iter().sum::<f32>() / td_abs.len().max(1) as f32;
        trace!("QrDqn::update_critic(): n_opts = {}, loss = {}", self.n_opts, loss);

        Ok(Record::from_slice(&[
            ("loss", RecordValue::Scalar(loss)),
            ("q_mean", RecordValue::Scalar(q_mean)),
            ("q_std", RecordValue::Scalar(q_std)),
            ("target_mean", RecordValue::Scalar(target_mean)),
            ("td_abs_mean", RecordValue::Scalar(td_abs_mean)),
            ("grad_norm", RecordValue::Scalar(grad_norm as f32)),
            ("epsilon", RecordValue::Scalar(self.explorer.epsilon() as f32)),
        ]))
    }

    fn forward_obs(qnet: &QNetwork<Q>, obs: &Observation, device: &Device) -> Result<ActionValue> {
        let obs = arrayd_to_tensor::<f32, f32>(obs, true, device)?;
        Ok(ActionValue::Quantile(qnet.forward(&obs)?))
    }

    /// Quantiles of the online network for a single observation,
    /// shape `[1, num_actions, num_quantiles]`.
    pub fn action_values(&self, obs: &Observation) -> Result<ActionValue> {
        Self::forward_obs(&self.qnet, obs, &self.device)
    }

    /// Quantiles of the target network for a single observation.
    pub fn target_action_values(&self, obs: &Observation) -> Result<ActionValue> {
        Self::forward_obs(&self.qnet_tgt, obs, &self.device)
    }

    /// Number of optimization steps so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }
}

impl<E, Q, R> Configurable for QrDqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch, SampleId = SlotId> + ExperienceBufferBase,
{
    type Config = QrDqnConfig<Q>;

    fn build(config: Self::Config) -> Result<Self> {
        let device = Device::try_from(config.device.unwrap_or(crate::Device::Cpu))
            .context("failed to open the device of QR-DQN agent")?;
        let seeds = SeedContext::new(config.seed);
        let mut qnet = QNetwork::build(config.model_config.clone(), device.clone())?;
        qnet.reinit(&mut seeds.rng("qnet"))?;
        let mut qnet_tgt = QNetwork::build(config.model_config, device.clone())?;
        qnet_tgt.copy_from(&qnet)?;

        Ok(QrDqn {
            qnet,
            qnet_tgt,
            batch_size: config.batch_size,
            discount: config.gamma.powi(config.n_step.max(1) as i32),
            kappa: config.kappa,
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

impl<E, Q, R> Policy<E> for QrDqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch, SampleId = SlotId> + ExperienceBufferBase,
{
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

impl<E, Q, R> Agent<E, R> for QrDqn<E, Q, R>
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

    #[test]
    fn test_gather_quantiles() -> Result<()> {
        let dev = candle_core::Device::Cpu;
        // [batch = 2, actions = 3, quantiles = 2]
        let z = Tensor::new(
            &[
                [[0f32, 1.0], [2.0, 3.0], [4.0, 5.0]],
                [[6.0, 7.0], [8.0, 9.0], [10.0, 11.0]],
            ],
            &dev,
        )?;
        let act = Tensor::new(&[2u32, 0], &dev)?;
        let zs = gather_quantiles(&z, &act)?.to_vec2::<f32>()?;
        assert_eq!(zs, vec![vec![4.0, 5.0], vec![6.0, 7.0]]);

        // keepdim actions from arg-max are accepted as well
        let act = ActionValue::Quantile(z.clone()).q_values()?.argmax_keepdim(D::Minus1)?;
        let zs = gather_quantiles(&z, &act)?.to_vec2::<f32>()?;
        assert_eq!(zs, vec![vec![4.0, 5.0], vec![10.0, 11.0]]);
        Ok(())
    }

    #[test]
    fn test_quantile_target() -> Result<()> {
        // r + (1 - done) gamma^n z'_j for each quantile
        let dev = candle_core::Device::Cpu;
        let reward = Tensor::new(&[1f32, 2.0], &dev)?;
        let not_done = Tensor::new(&[1f32, 0.0], &dev)?;
        let z_next = Tensor::new(&[[1f32, 3.0], [5.0, 7.0]], &dev)?;
        let z_tgt = quantile_target(&reward, &not_done, 0.5, &z_next)?;
        assert_eq!(z_tgt.to_vec2::<f32>()?, vec![vec![1.5, 2.5], vec![2.0, 2.0]]);

        // identical distributions cost nothing
        let (loss, td_abs) = quantile_huber_loss(&z_tgt, &z_tgt, 1.0)?;
        assert_eq!(loss.to_vec1::<f32>()?, vec![0.0, 0.0]);
        assert_eq!(td_abs.to_vec1::<f32>()?, vec![0.0, 0.0]);
        Ok(())
    }
}
