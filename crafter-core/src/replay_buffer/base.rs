//! Ring buffer of byte-quantized transitions with optional prioritized sampling.
mod iw_scheduler;
mod sum_tree;
use super::{ReplayBufferConfig, SlotId, Transition, TransitionBatch};
use crate::{error::CrafterError, ExperienceBufferBase, ReplayBufferBase, SpaceConfig};
use anyhow::{bail, ensure, Result};
pub use iw_scheduler::IwScheduler;
use log::warn;
use ndarray::{ArrayD, IxDyn};
use rand::{rngs::StdRng, Rng, SeedableRng};
pub use sum_tree::SumTree;

/// Added to absolute errors so that no priority reaches zero.
const PRIORITY_EPS: f64 = 1e-6;

/// State for prioritized experience replay.
struct PerState {
    sum_tree: SumTree,
    iw_scheduler: IwScheduler,
}

#[inline]
fn quantize(x: f32) -> u8 {
    (x.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
fn dequantize(b: u8) -> f32 {
    b as f32 / 255.0
}

/// A fixed-capacity ring buffer of transitions.
///
/// Slots are dense parallel arrays. Writes go to the slot after the last one
/// and wrap around, so once `len() == capacity` each push evicts the oldest
/// transition. Observations are stored as bytes via `round(clamp(x, 0, 1) * 255)`
/// and decoded as `b / 255` when a batch is drawn.
///
/// Without PER, [`ReplayBufferBase::batch`] draws slots uniformly with
/// replacement. With PER, slots are drawn without replacement with
/// probability `P(i) = p_i^alpha / sum_k p_k^alpha` and each transition gets
/// the importance weight `(len() * P(i))^(-beta)`, divided by the largest
/// weight in the batch. New slots receive `max(max priority so far, 1)`.
///
/// ```rust
/// use crafter_core::{
///     replay_buffer::{ReplayBuffer, ReplayBufferConfig, Transition},
///     ExperienceBufferBase, ReplayBufferBase, SpaceConfig,
/// };
/// use ndarray::ArrayD;
///
/// let config = ReplayBufferConfig::default()
///     .capacity(4)
///     .space(SpaceConfig::new([2], 3));
/// let mut buffer = ReplayBuffer::build(&config).unwrap();
/// buffer.push(Transition {
///     obs: ArrayD::from_elem(vec![2], 0.5),
///     act: 1,
///     reward: 1.0,
///     next_obs: ArrayD::from_elem(vec![2], 1.0),
///     is_done: false,
/// }).unwrap();
/// let batch = buffer.batch(8).unwrap();
/// assert_eq!(batch.obs.shape(), &[8, 2]);
/// ```
pub struct ReplayBuffer {
    capacity: usize,

    /// Slot written by the next push.
    i: usize,

    size: usize,
    space: SpaceConfig,
    obs_len: usize,
    obs: Vec<u8>,
    next_obs: Vec<u8>,
    act: Vec<usize>,
    reward: Vec<f32>,
    is_done: Vec<i8>,

    /// Write count of each slot at its last write.
    generation: Vec<u64>,
    n_writes: u64,

    rng: StdRng,
    per_state: Option<PerState>,
}

impl ReplayBuffer {
    fn write_obs(dest: &mut [u8], obs: &ArrayD<f32>) {
        for (d, x) in dest.iter_mut().zip(obs.iter()) {
            *d = quantize(*x);
        }
    }

    fn decode_obs(&self, src: &[u8], ixs: &[usize]) -> Result<ArrayD<f32>> {
        let mut data = Vec::with_capacity(ixs.len() * self.obs_len);
        for &ix in ixs.iter() {
            let slot = &src[ix * self.obs_len..(ix + 1) * self.obs_len];
            data.extend(slot.iter().map(|&b| dequantize(b)));
        }
        let mut shape = vec![ixs.len()];
        shape.extend_from_slice(&self.space.observation_shape);
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
    }

    fn sample_uniform(&mut self, size: usize) -> Vec<usize> {
        (0..size).map(|_| self.rng.gen_range(0..self.size)).collect()
    }

    fn sample_prioritized(&mut self, size: usize) -> Result<(Vec<usize>, Vec<f32>)> {
        let per_state = match self.per_state.as_mut() {
            Some(per_state) => per_state,
            None => bail!("prioritized sampling is not configured"),
        };
        let beta = per_state.iw_scheduler.beta();
        let drawn = per_state.sum_tree.sample(size, &mut self.rng)?;
        per_state.iw_scheduler.step();

        let n = self.size as f64;
        let ws: Vec<f64> = drawn.iter().map(|(_, p)| (n * p).powf(-beta)).collect();
        let w_max = ws.iter().fold(f64::MIN, |m, w| m.max(*w));
        let ws = ws.iter().map(|w| (w / w_max) as f32).collect();
        let ixs = drawn.into_iter().map(|(ix, _)| ix).collect();

        Ok((ixs, ws))
    }

    /// Returns the capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the observation and action spaces.
    pub fn space(&self) -> &SpaceConfig {
        &self.space
    }

    /// Returns `true` if prioritized sampling is enabled.
    pub fn is_prioritized(&self) -> bool {
        self.per_state.is_some()
    }

    /// Returns `priority^alpha` of the `ix`-th slot, or `None` without PER.
    pub fn priority(&self, ix: usize) -> Option<f64> {
        self.per_state
            .as_ref()
            .map(|per_state| per_state.sum_tree.leaf(ix))
    }

    /// Returns the exponent of importance weights used by the next batch.
    pub fn beta(&self) -> Option<f64> {
        self.per_state
            .as_ref()
            .map(|per_state| per_state.iw_scheduler.beta())
    }
}

impl ExperienceBufferBase for ReplayBuffer {
    type Item = Transition;

    fn len(&self) -> usize {
        self.size
    }

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        self.space.check_obs_shape(tr.obs.shape())?;
        self.space.check_obs_shape(tr.next_obs.shape())?;
        ensure!(
            tr.act < self.space.num_actions,
            "action {} is out of range for {} actions",
            tr.act,
            self.space.num_actions
        );

        let i = self.i;
        let range = i * self.obs_len..(i + 1) * self.obs_len;
        Self::write_obs(&mut self.obs[range.clone()], &tr.obs);
        Self::write_obs(&mut self.next_obs[range], &tr.next_obs);
        self.act[i] = tr.act;
        self.reward[i] = tr.reward;
        self.is_done[i] = tr.is_done as i8;
        self.n_writes += 1;
        self.generation[i] = self.n_writes;

        if let Some(per_state) = self.per_state.as_mut() {
            let p = per_state.sum_tree.max_priority().max(1.0);
            per_state.sum_tree.update(i, p);
        }

        self.i = (self.i + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);

        Ok(())
    }
}

impl ReplayBufferBase for ReplayBuffer {
    type Config = ReplayBufferConfig;
    type Batch = TransitionBatch;
    type SampleId = SlotId;

    fn build(config: &Self::Config) -> Result<Self> {
        config.validate()?;
        let capacity = config.capacity;
        let obs_len = config.space.obs_len();
        let per_state = config.per_config.as_ref().map(|per_config| PerState {
            sum_tree: SumTree::new(capacity, per_config.alpha),
            iw_scheduler: IwScheduler::new(
                per_config.beta_0,
                per_config.beta_final,
                per_config.beta_frames,
            ),
        });

        Ok(Self {
            capacity,
            i: 0,
            size: 0,
            space: config.space.clone(),
            obs_len,
            obs: vec![0; capacity * obs_len],
            next_obs: vec![0; capacity * obs_len],
            act: vec![0; capacity],
            reward: vec![0.; capacity],
            is_done: vec![0; capacity],
            generation: vec![0; capacity],
            n_writes: 0,
            rng: StdRng::seed_from_u64(config.seed),
            per_state,
        })
    }

    /// Samples a batch of transitions.
    ///
    /// # Errors
    ///
    /// * [`CrafterError::EmptyBuffer`] if the buffer holds no transitions.
    /// * [`CrafterError::InsufficientSamples`] under PER if `size` exceeds the
    ///   number of slots with nonzero priority.
    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        if self.size == 0 {
            return Err(CrafterError::EmptyBuffer.into());
        }

        let (ixs, weight) = if self.per_state.is_some() {
            let (ixs, ws) = self.sample_prioritized(size)?;
            (ixs, Some(ws))
        } else {
            (self.sample_uniform(size), None)
        };

        Ok(TransitionBatch {
            obs: self.decode_obs(&self.obs, &ixs)?,
            act: ixs.iter().map(|&ix| self.act[ix]).collect(),
            next_obs: self.decode_obs(&self.next_obs, &ixs)?,
            reward: ixs.iter().map(|&ix| self.reward[ix]).collect(),
            is_done: ixs.iter().map(|&ix| self.is_done[ix]).collect(),
            ix_sample: ixs
                .iter()
                .map(|&ix| SlotId {
                    ix,
                    generation: self.generation[ix],
                })
                .collect(),
            weight,
        })
    }

    /// Sets the priority of each sampled slot to `|td_err| + 1e-6`.
    ///
    /// Slots overwritten since sampling keep their priority.
    fn update_priority(&mut self, ids: &[SlotId], td_errs: &[f32]) {
        let per_state = match self.per_state.as_mut() {
            Some(per_state) => per_state,
            None => return,
        };
        debug_assert_eq!(ids.len(), td_errs.len());

        for (id, td_err) in ids.iter().zip(td_errs.iter()) {
            if id.ix >= self.capacity || self.generation[id.ix] != id.generation {
                continue;
            }
            if !td_err.is_finite() {
                warn!("Ignored non-finite TD error {} for slot {}", td_err, id.ix);
                continue;
            }
            per_state
                .sum_tree
                .update(id.ix, td_err.abs() as f64 + PRIORITY_EPS);
        }
    }
}
