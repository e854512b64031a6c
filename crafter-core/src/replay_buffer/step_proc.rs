//! N-step return adder.
use super::Transition;
use crate::{Env, Observation, Step, StepProcessor};
use log::warn;
use serde::{Deserialize, Serialize};

/// Configuration of [`NStepProcessor`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct NStepProcessorConfig {
    /// Horizon of the return.
    pub n_step: usize,

    /// Discount factor.
    pub gamma: f32,
}

impl Default for NStepProcessorConfig {
    fn default() -> Self {
        Self {
            n_step: 1,
            gamma: 0.99,
        }
    }
}

impl NStepProcessorConfig {
    /// Sets the horizon of the return. Floored at 1.
    pub fn n_step(mut self, v: usize) -> Self {
        self.n_step = v.max(1);
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }
}

#[derive(Debug)]
struct PendingStep {
    act: usize,
    reward: f32,
    next_obs: Observation,
    is_done: bool,
}

/// Turns one-step transitions into n-step transitions.
///
/// Holds a window of at most `n` pending steps in a ring buffer plus the
/// anchor observation preceding the window. A transition
/// `(o_0, a_0, R, o_k, done)` with `R = sum_{i<k} gamma^i r_i` is emitted when
/// the window is full or holds a terminal step. The sum stops at and includes
/// the first terminal step, which sets `done`. After each emission the window
/// slides by one: the anchor becomes the next observation of the dropped step.
///
/// [`NStepProcessor::reset`] starts a new episode and clears the window. With
/// `n = 1` every step is emitted as is.
pub struct NStepProcessor {
    n_step: usize,
    gamma: f32,
    window: Vec<Option<PendingStep>>,
    head: usize,
    len: usize,
    anchor: Option<Observation>,
}

impl NStepProcessor {
    /// Creates a processor.
    pub fn new(n_step: usize, gamma: f32) -> Self {
        let n_step = n_step.max(1);
        Self {
            n_step,
            gamma,
            window: (0..n_step).map(|_| None).collect(),
            head: 0,
            len: 0,
            anchor: None,
        }
    }

    #[inline]
    fn slot(&self, k: usize) -> usize {
        (self.head + k) % self.n_step
    }

    fn pending(&self, k: usize) -> Option<&PendingStep> {
        self.window[self.slot(k)].as_ref()
    }

    fn pop_front(&mut self) -> Option<PendingStep> {
        let front = self.window[self.head].take();
        self.head = (self.head + 1) % self.n_step;
        self.len -= 1;
        front
    }

    /// Number of pending steps.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no step is pending.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clears the window and sets the anchor to the first observation of an episode.
    pub fn reset(&mut self, first_obs: Observation) {
        self.window.iter_mut().for_each(|s| *s = None);
        self.head = 0;
        self.len = 0;
        self.anchor = Some(first_obs);
    }

    /// Appends a step and returns an n-step transition if one is ready.
    pub fn add(
        &mut self,
        act: usize,
        reward: f32,
        next_obs: Observation,
        is_done: bool,
    ) -> Option<Transition> {
        if self.anchor.is_none() {
            warn!("NStepProcessor received a step before reset(); the step is dropped");
            return None;
        }

        let slot = self.slot(self.len);
        self.window[slot] = Some(PendingStep {
            act,
            reward,
            next_obs,
            is_done,
        });
        self.len += 1;

        let has_terminal = (0..self.len).any(|k| self.pending(k).map_or(false, |s| s.is_done));
        if self.len < self.n_step && !has_terminal {
            return None;
        }

        let mut ret = 0f32;
        let mut discount = 1f32;
        let mut end = 0;
        let mut done = false;
        for k in 0..self.len {
            let step = self.pending(k)?;
            ret += discount * step.reward;
            discount *= self.gamma;
            end = k;
            if step.is_done {
                done = true;
                break;
            }
        }
        let next_obs = self.pending(end)?.next_obs.clone();

        let front = self.pop_front()?;
        let obs = self.anchor.replace(front.next_obs)?;

        Some(Transition {
            obs,
            act: front.act,
            reward: ret,
            next_obs,
            is_done: done,
        })
    }
}

impl<E: Env> StepProcessor<E> for NStepProcessor {
    type Config = NStepProcessorConfig;
    type Output = Transition;

    fn build(config: &Self::Config) -> Self {
        Self::new(config.n_step, config.gamma)
    }

    fn reset(&mut self, init_obs: Observation) {
        NStepProcessor::reset(self, init_obs)
    }

    fn process(&mut self, step: Step<E>) -> Option<Self::Output> {
        let is_done = step.is_done();
        self.add(step.act, step.reward, step.obs, is_done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    fn obs(v: f32) -> Observation {
        ArrayD::from_elem(vec![1], v)
    }

    fn id(o: &Observation) -> f32 {
        o[[0]]
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_three_step_return() {
        let mut p = NStepProcessor::new(3, 0.9);
        p.reset(obs(0.0));
        assert!(p.add(0, 1.0, obs(1.0), false).is_none());
        assert!(p.add(1, 1.0, obs(2.0), false).is_none());

        let tr = p.add(2, 1.0, obs(3.0), false).unwrap();
        assert!(close(tr.reward, 2.71));
        assert_eq!((id(&tr.obs), tr.act, id(&tr.next_obs)), (0.0, 0, 3.0));
        assert!(!tr.is_done);
        assert_eq!(p.len(), 2);

        // the window slides by one
        let tr = p.add(3, 1.0, obs(4.0), false).unwrap();
        assert!(close(tr.reward, 2.71));
        assert_eq!((id(&tr.obs), tr.act, id(&tr.next_obs)), (1.0, 1, 4.0));
    }

    #[test]
    fn test_early_terminal() {
        let mut p = NStepProcessor::new(3, 0.9);
        p.reset(obs(0.0));
        assert!(p.add(0, 1.0, obs(1.0), false).is_none());

        let tr = p.add(1, 1.0, obs(2.0), true).unwrap();
        assert!(close(tr.reward, 1.9));
        assert!(tr.is_done);
        assert_eq!((id(&tr.obs), tr.act, id(&tr.next_obs)), (0.0, 0, 2.0));
    }

    #[test]
    fn test_consecutive_terminals() {
        // each terminal on an otherwise empty window gives a one-step transition
        let mut p = NStepProcessor::new(3, 0.9);
        p.reset(obs(0.0));
        let tr = p.add(0, 1.0, obs(1.0), true).unwrap();
        assert!(tr.is_done && close(tr.reward, 1.0));
        assert_eq!((id(&tr.obs), id(&tr.next_obs)), (0.0, 1.0));
        assert!(p.is_empty());

        let tr = p.add(1, 2.0, obs(2.0), true).unwrap();
        assert!(tr.is_done && close(tr.reward, 2.0));
        assert_eq!((id(&tr.obs), tr.act, id(&tr.next_obs)), (1.0, 1, 2.0));
    }

    #[test]
    fn test_terminal_left_in_window() {
        // the return never runs past the first terminal still in the window
        let mut p = NStepProcessor::new(3, 0.9);
        p.reset(obs(0.0));
        assert!(p.add(0, 1.0, obs(1.0), false).is_none());
        let tr = p.add(1, 1.0, obs(2.0), true).unwrap();
        assert!(close(tr.reward, 1.9));

        let tr = p.add(2, 5.0, obs(3.0), true).unwrap();
        assert!(tr.is_done && close(tr.reward, 1.0));
        assert_eq!((id(&tr.obs), tr.act, id(&tr.next_obs)), (1.0, 1, 2.0));
    }

    #[test]
    fn test_one_step() {
        let mut p = NStepProcessor::new(1, 0.5);
        p.reset(obs(0.0));
        for t in 0..5 {
            let done = t == 4;
            let tr = p.add(t, t as f32, obs(t as f32 + 1.0), done).unwrap();
            assert_eq!(id(&tr.obs), t as f32);
            assert_eq!(id(&tr.next_obs), t as f32 + 1.0);
            assert_eq!(tr.act, t);
            assert!(close(tr.reward, t as f32));
            assert_eq!(tr.is_done, done);
            assert!(p.is_empty());
        }
    }

    #[test]
    fn test_reset_clears_window() {
        let mut p = NStepProcessor::new(3, 0.9);
        p.reset(obs(0.0));
        assert!(p.add(0, 1.0, obs(1.0), false).is_none());
        assert!(p.add(1, 1.0, obs(2.0), false).is_none());

        p.reset(obs(10.0));
        assert!(p.is_empty());
        assert!(p.add(0, 1.0, obs(11.0), false).is_none());
        assert!(p.add(0, 1.0, obs(12.0), false).is_none());
        let tr = p.add(0, 1.0, obs(13.0), false).unwrap();
        assert_eq!((id(&tr.obs), id(&tr.next_obs)), (10.0, 13.0));
    }

    #[test]
    fn test_step_before_reset_is_dropped() {
        let mut p = NStepProcessor::new(1, 0.9);
        assert!(p.add(0, 1.0, obs(1.0), false).is_none());
        assert!(p.is_empty());
    }
}
