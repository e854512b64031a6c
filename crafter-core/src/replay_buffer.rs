//! Replay buffer of byte-quantized transitions.
//!
//! [`ReplayBuffer`] is a fixed-capacity ring buffer. Observations are stored as
//! one byte per element and rescaled to the unit range when a batch is drawn.
//! With a [`PerConfig`], sampling follows prioritized experience replay:
//! slots are drawn with probability proportional to `priority^alpha` and the
//! batch carries importance weights.
//!
//! [`NStepProcessor`] turns the stream of environment steps into n-step
//! transitions before they reach the buffer.
mod base;
mod batch;
mod config;
mod step_proc;
pub use base::{IwScheduler, ReplayBuffer, SumTree};
pub use batch::{SlotId, Transition, TransitionBatch};
pub use config::{PerConfig, ReplayBufferConfig};
pub use step_proc::{NStepProcessor, NStepProcessorConfig};
