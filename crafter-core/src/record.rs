//! Metrics records and recorders.
//!
//! A [`Record`] maps names to [`RecordValue`]s. Learners return one record per
//! optimization step, the sampler one per finished episode and the evaluator
//! one per evaluation. The [`Trainer`](crate::Trainer) hands them to an
//! [`AggregateRecorder`], which buffers them with [`AggregateRecorder::store`]
//! and writes aggregated values on [`AggregateRecorder::flush`].
//!
//! ```rust
//! use crafter_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("loss", 0.25);
//! record.insert("epsilon", RecordValue::Scalar(0.1));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.25);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
pub use storage::RecordStorage;
