//! Aggregation of stored records.
use super::{Record, RecordValue};
use log::warn;
use std::collections::HashSet;
use xxhash_rust::xxh3::Xxh3Builder;

/// Stores records and aggregates them by name.
///
/// Scalars seen once are passed through. Scalars seen several times are
/// summarized as `<name>_min`, `<name>_max`, `<name>_mean` and
/// `<name>_median`. For the other value types the most recent value wins.
/// A name whose values change type between records keeps the type of its
/// first occurrence; other values are dropped with a warning.
#[derive(Default)]
pub struct RecordStorage {
    data: Vec<Record>,
}

fn median(mut vs: Vec<f32>) -> f32 {
    vs.sort_by(|x, y| x.total_cmp(y));
    vs[vs.len() / 2]
}

fn summarize(key: &str, vs: Vec<f32>) -> Record {
    if vs.len() == 1 {
        return Record::from_scalar(key, vs[0]);
    }
    let min = vs.iter().copied().fold(f32::INFINITY, f32::min);
    let max = vs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mean = vs.iter().sum::<f32>() / vs.len() as f32;
    Record::from_slice(&[
        (format!("{}_min", key), RecordValue::Scalar(min)),
        (format!("{}_max", key), RecordValue::Scalar(max)),
        (format!("{}_mean", key), RecordValue::Scalar(mean)),
        (format!("{}_median", key), RecordValue::Scalar(median(vs))),
    ])
}

impl RecordStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record.
    pub fn store(&mut self, record: Record) {
        self.data.push(record);
    }

    /// Returns `true` if no record is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn keys(&self) -> HashSet<&String, Xxh3Builder> {
        let mut keys = HashSet::<&String, Xxh3Builder>::default();
        for record in self.data.iter() {
            keys.extend(record.keys());
        }
        keys
    }

    fn values<'a>(&'a self, key: &'a str) -> impl DoubleEndedIterator<Item = &'a RecordValue> + 'a {
        self.data.iter().filter_map(move |record| record.get(key))
    }

    fn aggregate_key(&self, key: &str) -> Option<Record> {
        let first = self.values(key).next()?;
        match first {
            RecordValue::Scalar(_) => {
                let vs: Vec<f32> = self
                    .values(key)
                    .filter_map(|v| match v {
                        RecordValue::Scalar(v) => Some(*v),
                        _ => {
                            warn!("Dropped a non-scalar value of {}", key);
                            None
                        }
                    })
                    .collect();
                Some(summarize(key, vs))
            }
            _ => {
                let tag = std::mem::discriminant(first);
                let last = self
                    .values(key)
                    .rev()
                    .find(|v| std::mem::discriminant(*v) == tag)?;
                Some(Record::from_slice(&[(key, last.clone())]))
            }
        }
    }

    /// Aggregates the stored records and clears the storage.
    pub fn aggregate(&mut self) -> Record {
        let mut record = Record::empty();
        for key in self.keys() {
            if let Some(r) = self.aggregate_key(key) {
                record.merge_inplace(r);
            }
        }
        self.data.clear();
        record
    }
}
