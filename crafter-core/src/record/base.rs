//! Record and its values.
use crate::error::CrafterError;
use chrono::prelude::{DateTime, Local};
use std::collections::{
    hash_map::{IntoIter, Iter, Keys},
    HashMap,
};

/// A value in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A scalar metric such as a loss or a return.
    Scalar(f32),

    /// A timestamp.
    DateTime(DateTime<Local>),

    /// A sequence of values, for example per-quantile statistics.
    Array1(Vec<f32>),

    /// A text value.
    String(String),
}

impl RecordValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "Scalar",
            Self::DateTime(_) => "DateTime",
            Self::Array1(_) => "Array1",
            Self::String(_) => "String",
        }
    }
}

/// A set of named values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record holding a single scalar.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from pairs of names and values.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the names.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a value, replacing any previous value of the same name.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the pairs of names and values.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Consumes the record and returns an iterator over its pairs.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Returns the value of the given name.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records. Values of `record` win on name clashes.
    pub fn merge(mut self, record: Record) -> Self {
        self.0.extend(record.0);
        self
    }

    /// Merges `record` into this one. Values of `record` win on name clashes.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    fn get_as<T>(
        &self,
        k: &str,
        expected: &str,
        f: impl FnOnce(&RecordValue) -> Option<T>,
    ) -> Result<T, CrafterError> {
        let v = self
            .0
            .get(k)
            .ok_or_else(|| CrafterError::RecordKeyError(k.to_string()))?;
        f(v).ok_or_else(|| {
            CrafterError::RecordValueTypeError(format!(
                "{} is {}, expected {}",
                k,
                v.type_name(),
                expected
            ))
        })
    }

    /// Returns the scalar of the given name.
    ///
    /// # Errors
    ///
    /// [`CrafterError::RecordKeyError`] if the name is missing and
    /// [`CrafterError::RecordValueTypeError`] if the value is not a scalar.
    pub fn get_scalar(&self, k: &str) -> Result<f32, CrafterError> {
        self.get_as(k, "Scalar", |v| match v {
            RecordValue::Scalar(v) => Some(*v),
            _ => None,
        })
    }

    /// Returns the array of the given name.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, CrafterError> {
        self.get_as(k, "Array1", |v| match v {
            RecordValue::Array1(v) => Some(v.clone()),
            _ => None,
        })
    }

    /// Returns the string of the given name.
    pub fn get_string(&self, k: &str) -> Result<String, CrafterError> {
        self.get_as(k, "String", |v| match v {
            RecordValue::String(s) => Some(s.clone()),
            _ => None,
        })
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record holds no value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
