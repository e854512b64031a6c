use super::Record;

/// Writes a record to an output destination right away.
pub trait Recorder {
    /// Writes a record.
    fn write(&mut self, record: Record);
}

/// Buffers records and writes aggregated values on demand.
pub trait AggregateRecorder {
    /// Stores a record.
    fn store(&mut self, record: Record);

    /// Writes values aggregated from the stored records, tagged with `step`,
    /// and clears the store.
    fn flush(&mut self, step: i64);
}
