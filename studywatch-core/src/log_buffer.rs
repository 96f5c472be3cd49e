//! Append-only accumulation of the task's execution log.
//!
//! `GET /logs/{id}` drains a server-side queue, so every successful fetch
//! returns only entries the client has not seen. The buffer therefore appends
//! each batch verbatim as one contiguous extension: it never replaces, never
//! reorders and never deduplicates across batches. A failed fetch simply never
//! reaches [`LogBuffer::append`], so the buffer stays as it was.

use crate::types::LogEntry;

/// Ordered log entries in arrival order; length never decreases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogBuffer {
    entries: Vec<LogEntry>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fetched batch at the tail.
    ///
    /// Returns the number of entries added (0 for an empty batch).
    pub fn append(&mut self, batch: Vec<LogEntry>) -> usize {
        let added = batch.len();
        self.entries.extend(batch);
        added
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogEntry> {
        self.entries.iter()
    }

    /// Entries appended at or after position `from` (for tailing consumers).
    pub fn since(&self, from: usize) -> &[LogEntry] {
        self.entries.get(from..).unwrap_or(&[])
    }
}

impl<'a> IntoIterator for &'a LogBuffer {
    type Item = &'a LogEntry;
    type IntoIter = std::slice::Iter<'a, LogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
