//! The append-only conversation transcript.

use std::cell::OnceCell;
use std::sync::Arc;

use voyagr_model::{MessageBody, Role, TranscriptEntry};

/// Ordered, append-only log of transcript entries.
///
/// The orchestrator is the only writer; readers share immutable snapshots
/// through [`TranscriptLog::snapshot`]. A snapshot is built at most once
/// per change, so taking it repeatedly between changes is cheap.
#[derive(Clone, Debug, Default)]
pub struct TranscriptLog {
    entries: Vec<TranscriptEntry>,
    shared: OnceCell<Arc<[TranscriptEntry]>>,
}

impl TranscriptLog {
    /// Appends an entry, rendering structured bodies to text.
    pub fn append(&mut self, role: Role, body: impl Into<MessageBody>) -> &TranscriptEntry {
        let sequence = self.entries.len() as u64;
        self.entries.push(TranscriptEntry {
            role,
            content: body.into().render(),
            sequence,
        });
        self.shared.take();
        &self.entries[self.entries.len() - 1]
    }

    /// Removes every entry. Calling it on an empty log is a no-op.
    #[inline]
    pub fn reset(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.shared.take();
        }
    }

    /// Returns the entries in insertion order. Consecutive calls without a
    /// change in between return the same allocation.
    pub fn snapshot(&self) -> Arc<[TranscriptEntry]> {
        let shared = self
            .shared
            .get_or_init(|| Arc::from(self.entries.as_slice()));
        Arc::clone(shared)
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the log has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
