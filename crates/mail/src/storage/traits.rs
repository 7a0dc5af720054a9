//! Storage trait definitions

use crate::error::StorageResult;
use crate::models::{IngestCheckpoint, MessageId, MessageRecord, SenderSummary};
use crate::query::MessageFilter;

/// Trait for the local mirror of remote message metadata
///
/// This trait abstracts over different storage backends (in-memory, SQLite)
/// and provides the operations the ingestion, selection and deletion paths
/// need. Records are never physically removed; deletion is a soft marker.
pub trait MessageStore: Send + Sync {
    /// Insert or update a record, preserving an existing `is_deleted` flag
    ///
    /// The incoming record's `is_deleted` is ignored: the stored flag is
    /// carried forward, or false for a new record.
    fn upsert_message(&self, record: MessageRecord) -> StorageResult<()> {
        self.upsert_messages(std::slice::from_ref(&record)).map(|_| ())
    }

    /// Upsert a page of records atomically; returns how many were written
    fn upsert_messages(&self, records: &[MessageRecord]) -> StorageResult<usize>;

    /// Get a record by remote ID
    fn get_message(&self, id: &MessageId) -> StorageResult<Option<MessageRecord>>;

    /// Count all records, deleted or not
    fn count_messages(&self) -> StorageResult<usize>;

    /// Records matching the filter, ordered by (from_addr, subject, remote_id)
    fn query_messages(&self, filter: &MessageFilter) -> StorageResult<Vec<MessageRecord>>;

    /// Set `is_deleted` on each given ID; unknown IDs are ignored
    ///
    /// Returns the number of records that changed.
    fn mark_deleted(&self, ids: &[MessageId]) -> StorageResult<usize>;

    /// Retained senders, ordered by address
    fn list_retained(&self) -> StorageResult<Vec<String>>;

    /// Add a retained sender; returns false if it was already present
    fn add_retained(&self, addr: &str) -> StorageResult<bool>;

    /// Remove a retained sender; returns false if it was absent
    fn remove_retained(&self, addr: &str) -> StorageResult<bool>;

    /// Per-sender counts over non-retained messages, largest first
    fn summarize(&self, include_deleted: bool) -> StorageResult<Vec<SenderSummary>>;

    // === Ingestion checkpoints ===

    /// Get the checkpoint for a remote query
    fn get_checkpoint(&self, query: &str) -> StorageResult<Option<IngestCheckpoint>>;

    /// Save a checkpoint (upsert by query)
    fn save_checkpoint(&self, checkpoint: &IngestCheckpoint) -> StorageResult<()>;

    /// Remove the checkpoint for a remote query
    fn clear_checkpoint(&self, query: &str) -> StorageResult<()>;
}
