//! Batch mutation coordinator
//!
//! Coordinates between the remote mailbox and local storage for deletion.

use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::StorageError;
use crate::models::{MessageId, MessageRecord};
use crate::remote::{MAX_DELETE_BATCH, RemoteSink};
use crate::storage::MessageStore;

/// Default number of ids per remote delete call
pub const DEFAULT_BATCH_SIZE: usize = MAX_DELETE_BATCH;

/// Outcome of one remote delete call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Confirmed,
    Failed(String),
}

/// One attempted batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Zero-based position of the batch within the run
    pub index: usize,
    pub ids: Vec<MessageId>,
    pub outcome: BatchOutcome,
}

impl BatchReport {
    pub fn is_confirmed(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Confirmed)
    }
}

/// Result of a deletion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionResult {
    /// Every attempted batch, in order
    pub batches: Vec<BatchReport>,
    /// Records whose local flag changed from not-deleted to deleted
    pub marked_locally: usize,
}

impl DeletionResult {
    /// Ids the remote confirmed as deleted
    pub fn deleted_count(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.is_confirmed())
            .map(|b| b.ids.len())
            .sum()
    }

    /// Batches whose remote call failed
    pub fn failures(&self) -> impl Iterator<Item = &BatchReport> {
        self.batches.iter().filter(|b| !b.is_confirmed())
    }

    pub fn confirmed_ids(&self) -> Vec<MessageId> {
        self.batches
            .iter()
            .filter(|b| b.is_confirmed())
            .flat_map(|b| b.ids.iter().cloned())
            .collect()
    }

    /// Ids left in place remotely, to retry on a later pass
    pub fn failed_ids(&self) -> Vec<MessageId> {
        self.failures().flat_map(|b| b.ids.iter().cloned()).collect()
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Handler for destructive actions on the remote mailbox
///
/// Deletion runs in two phases:
/// 1. Delete on the remote in batches, collecting the confirmed ids
/// 2. Mark exactly the confirmed ids deleted in local storage
///
/// A record is never marked locally unless the remote confirmed deleting
/// it. A crash between the phases leaves messages gone remotely but still
/// present locally, which the next ingestion pass repairs.
pub struct ActionHandler {
    remote: Arc<dyn RemoteSink>,
    store: Arc<dyn MessageStore>,
}

impl ActionHandler {
    pub fn new(remote: Arc<dyn RemoteSink>, store: Arc<dyn MessageStore>) -> Self {
        Self { remote, store }
    }

    /// Delete the remote messages behind `records` and mark them locally
    ///
    /// See [`ActionHandler::delete_ids`].
    pub fn delete_selected(
        &self,
        records: &[MessageRecord],
        batch_size: usize,
    ) -> Result<DeletionResult, StorageError> {
        let ids: Vec<MessageId> = records.iter().map(|r| r.remote_id.clone()).collect();
        self.delete_ids(&ids, batch_size)
    }

    /// Delete remote messages by id in consecutive batches
    ///
    /// `batch_size` is clamped to 1..=100 and duplicate ids are sent once.
    /// A failed batch is recorded and the run continues with the next one.
    /// Only a local store failure aborts, and it can only happen after every
    /// batch was attempted.
    pub fn delete_ids(
        &self,
        ids: &[MessageId],
        batch_size: usize,
    ) -> Result<DeletionResult, StorageError> {
        let batch_size = batch_size.clamp(1, MAX_DELETE_BATCH);

        let mut seen = HashSet::new();
        let ids: Vec<MessageId> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let mut result = DeletionResult::default();
        if ids.is_empty() {
            return Ok(result);
        }

        let total_batches = ids.len().div_ceil(batch_size);
        info!(
            "Deleting {} messages in {} batches of up to {}",
            ids.len(),
            total_batches,
            batch_size
        );

        let mut confirmed = Vec::with_capacity(ids.len());
        for (index, batch) in ids.chunks(batch_size).enumerate() {
            let outcome = match self.remote.batch_delete(batch) {
                Ok(()) => {
                    info!("Batch {}/{} deleted ({} ids)", index + 1, total_batches, batch.len());
                    confirmed.extend_from_slice(batch);
                    BatchOutcome::Confirmed
                }
                Err(e) => {
                    warn!("Batch {}/{} failed: {}", index + 1, total_batches, e);
                    BatchOutcome::Failed(e.to_string())
                }
            };

            result.batches.push(BatchReport {
                index,
                ids: batch.to_vec(),
                outcome,
            });
        }

        result.marked_locally = self.store.mark_deleted(&confirmed)?;
        info!(
            "Deleted {} of {} messages remotely, marked {} locally",
            confirmed.len(),
            ids.len(),
            result.marked_locally
        );

        Ok(result)
    }
}
