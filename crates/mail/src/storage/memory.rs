//! In-memory storage implementation
//!
//! Used by tests and for rehearsing a run without touching the database.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::MessageStore;
use crate::error::{StorageError, StorageResult};
use crate::models::{IngestCheckpoint, MessageId, MessageRecord, SenderSummary};
use crate::query::MessageFilter;

/// In-memory implementation of MessageStore
///
/// Uses maps protected by RwLocks for thread-safe access.
pub struct InMemoryMessageStore {
    messages: RwLock<HashMap<String, MessageRecord>>,
    retained: RwLock<BTreeSet<String>>,
    checkpoints: RwLock<HashMap<String, IngestCheckpoint>>,
}

fn read<T>(lock: &RwLock<T>) -> StorageResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| StorageError::Poisoned)
}

fn write<T>(lock: &RwLock<T>) -> StorageResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| StorageError::Poisoned)
}

impl InMemoryMessageStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
            retained: RwLock::new(BTreeSet::new()),
            checkpoints: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore for InMemoryMessageStore {
    fn upsert_messages(&self, records: &[MessageRecord]) -> StorageResult<usize> {
        let mut messages = write(&self.messages)?;

        for record in records {
            let key = record.remote_id.0.clone();
            // Read the existing flag before replacing the row
            let is_deleted = messages.get(&key).is_some_and(|m| m.is_deleted);
            let mut record = record.clone();
            record.is_deleted = is_deleted;
            messages.insert(key, record);
        }

        Ok(records.len())
    }

    fn get_message(&self, id: &MessageId) -> StorageResult<Option<MessageRecord>> {
        Ok(read(&self.messages)?.get(id.as_str()).cloned())
    }

    fn count_messages(&self) -> StorageResult<usize> {
        Ok(read(&self.messages)?.len())
    }

    fn query_messages(&self, filter: &MessageFilter) -> StorageResult<Vec<MessageRecord>> {
        let messages = read(&self.messages)?;
        let retained = read(&self.retained)?;

        let mut result: Vec<MessageRecord> = messages
            .values()
            .filter(|m| filter.matches(m, &retained))
            .cloned()
            .collect();

        result.sort_by(|a, b| {
            (&a.from_addr, &a.subject, &a.remote_id).cmp(&(&b.from_addr, &b.subject, &b.remote_id))
        });

        Ok(result)
    }

    fn mark_deleted(&self, ids: &[MessageId]) -> StorageResult<usize> {
        let mut messages = write(&self.messages)?;
        let mut changed = 0;

        for id in ids {
            if let Some(record) = messages.get_mut(id.as_str())
                && !record.is_deleted
            {
                record.is_deleted = true;
                changed += 1;
            }
        }

        Ok(changed)
    }

    fn list_retained(&self) -> StorageResult<Vec<String>> {
        Ok(read(&self.retained)?.iter().cloned().collect())
    }

    fn add_retained(&self, addr: &str) -> StorageResult<bool> {
        Ok(write(&self.retained)?.insert(addr.to_string()))
    }

    fn remove_retained(&self, addr: &str) -> StorageResult<bool> {
        Ok(write(&self.retained)?.remove(addr))
    }

    fn summarize(&self, include_deleted: bool) -> StorageResult<Vec<SenderSummary>> {
        let messages = read(&self.messages)?;
        let retained = read(&self.retained)?;

        let mut by_sender: HashMap<&str, SenderSummary> = HashMap::new();
        for m in messages.values() {
            if retained.contains(&m.from_addr) || (m.is_deleted && !include_deleted) {
                continue;
            }
            let entry = by_sender
                .entry(m.from_addr.as_str())
                .or_insert_with(|| SenderSummary {
                    from_addr: m.from_addr.clone(),
                    total: 0,
                    with_attachment: 0,
                });
            entry.total += 1;
            if m.has_attachment {
                entry.with_attachment += 1;
            }
        }

        let mut result: Vec<SenderSummary> = by_sender.into_values().collect();
        result.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.from_addr.cmp(&b.from_addr)));

        Ok(result)
    }

    fn get_checkpoint(&self, query: &str) -> StorageResult<Option<IngestCheckpoint>> {
        Ok(read(&self.checkpoints)?.get(query).cloned())
    }

    fn save_checkpoint(&self, checkpoint: &IngestCheckpoint) -> StorageResult<()> {
        write(&self.checkpoints)?.insert(checkpoint.query.clone(), checkpoint.clone());
        Ok(())
    }

    fn clear_checkpoint(&self, query: &str) -> StorageResult<()> {
        write(&self.checkpoints)?.remove(query);
        Ok(())
    }
}
