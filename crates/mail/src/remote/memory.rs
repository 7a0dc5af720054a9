//! In-memory remote mailbox
//!
//! Stands in for Gmail in tests. Queries are recorded but not interpreted:
//! every listing pages through all messages in insertion order. Failures
//! can be scripted per fetch id, per delete call, or for listing.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{ListPage, MAX_DELETE_BATCH, RemoteSink, RemoteSource};
use crate::error::RemoteError;
use crate::models::{FullMessage, MessageId};

#[derive(Default)]
struct MailboxState {
    messages: Vec<FullMessage>,
    queries: Vec<String>,
    list_calls: usize,
    /// 1-based list call number from which every list call fails
    fail_list_from: Option<usize>,
    failing_fetches: HashSet<String>,
    /// 1-based delete call numbers that fail
    failing_delete_calls: HashSet<usize>,
    delete_calls: Vec<Vec<MessageId>>,
}

/// Scriptable in-memory implementation of the remote capabilities
#[derive(Default)]
pub struct InMemoryMailbox {
    state: Mutex<MailboxState>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MailboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a message
    pub fn add_message(&self, message: FullMessage) {
        let mut state = self.state();
        match state.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => state.messages.push(message),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state().messages.iter().any(|m| m.id == id)
    }

    pub fn message_count(&self) -> usize {
        self.state().messages.len()
    }

    /// Make the nth list call and every one after it fail (1-based)
    pub fn fail_list_calls_from(&self, call_number: usize) {
        self.state().fail_list_from = Some(call_number);
    }

    /// Let list calls succeed again
    pub fn restore_list_calls(&self) {
        self.state().fail_list_from = None;
    }

    /// Make fetching this id fail
    pub fn fail_fetch(&self, id: &str) {
        self.state().failing_fetches.insert(id.to_string());
    }

    /// Make the nth delete call fail (1-based)
    pub fn fail_delete_call(&self, call_number: usize) {
        self.state().failing_delete_calls.insert(call_number);
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub fn queries(&self) -> Vec<String> {
        self.state().queries.clone()
    }

    /// Ids passed to each delete call, failed calls included
    pub fn delete_calls(&self) -> Vec<Vec<MessageId>> {
        self.state().delete_calls.clone()
    }
}

impl RemoteSource for InMemoryMailbox {
    fn list(
        &self,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<ListPage, RemoteError> {
        let mut state = self.state();
        state.list_calls += 1;
        state.queries.push(query.to_string());

        if state.fail_list_from.is_some_and(|from| state.list_calls >= from) {
            return Err(RemoteError::Transport(format!(
                "list call {} failed",
                state.list_calls
            )));
        }

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| RemoteError::Transport(format!("invalid page token {token:?}")))?,
            None => 0,
        };
        let page_size = page_size.max(1);

        let ids: Vec<MessageId> = state
            .messages
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|m| MessageId::new(&m.id))
            .collect();

        let next = offset + ids.len();
        let next_page_token = (next < state.messages.len()).then(|| next.to_string());

        Ok(ListPage {
            ids,
            next_page_token,
        })
    }

    fn get_full(&self, id: &MessageId) -> Result<FullMessage, RemoteError> {
        let state = self.state();

        if state.failing_fetches.contains(id.as_str()) {
            return Err(RemoteError::Transport(format!("fetch of {id} failed")));
        }

        state
            .messages
            .iter()
            .find(|m| m.id == id.as_str())
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(id.clone()))
    }
}

impl RemoteSink for InMemoryMailbox {
    fn batch_delete(&self, ids: &[MessageId]) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.delete_calls.push(ids.to_vec());
        let call_number = state.delete_calls.len();

        if ids.len() > MAX_DELETE_BATCH {
            return Err(RemoteError::Transport(format!(
                "batch of {} exceeds limit of {MAX_DELETE_BATCH}",
                ids.len()
            )));
        }
        if state.failing_delete_calls.contains(&call_number) {
            return Err(RemoteError::Transport(format!(
                "delete call {call_number} failed"
            )));
        }

        let doomed: HashSet<&str> = ids.iter().map(MessageId::as_str).collect();
        state.messages.retain(|m| !doomed.contains(m.id.as_str()));
        Ok(())
    }
}
