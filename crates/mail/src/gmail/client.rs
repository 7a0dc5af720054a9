//! Gmail API HTTP client
//!
//! Lists, fetches and deletes messages through the Gmail API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::time::Duration;

use super::api::{BatchDeleteRequest, GmailMessage, ListMessagesResponse};
use super::{GmailAuth, normalize_message};
use crate::error::RemoteError;
use crate::models::{FullMessage, MessageId};
use crate::remote::{ListPage, RemoteSink, RemoteSource};

/// Attempts made for a single message fetch
const FETCH_ATTEMPTS: u32 = 3;

/// Gmail API client
pub struct GmailClient {
    auth: GmailAuth,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Largest `maxResults` the list endpoint accepts
    const MAX_LIST_RESULTS: usize = 500;

    pub fn new(auth: GmailAuth) -> Self {
        Self { auth }
    }

    /// List message IDs matching a Gmail search query
    ///
    /// # Arguments
    /// * `query` - Gmail search string, e.g. `after:2024/01/01 before:2025/01/01`
    /// * `max_results` - Maximum number of messages to return per page (1-500)
    /// * `page_token` - Optional page token for pagination
    pub fn list_messages(
        &self,
        query: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        let access_token = self.auth.get_access_token()?;

        let mut url = format!(
            "{}/users/me/messages?maxResults={}&q={}",
            Self::BASE_URL,
            max_results.clamp(1, Self::MAX_LIST_RESULTS),
            urlencoding::encode(query)
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send list messages request")?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")?;

        Ok(list)
    }

    /// Get full message details by ID
    pub fn get_message(&self, id: &MessageId) -> Result<GmailMessage> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/users/me/messages/{}?format=full",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send get message request")?;

        let message: GmailMessage = response
            .body_mut()
            .read_json()
            .context("Failed to parse message response")?;

        Ok(message)
    }

    /// Get a message with exponential backoff retry
    fn get_message_with_retry(&self, id: &MessageId) -> Result<GmailMessage> {
        let mut delay = Duration::from_millis(100);
        let mut attempt = 1;

        loop {
            match self.get_message(id) {
                Ok(msg) => return Ok(msg),
                Err(e) if attempt < FETCH_ATTEMPTS => {
                    debug!("Fetch of {} failed (attempt {}): {:#}", id, attempt, e);
                    let jitter = Duration::from_millis(rand_jitter());
                    std::thread::sleep(delay + jitter);
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "Failed to fetch message {} after {} attempts",
                        id, FETCH_ATTEMPTS
                    )));
                }
            }
        }
    }

    /// Permanently delete messages (bypasses Trash)
    ///
    /// Not retried: a failed call is reported to the caller, which decides
    /// whether the batch is attempted again.
    pub fn batch_delete_messages(&self, ids: &[MessageId]) -> Result<()> {
        let access_token = self.auth.get_access_token()?;

        let url = format!("{}/users/me/messages/batchDelete", Self::BASE_URL);
        let body = BatchDeleteRequest {
            ids: ids.iter().map(MessageId::as_str).collect(),
        };

        ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_json(&body)
            .context("Failed to send batch delete request")?;

        Ok(())
    }
}

impl RemoteSource for GmailClient {
    fn list(
        &self,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<ListPage, RemoteError> {
        let response = self
            .list_messages(query, page_size, page_token)
            .map_err(RemoteError::transport)?;

        let ids = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| MessageId::new(m.id))
            .collect();

        Ok(ListPage {
            ids,
            next_page_token: response.next_page_token,
        })
    }

    fn get_full(&self, id: &MessageId) -> Result<FullMessage, RemoteError> {
        match self.get_message_with_retry(id) {
            Ok(msg) => Ok(normalize_message(msg)),
            Err(e) if is_not_found(&e) => Err(RemoteError::NotFound(id.clone())),
            Err(e) => Err(RemoteError::transport(e)),
        }
    }
}

impl RemoteSink for GmailClient {
    fn batch_delete(&self, ids: &[MessageId]) -> Result<(), RemoteError> {
        self.batch_delete_messages(ids).map_err(|e| {
            warn!("Gmail batch delete of {} ids failed: {:#}", ids.len(), e);
            RemoteError::transport(e)
        })
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<ureq::Error>(),
            Some(ureq::Error::StatusCode(404))
        )
    })
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}
