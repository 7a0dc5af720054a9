//! Ingestion checkpoints for resumable window loads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress of an interrupted ingestion window
///
/// Saved after every committed page, keyed by the remote query string.
/// Only one checkpoint exists per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestCheckpoint {
    /// Remote query that identifies the window
    pub query: String,
    /// Continuation token of the next page to fetch
    pub next_page_token: String,
    /// Messages upserted so far for this query
    pub messages_upserted: usize,
    /// When the last page was committed
    pub updated_at: DateTime<Utc>,
}

impl IngestCheckpoint {
    pub fn new(
        query: impl Into<String>,
        next_page_token: impl Into<String>,
        messages_upserted: usize,
    ) -> Self {
        Self {
            query: query.into(),
            next_page_token: next_page_token.into(),
            messages_upserted,
            updated_at: Utc::now(),
        }
    }
}

/// Per-sender aggregate used by the summary report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderSummary {
    pub from_addr: String,
    pub total: usize,
    pub with_attachment: usize,
}
