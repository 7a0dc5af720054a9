//! Ingestion of a date window from the remote mailbox into the store

use chrono::{Datelike, NaiveDate};
use log::{debug, info, warn};

use super::record::build_record;
use crate::error::{Error, Result};
use crate::models::{IngestCheckpoint, MessageId};
use crate::remote::{Pages, RemoteSource};
use crate::storage::MessageStore;

/// Largest page the Gmail list endpoint returns
pub const MAX_PAGE_SIZE: usize = 500;

/// A half-open date range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl IngestWindow {
    /// Messages dated on or after `start` and before `end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(Error::usage(format!(
                "window start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Every message dated in a calendar year
    pub fn year(year: i32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| Error::usage(format!("year {year} is out of range")))?;
        let end = start
            .with_year(year + 1)
            .ok_or_else(|| Error::usage(format!("year {year} is out of range")))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Remote search query selecting this window
    pub fn query(&self) -> String {
        format!(
            "after:{} before:{}",
            self.start.format("%Y/%m/%d"),
            self.end.format("%Y/%m/%d")
        )
    }
}

/// Options controlling an ingestion run
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Ids requested per list call (clamped to 1..=500)
    pub page_size: usize,
    /// Continue from a saved checkpoint when one exists
    pub resume: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            resume: false,
        }
    }
}

/// A listed message whose full fetch failed and was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFetch {
    pub id: MessageId,
    pub reason: String,
}

/// Statistics from an ingestion run
#[derive(Debug, Default, Clone)]
pub struct IngestStats {
    /// Remote query that was drained
    pub query: String,
    /// Token the run started from, if it resumed a checkpoint
    pub resumed_from: Option<String>,
    /// Pages committed
    pub pages: usize,
    /// Ids listed by the remote
    pub listed: usize,
    /// Records upserted into the store
    pub upserted: usize,
    /// Listed messages that could not be fetched
    pub skipped: Vec<SkippedFetch>,
    /// Duration of the run
    pub duration_ms: u64,
}

/// Ingest every remote message in `window` into `store`
///
/// Pages are drained in order and each page is committed in one store
/// transaction before the next is listed, followed by a checkpoint. An
/// interrupted run therefore loses at most the page in flight. A message
/// that fails to fetch is skipped and reported in [`IngestStats::skipped`];
/// list and storage failures abort the run.
pub fn ingest_window(
    source: &dyn RemoteSource,
    store: &dyn MessageStore,
    window: &IngestWindow,
    options: &IngestOptions,
) -> Result<IngestStats> {
    ingest_query(source, store, &window.query(), options)
}

/// Ingest every remote message matching an arbitrary query
pub fn ingest_query(
    source: &dyn RemoteSource,
    store: &dyn MessageStore,
    query: &str,
    options: &IngestOptions,
) -> Result<IngestStats> {
    let start = std::time::Instant::now();
    let page_size = options.page_size.clamp(1, MAX_PAGE_SIZE);

    let mut stats = IngestStats {
        query: query.to_string(),
        ..Default::default()
    };

    let mut upserted_before = 0;
    if options.resume
        && let Some(checkpoint) = store.get_checkpoint(query)?
    {
        info!(
            "Resuming '{}' after {} previously ingested messages",
            query, checkpoint.messages_upserted
        );
        upserted_before = checkpoint.messages_upserted;
        stats.resumed_from = Some(checkpoint.next_page_token);
    }

    let mut pages = Pages::resume(source, query, page_size, stats.resumed_from.clone());

    while let Some(page) = pages.next() {
        let page = page?;
        stats.pages += 1;
        stats.listed += page.ids.len();

        let mut records = Vec::with_capacity(page.ids.len());
        for id in &page.ids {
            match source.get_full(id) {
                Ok(message) => {
                    debug!("Fetched message {}", id);
                    records.push(build_record(&message));
                }
                Err(e) => {
                    warn!("Skipping message {}: {}", id, e);
                    stats.skipped.push(SkippedFetch {
                        id: id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        stats.upserted += store.upsert_messages(&records)?;

        match pages.resume_token() {
            Some(token) => store.save_checkpoint(&IngestCheckpoint::new(
                query,
                token,
                upserted_before + stats.upserted,
            ))?,
            None => store.clear_checkpoint(query)?,
        }

        info!(
            "Committed page {} ({} messages, {} total)",
            stats.pages,
            records.len(),
            stats.upserted
        );
    }

    stats.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Ingested {} messages for '{}' ({} skipped)",
        stats.upserted,
        query,
        stats.skipped.len()
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FullMessage, Header};
    use crate::remote::InMemoryMailbox;
    use crate::storage::InMemoryMessageStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn mailbox(n: usize) -> InMemoryMailbox {
        let mailbox = InMemoryMailbox::new();
        for i in 0..n {
            mailbox.add_message(FullMessage {
                id: format!("m{i}"),
                headers: vec![
                    Header::new("From", format!("sender{}@x.com", i % 3)),
                    Header::new("Subject", format!("Message {i}")),
                ],
                ..Default::default()
            });
        }
        mailbox
    }

    fn options(page_size: usize) -> IngestOptions {
        IngestOptions {
            page_size,
            resume: false,
        }
    }

    #[test]
    fn test_window_query() {
        let window = IngestWindow::new(date(2024, 3, 1), date(2024, 4, 1)).unwrap();
        assert_eq!(window.query(), "after:2024/03/01 before:2024/04/01");

        let year = IngestWindow::year(2023).unwrap();
        assert_eq!(year.start(), date(2023, 1, 1));
        assert_eq!(year.end(), date(2024, 1, 1));
    }

    #[test]
    fn test_window_must_be_ordered() {
        let err = IngestWindow::new(date(2024, 4, 1), date(2024, 4, 1)).unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_ingest_drains_all_pages() {
        let mailbox = mailbox(7);
        let store = InMemoryMessageStore::new();
        let window = IngestWindow::year(2024).unwrap();

        let stats = ingest_window(&mailbox, &store, &window, &options(3)).unwrap();

        assert_eq!(stats.pages, 3);
        assert_eq!(stats.listed, 7);
        assert_eq!(stats.upserted, 7);
        assert!(stats.skipped.is_empty());
        assert_eq!(store.count_messages().unwrap(), 7);
        assert_eq!(mailbox.queries()[0], "after:2024/01/01 before:2025/01/01");
        assert!(store.get_checkpoint(&window.query()).unwrap().is_none());
    }

    #[test]
    fn test_fetch_failure_is_skipped_and_reported() {
        let mailbox = mailbox(4);
        mailbox.fail_fetch("m2");
        let store = InMemoryMessageStore::new();

        let stats = ingest_query(&mailbox, &store, "q", &options(10)).unwrap();

        assert_eq!(stats.listed, 4);
        assert_eq!(stats.upserted, 3);
        assert_eq!(stats.skipped.len(), 1);
        assert_eq!(stats.skipped[0].id, MessageId::new("m2"));
        assert!(store.get_message(&MessageId::new("m2")).unwrap().is_none());
    }

    #[test]
    fn test_interrupted_run_keeps_committed_pages_and_resumes() {
        let mailbox = mailbox(6);
        mailbox.fail_list_calls_from(3);
        let store = InMemoryMessageStore::new();

        let err = ingest_query(&mailbox, &store, "q", &options(2)).unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
        assert_eq!(store.count_messages().unwrap(), 4);

        let checkpoint = store.get_checkpoint("q").unwrap().unwrap();
        assert_eq!(checkpoint.next_page_token, "4");
        assert_eq!(checkpoint.messages_upserted, 4);

        mailbox.restore_list_calls();
        let resume = IngestOptions {
            page_size: 2,
            resume: true,
        };
        let stats = ingest_query(&mailbox, &store, "q", &resume).unwrap();

        assert_eq!(stats.resumed_from.as_deref(), Some("4"));
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.upserted, 2);
        assert_eq!(store.count_messages().unwrap(), 6);
        assert!(store.get_checkpoint("q").unwrap().is_none());
    }

    #[test]
    fn test_empty_window() {
        let mailbox = InMemoryMailbox::new();
        let store = InMemoryMessageStore::new();

        let stats = ingest_query(&mailbox, &store, "q", &IngestOptions::default()).unwrap();
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.upserted, 0);
    }
}
