//! Search queries run directly against the remote mailbox

use std::collections::HashSet;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::models::{MessageId, MessageRecord};
use crate::remote::{Pages, RemoteSource};
use crate::storage::MessageStore;
use crate::sync::{SkippedFetch, build_record};

/// Remote search matches split by deletion eligibility
#[derive(Debug, Default, Clone)]
pub struct LiveSelection {
    /// Rendered search string
    pub query: String,
    /// Fetched matches eligible for deletion
    pub records: Vec<MessageRecord>,
    /// Matches from a retained sender
    pub retained: Vec<MessageRecord>,
    /// Matches that could not be fetched and are left alone
    pub skipped: Vec<SkippedFetch>,
}

impl LiveSelection {
    /// Ids of the eligible records, in search order
    pub fn ids(&self) -> Vec<MessageId> {
        self.records.iter().map(|r| r.remote_id.clone()).collect()
    }

    pub fn matched(&self) -> usize {
        self.records.len() + self.retained.len() + self.skipped.len()
    }
}

/// A Gmail search built from subject, sender and age filters
///
/// Subjects are OR-combined, senders are OR-combined, and the groups are
/// AND-combined with the age terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSearch {
    subjects: Vec<String>,
    senders: Vec<String>,
    newer_than: Option<String>,
    older_than: Option<String>,
}

impl RemoteSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subjects = subjects.into_iter().map(Into::into).collect();
        self
    }

    pub fn senders<I, S>(mut self, senders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.senders = senders.into_iter().map(Into::into).collect();
        self
    }

    /// Only messages newer than a duration such as `7d`, `3m` or `1y`
    pub fn newer_than(mut self, duration: Option<String>) -> Result<Self> {
        self.newer_than = duration.map(validate_duration).transpose()?;
        Ok(self)
    }

    /// Only messages older than a duration such as `7d`, `3m` or `1y`
    pub fn older_than(mut self, duration: Option<String>) -> Result<Self> {
        self.older_than = duration.map(validate_duration).transpose()?;
        Ok(self)
    }

    /// Render the Gmail search string
    ///
    /// Fails with [`Error::Usage`] when no filter was given, so a live run
    /// can never match the whole mailbox.
    pub fn query(&self) -> Result<String> {
        let mut parts = Vec::new();

        if let Some(group) = or_group("subject", &self.subjects) {
            parts.push(group);
        }
        if let Some(group) = or_group("from", &self.senders) {
            parts.push(group);
        }
        if let Some(newer) = &self.newer_than {
            parts.push(format!("newer_than:{newer}"));
        }
        if let Some(older) = &self.older_than {
            parts.push(format!("older_than:{older}"));
        }

        if parts.is_empty() {
            return Err(Error::usage(
                "at least one of --subject, --from, --newer-than or --older-than is required",
            ));
        }
        Ok(parts.join(" "))
    }

    /// List every remote id matching this search
    pub fn collect_ids(&self, source: &dyn RemoteSource, page_size: usize) -> Result<Vec<MessageId>> {
        let query = self.query()?;
        let mut ids = Vec::new();
        for page in Pages::new(source, query, page_size) {
            ids.extend(page?.ids);
        }
        Ok(ids)
    }

    /// Fetch every match and keep those eligible for deletion
    ///
    /// A match whose sender exactly equals a retained address is set aside,
    /// as is any match whose full fetch fails.
    pub fn select_live(
        &self,
        source: &dyn RemoteSource,
        store: &dyn MessageStore,
        page_size: usize,
    ) -> Result<LiveSelection> {
        let query = self.query()?;
        let retained: HashSet<String> = store.list_retained()?.into_iter().collect();
        let ids = self.collect_ids(source, page_size)?;

        let mut selection = LiveSelection {
            query,
            ..Default::default()
        };
        for id in ids {
            match source.get_full(&id) {
                Ok(message) => {
                    let record = build_record(&message);
                    if retained.contains(&record.from_addr) {
                        selection.retained.push(record);
                    } else {
                        selection.records.push(record);
                    }
                }
                Err(e) => {
                    warn!("Could not fetch {}: {}", id, e);
                    selection.skipped.push(SkippedFetch {
                        id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Live search matched {} messages ({} retained, {} unfetched)",
            selection.matched(),
            selection.retained.len(),
            selection.skipped.len()
        );
        Ok(selection)
    }
}

fn or_group(field: &str, values: &[String]) -> Option<String> {
    let clauses: Vec<String> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| format!("{field}:\"{}\"", v.replace('"', "")))
        .collect();

    match clauses.len() {
        0 => None,
        1 => clauses.into_iter().next(),
        _ => Some(format!("({})", clauses.join(" OR "))),
    }
}

fn validate_duration(duration: String) -> Result<String> {
    let duration = duration.trim().to_string();
    let valid = duration
        .strip_suffix(['d', 'm', 'y'])
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));

    if valid {
        Ok(duration)
    } else {
        Err(Error::usage(format!(
            "invalid duration {duration:?}, expected a number followed by d, m or y"
        )))
    }
}
