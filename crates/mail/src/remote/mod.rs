//! Remote mailbox capabilities consumed by the sync core
//!
//! The core only needs three calls from the remote side: list ids by query
//! (paginated), fetch one message in full, and delete a batch of ids.
//! [`crate::gmail::GmailClient`] implements them against the Gmail API and
//! [`InMemoryMailbox`] implements them for tests.

mod memory;

pub use memory::InMemoryMailbox;

use crate::error::RemoteError;
use crate::models::{FullMessage, MessageId};

/// Largest batch a single delete call may carry
pub const MAX_DELETE_BATCH: usize = 100;

/// One page of a remote listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub ids: Vec<MessageId>,
    /// Present when more results exist
    pub next_page_token: Option<String>,
}

/// Read side of the remote mailbox
pub trait RemoteSource {
    /// List message ids matching `query`, one page at a time
    fn list(
        &self,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<ListPage, RemoteError>;

    /// Fetch full metadata (headers and MIME tree) for one message
    fn get_full(&self, id: &MessageId) -> Result<FullMessage, RemoteError>;
}

/// Write side of the remote mailbox
pub trait RemoteSink {
    /// Permanently delete up to [`MAX_DELETE_BATCH`] messages
    fn batch_delete(&self, ids: &[MessageId]) -> Result<(), RemoteError>;
}

enum Cursor {
    Next(Option<String>),
    Done,
}

/// Lazy, pull-based iterator over the pages of a remote listing
///
/// Each continuation token is consumed exactly once, in order. The
/// iterator can be restarted from any saved token with [`Pages::resume`],
/// and stops after the first error.
pub struct Pages<'a, S: RemoteSource + ?Sized> {
    source: &'a S,
    query: String,
    page_size: usize,
    cursor: Cursor,
}

impl<'a, S: RemoteSource + ?Sized> Pages<'a, S> {
    /// Start from the first page
    pub fn new(source: &'a S, query: impl Into<String>, page_size: usize) -> Self {
        Self::resume(source, query, page_size, None)
    }

    /// Start from a saved continuation token (or the first page if None)
    pub fn resume(
        source: &'a S,
        query: impl Into<String>,
        page_size: usize,
        page_token: Option<String>,
    ) -> Self {
        Self {
            source,
            query: query.into(),
            page_size,
            cursor: Cursor::Next(page_token),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Token of the page the next call will fetch
    ///
    /// None either before the first page or once the listing is exhausted;
    /// use [`Pages::is_exhausted`] to tell them apart.
    pub fn resume_token(&self) -> Option<&str> {
        match &self.cursor {
            Cursor::Next(token) => token.as_deref(),
            Cursor::Done => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.cursor, Cursor::Done)
    }
}

impl<S: RemoteSource + ?Sized> Iterator for Pages<'_, S> {
    type Item = Result<ListPage, RemoteError>;

    fn next(&mut self) -> Option<Self::Item> {
        let Cursor::Next(token) = std::mem::replace(&mut self.cursor, Cursor::Done) else {
            return None;
        };

        match self.source.list(&self.query, self.page_size, token.as_deref()) {
            Ok(page) => {
                if let Some(next) = &page.next_page_token {
                    self.cursor = Cursor::Next(Some(next.clone()));
                }
                Some(Ok(page))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
