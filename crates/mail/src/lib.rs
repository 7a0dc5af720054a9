//! Mail crate - local mirror of a Gmail mailbox's message metadata
//!
//! This crate provides:
//! - Domain models (MessageRecord, FullMessage, MimePart)
//! - Record store trait with SQLite and in-memory backends
//! - Remote mailbox capabilities and a lazy, resumable page iterator
//! - Ingestion engine that mirrors a date window into the store
//! - Filter/query engine for selecting a deletion working set
//! - Batch deletion coordinator (remote first, then local)
//! - Gmail API client and OAuth authentication

pub mod actions;
pub mod config;
pub mod error;
pub mod gmail;
pub mod models;
pub mod query;
pub mod remote;
pub mod storage;
pub mod sync;

pub use actions::{ActionHandler, BatchOutcome, BatchReport, DEFAULT_BATCH_SIZE, DeletionResult};
pub use config::{GmailCredentials, Settings};
pub use error::{Error, RemoteError, Result, StorageError, StorageResult};
pub use gmail::{GmailAuth, GmailClient};
pub use models::{
    FullMessage, Header, IngestCheckpoint, MessageId, MessageRecord, MimePart, NO_SUBJECT,
    SenderSummary,
};
pub use query::{LiveSelection, MessageFilter, RemoteSearch, read_address_file, select};
pub use remote::{InMemoryMailbox, ListPage, MAX_DELETE_BATCH, Pages, RemoteSink, RemoteSource};
pub use storage::{InMemoryMessageStore, MessageStore, SqliteMessageStore};
pub use sync::{
    IngestOptions, IngestStats, IngestWindow, SkippedFetch, build_record, ingest_query,
    ingest_window,
};
