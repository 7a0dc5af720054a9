//! Ingestion engine
//!
//! Pulls a date window from the remote mailbox and mirrors message
//! metadata into the store. Runs are idempotent and resumable: each page
//! is committed before the next is listed.

mod record;
mod window;

pub use record::build_record;
pub use window::{
    IngestOptions, IngestStats, IngestWindow, MAX_PAGE_SIZE, SkippedFetch, ingest_query,
    ingest_window,
};
