//! Mutating actions
//!
//! Deletion against the remote mailbox, mirrored into local storage only
//! once the remote confirms it.

mod handler;

pub use handler::{ActionHandler, BatchOutcome, BatchReport, DEFAULT_BATCH_SIZE, DeletionResult};
