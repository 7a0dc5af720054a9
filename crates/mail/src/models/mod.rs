//! Domain models for the local mailbox mirror

mod checkpoint;
mod message;
mod mime;

pub use checkpoint::{IngestCheckpoint, SenderSummary};
pub use message::{MessageId, MessageRecord, MessageRecordBuilder, NO_SUBJECT};
pub use mime::{FullMessage, Header, MAX_MIME_DEPTH, MimePart};
