//! Message record mirrored from the remote mailbox

use serde::{Deserialize, Serialize};

/// Placeholder stored when a message has no Subject header
pub const NO_SUBJECT: &str = "(no subject)";

/// Stable remote identifier for a message (Gmail message ID)
///
/// This is the primary key of the local mirror. The RFC 822 `Message-ID`
/// is kept separately as [`MessageRecord::transport_id`] and is not unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata for one remote message, as stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Remote message ID (primary key)
    pub remote_id: MessageId,
    /// RFC 822 Message-ID header, informational only
    pub transport_id: Option<String>,
    /// From header as received
    pub from_addr: String,
    /// To header as received
    pub to_addr: String,
    /// Subject line, [`NO_SUBJECT`] when absent
    pub subject: String,
    /// Whether any MIME part is a real attachment
    pub has_attachment: bool,
    /// Local soft-delete marker, set only after a confirmed remote delete
    pub is_deleted: bool,
}

impl MessageRecord {
    /// Create a new record builder
    pub fn builder(remote_id: MessageId) -> MessageRecordBuilder {
        MessageRecordBuilder::new(remote_id)
    }

    /// Single-line rendering used by listings and `--out` files
    pub fn display_line(&self) -> String {
        format!(
            "{} | {} | attachment={} | id={}",
            self.from_addr,
            self.subject,
            u8::from(self.has_attachment),
            self.remote_id
        )
    }
}

/// Builder for creating MessageRecord instances
pub struct MessageRecordBuilder {
    remote_id: MessageId,
    transport_id: Option<String>,
    from_addr: String,
    to_addr: String,
    subject: Option<String>,
    has_attachment: bool,
    is_deleted: bool,
}

impl MessageRecordBuilder {
    fn new(remote_id: MessageId) -> Self {
        Self {
            remote_id,
            transport_id: None,
            from_addr: String::new(),
            to_addr: String::new(),
            subject: None,
            has_attachment: false,
            is_deleted: false,
        }
    }

    pub fn transport_id(mut self, transport_id: Option<String>) -> Self {
        self.transport_id = transport_id;
        self
    }

    pub fn from_addr(mut self, from_addr: impl Into<String>) -> Self {
        self.from_addr = from_addr.into();
        self
    }

    pub fn to_addr(mut self, to_addr: impl Into<String>) -> Self {
        self.to_addr = to_addr.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn has_attachment(mut self, has_attachment: bool) -> Self {
        self.has_attachment = has_attachment;
        self
    }

    pub fn is_deleted(mut self, is_deleted: bool) -> Self {
        self.is_deleted = is_deleted;
        self
    }

    pub fn build(self) -> MessageRecord {
        MessageRecord {
            remote_id: self.remote_id,
            transport_id: self.transport_id,
            from_addr: self.from_addr,
            to_addr: self.to_addr,
            subject: self.subject.unwrap_or_else(|| NO_SUBJECT.to_string()),
            has_attachment: self.has_attachment,
            is_deleted: self.is_deleted,
        }
    }
}
