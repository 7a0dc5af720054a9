//! Gmail API response normalization
//!
//! Converts Gmail API responses to the provider-neutral [`FullMessage`].

use super::api::{GmailMessage, MessagePart};
use crate::models::{FullMessage, Header, MimePart};

/// Normalize a Gmail API message
///
/// Headers come from the top-level payload. Absent `payload`, `parts`,
/// `headers` or `body` fields are treated as empty.
pub fn normalize_message(gmail_msg: GmailMessage) -> FullMessage {
    let headers = gmail_msg
        .payload
        .as_ref()
        .and_then(|p| p.headers.as_ref())
        .map(|headers| {
            headers
                .iter()
                .map(|h| Header::new(&h.name, &h.value))
                .collect()
        })
        .unwrap_or_default();

    FullMessage {
        id: gmail_msg.id,
        headers,
        payload: gmail_msg.payload.map(normalize_part),
        snippet: gmail_msg.snippet,
    }
}

fn normalize_part(part: MessagePart) -> MimePart {
    MimePart {
        mime_type: part.mime_type,
        filename: part.filename.filter(|f| !f.is_empty()),
        attachment_id: part.body.and_then(|b| b.attachment_id),
        parts: part
            .parts
            .unwrap_or_default()
            .into_iter()
            .map(normalize_part)
            .collect(),
    }
}
