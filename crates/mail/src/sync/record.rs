//! Conversion of fetched remote messages into stored records

use crate::models::{FullMessage, MessageId, MessageRecord};

/// Build the record to upsert for a fully fetched message
///
/// Header lookups are case-insensitive. A missing Subject gets the
/// placeholder; missing From/To become empty strings.
pub fn build_record(message: &FullMessage) -> MessageRecord {
    let mut builder = MessageRecord::builder(MessageId::new(&message.id))
        .transport_id(message.header("Message-ID").map(str::to_string))
        .from_addr(message.header("From").unwrap_or_default())
        .to_addr(message.header("To").unwrap_or_default())
        .has_attachment(message.has_attachment());

    if let Some(subject) = message.header("Subject") {
        builder = builder.subject(subject);
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Header, MimePart, NO_SUBJECT};

    #[test]
    fn test_build_record() {
        let message = FullMessage {
            id: "18c2f".to_string(),
            headers: vec![
                Header::new("Message-Id", "<abc@mail.example>"),
                Header::new("From", "Shop <news@shop.example>"),
                Header::new("To", "me@example.com"),
                Header::new("Subject", "Deals"),
            ],
            payload: Some(MimePart {
                parts: vec![MimePart {
                    filename: Some("deals.pdf".to_string()),
                    attachment_id: Some("att-1".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            snippet: String::new(),
        };

        let record = build_record(&message);
        assert_eq!(record.remote_id.as_str(), "18c2f");
        assert_eq!(record.transport_id.as_deref(), Some("<abc@mail.example>"));
        assert_eq!(record.from_addr, "Shop <news@shop.example>");
        assert_eq!(record.to_addr, "me@example.com");
        assert_eq!(record.subject, "Deals");
        assert!(record.has_attachment);
        assert!(!record.is_deleted);
    }

    #[test]
    fn test_missing_headers() {
        let message = FullMessage {
            id: "m1".to_string(),
            ..Default::default()
        };

        let record = build_record(&message);
        assert_eq!(record.subject, NO_SUBJECT);
        assert_eq!(record.from_addr, "");
        assert_eq!(record.to_addr, "");
        assert_eq!(record.transport_id, None);
        assert!(!record.has_attachment);
    }
}
