//! Provider-neutral view of a fully fetched remote message

/// Guard against malformed or absurdly deep multipart trees
pub const MAX_MIME_DEPTH: usize = 64;

/// Email header (name-value pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One node of a MIME part tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimePart {
    pub mime_type: Option<String>,
    pub filename: Option<String>,
    /// Reference to a separately stored attachment body
    pub attachment_id: Option<String>,
    pub parts: Vec<MimePart>,
}

impl MimePart {
    /// True when this node itself is an attachment leaf
    fn is_attachment(&self) -> bool {
        self.filename.as_deref().is_some_and(|f| !f.is_empty()) && self.attachment_id.is_some()
    }

    /// Depth-first search for any attachment in this tree
    ///
    /// Parts nested deeper than [`MAX_MIME_DEPTH`] are not visited.
    pub fn has_attachment(&self) -> bool {
        let mut stack = vec![(self, 0usize)];

        while let Some((part, depth)) = stack.pop() {
            if part.is_attachment() {
                return true;
            }
            if depth < MAX_MIME_DEPTH {
                stack.extend(part.parts.iter().rev().map(|child| (child, depth + 1)));
            }
        }

        false
    }
}

/// A message as returned by a full fetch from the remote source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullMessage {
    pub id: String,
    pub headers: Vec<Header>,
    pub payload: Option<MimePart>,
    pub snippet: String,
}

impl FullMessage {
    /// Case-insensitive header lookup (first match wins)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn has_attachment(&self) -> bool {
        self.payload.as_ref().is_some_and(MimePart::has_attachment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(filename: Option<&str>, attachment_id: Option<&str>) -> MimePart {
        MimePart {
            mime_type: Some("application/pdf".to_string()),
            filename: filename.map(str::to_string),
            attachment_id: attachment_id.map(str::to_string),
            parts: Vec::new(),
        }
    }

    fn multipart(parts: Vec<MimePart>) -> MimePart {
        MimePart {
            mime_type: Some("multipart/mixed".to_string()),
            parts,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_payload_has_no_attachment() {
        let msg = FullMessage::default();
        assert!(!msg.has_attachment());
    }

    #[test]
    fn test_nested_attachment_found() {
        let tree = multipart(vec![
            leaf(None, None),
            multipart(vec![leaf(Some(""), Some("a0")), leaf(Some("invoice.pdf"), Some("a1"))]),
        ]);
        assert!(tree.has_attachment());
    }

    #[test]
    fn test_filename_without_body_reference_is_not_attachment() {
        let tree = multipart(vec![leaf(Some("inline.png"), None), leaf(None, Some("a1"))]);
        assert!(!tree.has_attachment());
    }

    #[test]
    fn test_depth_bound() {
        let mut deep = leaf(Some("deep.zip"), Some("a1"));
        for _ in 0..(MAX_MIME_DEPTH + 5) {
            deep = multipart(vec![deep]);
        }
        assert!(!deep.has_attachment());

        let mut shallow = leaf(Some("ok.zip"), Some("a1"));
        for _ in 0..MAX_MIME_DEPTH {
            shallow = multipart(vec![shallow]);
        }
        assert!(shallow.has_attachment());
    }

    #[test]
    fn test_header_case_insensitive() {
        let msg = FullMessage {
            headers: vec![Header::new("SUBJECT", "Hi"), Header::new("Subject", "Second")],
            ..Default::default()
        };
        assert_eq!(msg.header("subject"), Some("Hi"));
        assert_eq!(msg.header("From"), None);
    }
}
