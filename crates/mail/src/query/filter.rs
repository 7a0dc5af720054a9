//! Message filter predicate shared by every store backend

use std::collections::BTreeSet;

use crate::models::MessageRecord;

/// Inclusion filters for a store query
///
/// Substrings within one field are OR-combined; the sender and subject
/// fields are AND-combined. An empty list leaves that field unconstrained.
/// Matching is a case-sensitive substring test. Messages from retained
/// senders never match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    pub senders: Vec<String>,
    pub subjects: Vec<String>,
    pub include_deleted: bool,
}

impl MessageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn senders<I, S>(mut self, senders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.senders = senders.into_iter().map(Into::into).collect();
        self
    }

    pub fn subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subjects = subjects.into_iter().map(Into::into).collect();
        self
    }

    pub fn include_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }

    /// True when neither senders nor subjects constrain the query
    pub fn is_unconstrained(&self) -> bool {
        self.senders.is_empty() && self.subjects.is_empty()
    }

    /// Evaluate the filter against one record
    pub fn matches(&self, record: &MessageRecord, retained: &BTreeSet<String>) -> bool {
        any_contains(&record.from_addr, &self.senders)
            && any_contains(&record.subject, &self.subjects)
            && !retained.contains(&record.from_addr)
            && (self.include_deleted || !record.is_deleted)
    }
}

fn any_contains(value: &str, needles: &[String]) -> bool {
    needles.is_empty() || needles.iter().any(|n| value.contains(n.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;

    fn record(from: &str, subject: &str) -> MessageRecord {
        MessageRecord::builder(MessageId::new(format!("{from}/{subject}")))
            .from_addr(from)
            .subject(subject)
            .build()
    }

    #[test]
    fn test_empty_filter_matches_everything_not_deleted() {
        let filter = MessageFilter::new();
        let retained = BTreeSet::new();
        assert!(filter.is_unconstrained());
        assert!(filter.matches(&record("a@x.com", "Foo"), &retained));

        let mut deleted = record("a@x.com", "Foo");
        deleted.is_deleted = true;
        assert!(!filter.matches(&deleted, &retained));
        assert!(filter.include_deleted(true).matches(&deleted, &retained));
    }

    #[test]
    fn test_union_within_field_intersection_across() {
        let filter = MessageFilter::new().senders(["a@", "c@"]).subjects(["Bar"]);
        let retained = BTreeSet::new();

        assert!(filter.matches(&record("a@x.com", "Bar baz"), &retained));
        assert!(filter.matches(&record("c@x.com", "Bar"), &retained));
        assert!(!filter.matches(&record("a@x.com", "Foo"), &retained));
        assert!(!filter.matches(&record("b@x.com", "Bar"), &retained));
    }

    #[test]
    fn test_case_sensitive() {
        let filter = MessageFilter::new().subjects(["invoice"]);
        let retained = BTreeSet::new();
        assert!(!filter.matches(&record("a@x.com", "Invoice 42"), &retained));
    }

    #[test]
    fn test_retained_is_exact_match() {
        let filter = MessageFilter::new().senders(["x.com"]);
        let retained: BTreeSet<String> = ["a@x.com".to_string()].into();

        assert!(!filter.matches(&record("a@x.com", "Hi"), &retained));
        assert!(filter.matches(&record("sub.a@x.com", "Hi"), &retained));
    }
}
