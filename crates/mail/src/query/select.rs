//! Selection of the working set for a deletion run

use std::path::Path;

use log::{debug, info};

use super::MessageFilter;
use crate::error::{Error, Result};
use crate::models::MessageRecord;
use crate::storage::MessageStore;

/// Read a line-delimited address file
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
pub fn read_address_file(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::AddressFile {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Select the non-deleted, non-retained records matching the filters
///
/// Sender filters are merged with the addresses read from `sender_file`.
/// Blank filters are dropped. At least one sender or subject filter must
/// remain, otherwise this fails with [`Error::Usage`] and the store is not
/// read. Already-deleted records are never selected.
pub fn select(
    store: &dyn MessageStore,
    sender_filters: &[String],
    sender_file: Option<&Path>,
    subject_filters: &[String],
) -> Result<Vec<MessageRecord>> {
    let mut senders = non_blank(sender_filters);
    if let Some(path) = sender_file {
        let from_file = read_address_file(path)?;
        debug!("Read {} addresses from {}", from_file.len(), path.display());
        for addr in from_file {
            if !senders.contains(&addr) {
                senders.push(addr);
            }
        }
    }
    let subjects = non_blank(subject_filters);

    let filter = MessageFilter::new()
        .senders(senders)
        .subjects(subjects)
        .include_deleted(false);

    if filter.is_unconstrained() {
        return Err(Error::usage(
            "at least one sender or subject filter is required",
        ));
    }

    let records = store.query_messages(&filter)?;
    info!(
        "Selected {} messages ({} sender filters, {} subject filters)",
        records.len(),
        filter.senders.len(),
        filter.subjects.len()
    );
    Ok(records)
}

fn non_blank(filters: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(filters.len());
    for filter in filters {
        if !filter.trim().is_empty() && !out.contains(filter) {
            out.push(filter.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;
    use crate::storage::InMemoryMessageStore;
    use std::io::Write;

    fn store() -> InMemoryMessageStore {
        let store = InMemoryMessageStore::new();
        for (id, from, subject) in [
            ("1", "a@x.com", "Foo"),
            ("2", "a@x.com", "Bar"),
            ("3", "b@x.com", "Foo"),
            ("4", "b@x.com", "Bar"),
        ] {
            store
                .upsert_message(
                    MessageRecord::builder(MessageId::new(id))
                        .from_addr(from)
                        .subject(subject)
                        .build(),
                )
                .unwrap();
        }
        store
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_predicate_is_usage_error() {
        let store = store();
        let err = select(&store, &[], None, &[]).unwrap_err();
        assert!(err.is_usage());

        let err = select(&store, &strings(&["  "]), None, &strings(&[""])).unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_intersection_across_fields() {
        let store = store();
        let records = select(&store, &strings(&["a"]), None, &strings(&["Bar"])).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.remote_id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[test]
    fn test_deleted_never_selected() {
        let store = store();
        store.mark_deleted(&[MessageId::new("1")]).unwrap();

        let records = select(&store, &strings(&["a@x.com"]), None, &[]).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.remote_id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[test]
    fn test_sender_file_merges_with_flags() {
        let store = store();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("senders.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "# newsletters").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  b@x.com  ").unwrap();
        drop(file);

        assert_eq!(read_address_file(&path).unwrap(), strings(&["b@x.com"]));

        let records = select(&store, &[], Some(&path), &strings(&["Foo"])).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.remote_id.as_str()).collect();
        assert_eq!(ids, vec!["3"]);

        let records = select(&store, &strings(&["a@"]), Some(&path), &[]).unwrap();
        assert_eq!(records.len(), 4);
    }

    #[test]
    fn test_missing_address_file() {
        let store = store();
        let err = select(&store, &[], Some(Path::new("/nonexistent/senders.txt")), &[])
            .unwrap_err();
        assert!(matches!(err, Error::AddressFile { .. }));
    }

    #[test]
    fn test_empty_address_file_alone_is_usage_error() {
        let store = store();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "# nothing here\n\n").unwrap();

        let err = select(&store, &[], Some(&path), &[]).unwrap_err();
        assert!(err.is_usage());
    }
}
