//! SQLite-based message store

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use rusqlite_migration::{M, Migrations};

use super::traits::MessageStore;
use crate::error::{StorageError, StorageResult};
use crate::models::{IngestCheckpoint, MessageId, MessageRecord, SenderSummary};
use crate::query::MessageFilter;

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- Mirrored message metadata, keyed by remote message ID
            CREATE TABLE messages (
                remote_id TEXT PRIMARY KEY,
                transport_id TEXT,
                from_addr TEXT NOT NULL,
                to_addr TEXT NOT NULL,
                subject TEXT NOT NULL,
                has_attachment INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_messages_from_addr ON messages(from_addr);

            -- Senders exempt from selection and deletion (exact match)
            CREATE TABLE retain (
                from_addr TEXT PRIMARY KEY
            );
            "#,
        ),
        // Migration 2: Resumable ingestion
        M::up(
            r#"
            CREATE TABLE ingest_checkpoints (
                query TEXT PRIMARY KEY,
                next_page_token TEXT NOT NULL,
                messages_upserted INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );
            "#,
        ),
    ])
}

const RECORD_COLUMNS: &str =
    "remote_id, transport_id, from_addr, to_addr, subject, has_attachment, is_deleted";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        remote_id: MessageId::new(row.get::<_, String>(0)?),
        transport_id: row.get(1)?,
        from_addr: row.get(2)?,
        to_addr: row.get(3)?,
        subject: row.get(4)?,
        has_attachment: row.get(5)?,
        is_deleted: row.get(6)?,
    })
}

/// Build the WHERE clause and parameters for a filter
///
/// `instr()` keeps matching case-sensitive and treats `%` and `_` literally,
/// which LIKE would not.
fn filter_clause(filter: &MessageFilter) -> (String, Vec<&str>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    for (column, needles) in [("from_addr", &filter.senders), ("subject", &filter.subjects)] {
        if needles.is_empty() {
            continue;
        }
        let any = vec![format!("instr({column}, ?) > 0"); needles.len()].join(" OR ");
        clauses.push(format!("({any})"));
        params.extend(needles.iter().map(String::as_str));
    }

    clauses.push("from_addr NOT IN (SELECT from_addr FROM retain)".to_string());
    if !filter.include_deleted {
        clauses.push("is_deleted = 0".to_string());
    }

    (clauses.join(" AND "), params)
}

/// SQLite-based message store
///
/// A single connection per process; every mutating call runs in its own
/// transaction.
pub struct SqliteMessageStore {
    conn: Mutex<Connection>,
}

impl SqliteMessageStore {
    /// Open (or create) the store at `db_path` and bring the schema up to date
    pub fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            // Connection::open reports the real failure if this did not work
            let _ = std::fs::create_dir_all(parent);
        }

        let mut conn = Connection::open(db_path).map_err(|source| StorageError::Open {
            path: db_path.to_path_buf(),
            source,
        })?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;

        migrations().to_latest(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl MessageStore for SqliteMessageStore {
    fn upsert_messages(&self, records: &[MessageRecord]) -> StorageResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        {
            let mut existing_stmt =
                tx.prepare("SELECT is_deleted FROM messages WHERE remote_id = ?")?;
            // is_deleted is whatever the read above found, never the record's
            let mut upsert_stmt = tx.prepare(
                "INSERT INTO messages
                 (remote_id, transport_id, from_addr, to_addr, subject, has_attachment, is_deleted)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(remote_id) DO UPDATE SET
                    transport_id = excluded.transport_id,
                    from_addr = excluded.from_addr,
                    to_addr = excluded.to_addr,
                    subject = excluded.subject,
                    has_attachment = excluded.has_attachment,
                    is_deleted = excluded.is_deleted",
            )?;

            for record in records {
                let is_deleted: bool = existing_stmt
                    .query_row([record.remote_id.as_str()], |row| row.get(0))
                    .optional()?
                    .unwrap_or(false);

                upsert_stmt.execute(params![
                    record.remote_id.as_str(),
                    record.transport_id,
                    record.from_addr,
                    record.to_addr,
                    record.subject,
                    record.has_attachment,
                    is_deleted,
                ])?;
            }
        }

        tx.commit()?;
        Ok(records.len())
    }

    fn get_message(&self, id: &MessageId) -> StorageResult<Option<MessageRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM messages WHERE remote_id = ?"),
                [id.as_str()],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn count_messages(&self) -> StorageResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn query_messages(&self, filter: &MessageFilter) -> StorageResult<Vec<MessageRecord>> {
        let (clause, params) = filter_clause(filter);
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM messages
             WHERE {clause}
             ORDER BY from_addr, subject, remote_id"
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(params), record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn mark_deleted(&self, ids: &[MessageId]) -> StorageResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut changed = 0;

        {
            let mut stmt = tx
                .prepare("UPDATE messages SET is_deleted = 1 WHERE remote_id = ? AND is_deleted = 0")?;
            for id in ids {
                changed += stmt.execute([id.as_str()])?;
            }
        }

        tx.commit()?;
        Ok(changed)
    }

    fn list_retained(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT from_addr FROM retain ORDER BY from_addr")?;
        let addrs = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(addrs)
    }

    fn add_retained(&self, addr: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute("INSERT OR IGNORE INTO retain (from_addr) VALUES (?)", [addr])?;
        Ok(inserted > 0)
    }

    fn remove_retained(&self, addr: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM retain WHERE from_addr = ?", [addr])?;
        Ok(removed > 0)
    }

    fn summarize(&self, include_deleted: bool) -> StorageResult<Vec<SenderSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT from_addr, COUNT(*) AS total, COALESCE(SUM(has_attachment), 0)
             FROM messages
             WHERE from_addr NOT IN (SELECT from_addr FROM retain)
               AND (?1 OR is_deleted = 0)
             GROUP BY from_addr
             ORDER BY total DESC, from_addr ASC",
        )?;

        let rows = stmt
            .query_map([include_deleted], |row| {
                Ok(SenderSummary {
                    from_addr: row.get(0)?,
                    total: row.get::<_, i64>(1)? as usize,
                    with_attachment: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn get_checkpoint(&self, query: &str) -> StorageResult<Option<IngestCheckpoint>> {
        let conn = self.conn()?;

        let row: Option<(String, String, i64, String)> = conn
            .query_row(
                "SELECT query, next_page_token, messages_upserted, updated_at
                 FROM ingest_checkpoints WHERE query = ?",
                [query],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((query, next_page_token, messages_upserted, updated_at_str)) = row else {
            return Ok(None);
        };

        let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now());

        Ok(Some(IngestCheckpoint {
            query,
            next_page_token,
            messages_upserted: messages_upserted as usize,
            updated_at,
        }))
    }

    fn save_checkpoint(&self, checkpoint: &IngestCheckpoint) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO ingest_checkpoints (query, next_page_token, messages_upserted, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(query) DO UPDATE SET
                next_page_token = excluded.next_page_token,
                messages_upserted = excluded.messages_upserted,
                updated_at = excluded.updated_at",
            params![
                checkpoint.query,
                checkpoint.next_page_token,
                checkpoint.messages_upserted as i64,
                checkpoint.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn clear_checkpoint(&self, query: &str) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM ingest_checkpoints WHERE query = ?", [query])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteMessageStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        // Use .test.sqlite extension to clearly distinguish from production databases
        let db_path = dir.path().join("gclean.test.sqlite");
        let store = SqliteMessageStore::new(&db_path).unwrap();
        (store, dir)
    }

    fn make_record(id: &str, from: &str, subject: &str, has_attachment: bool) -> MessageRecord {
        MessageRecord::builder(MessageId::new(id))
            .transport_id(Some(format!("<{id}@mail.example>")))
            .from_addr(from)
            .to_addr("me@example.com")
            .subject(subject)
            .has_attachment(has_attachment)
            .build()
    }

    #[test]
    fn test_message_crud() {
        let (store, _dir) = create_test_store();

        store
            .upsert_message(make_record("m1", "a@x.com", "Hello", true))
            .unwrap();

        let msg = store.get_message(&MessageId::new("m1")).unwrap().unwrap();
        assert_eq!(msg.from_addr, "a@x.com");
        assert_eq!(msg.transport_id.as_deref(), Some("<m1@mail.example>"));
        assert!(msg.has_attachment);
        assert!(!msg.is_deleted);

        assert!(store.get_message(&MessageId::new("m2")).unwrap().is_none());
        assert_eq!(store.count_messages().unwrap(), 1);
    }

    #[test]
    fn test_upsert_preserves_soft_delete() {
        let (store, _dir) = create_test_store();

        store
            .upsert_message(make_record("m1", "a@x.com", "First", false))
            .unwrap();
        store.mark_deleted(&[MessageId::new("m1")]).unwrap();

        store
            .upsert_message(make_record("m1", "a@x.com", "Refreshed", true))
            .unwrap();

        let msg = store.get_message(&MessageId::new("m1")).unwrap().unwrap();
        assert!(msg.is_deleted);
        assert_eq!(msg.subject, "Refreshed");
        assert!(msg.has_attachment);
        assert_eq!(store.count_messages().unwrap(), 1);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let (store, _dir) = create_test_store();
        let page = vec![
            make_record("m1", "a@x.com", "One", false),
            make_record("m2", "b@x.com", "Two", false),
        ];

        assert_eq!(store.upsert_messages(&page).unwrap(), 2);
        assert_eq!(store.upsert_messages(&page).unwrap(), 2);
        assert_eq!(store.count_messages().unwrap(), 2);
    }

    #[test]
    fn test_query_filters() {
        let (store, _dir) = create_test_store();
        store
            .upsert_messages(&[
                make_record("m1", "a@x.com", "Foo", false),
                make_record("m2", "a@x.com", "Bar", false),
                make_record("m3", "b@x.com", "Foo", false),
                make_record("m4", "b@x.com", "Bar", false),
            ])
            .unwrap();

        let filter = MessageFilter::new().senders(["a"]).subjects(["Bar"]);
        let rows = store.query_messages(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].remote_id.as_str(), "m2");

        let filter = MessageFilter::new().subjects(["Foo", "Bar"]);
        assert_eq!(store.query_messages(&filter).unwrap().len(), 4);

        let all = store.query_messages(&MessageFilter::new()).unwrap();
        let ids: Vec<&str> = all.iter().map(|m| m.remote_id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m1", "m4", "m3"]);
    }

    #[test]
    fn test_query_is_case_sensitive_and_literal() {
        let (store, _dir) = create_test_store();
        store
            .upsert_messages(&[
                make_record("m1", "a@x.com", "Invoice 100%", false),
                make_record("m2", "a@x.com", "invoice_2", false),
            ])
            .unwrap();

        let rows = store
            .query_messages(&MessageFilter::new().subjects(["Invoice"]))
            .unwrap();
        assert_eq!(rows.len(), 1);

        let rows = store
            .query_messages(&MessageFilter::new().subjects(["%"]))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].remote_id.as_str(), "m1");

        let rows = store
            .query_messages(&MessageFilter::new().subjects(["e_2"]))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].remote_id.as_str(), "m2");
    }

    #[test]
    fn test_query_excludes_deleted_and_retained() {
        let (store, _dir) = create_test_store();
        store
            .upsert_messages(&[
                make_record("m1", "a@x.com", "Hi", false),
                make_record("m2", "sub.a@x.com", "Hi", false),
                make_record("m3", "c@x.com", "Hi", false),
            ])
            .unwrap();
        store.add_retained("a@x.com").unwrap();
        store.mark_deleted(&[MessageId::new("m3")]).unwrap();

        let rows = store
            .query_messages(&MessageFilter::new().subjects(["Hi"]))
            .unwrap();
        let ids: Vec<&str> = rows.iter().map(|m| m.remote_id.as_str()).collect();
        assert_eq!(ids, vec!["m2"]);

        let rows = store
            .query_messages(&MessageFilter::new().subjects(["Hi"]).include_deleted(true))
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_mark_deleted_counts_changes() {
        let (store, _dir) = create_test_store();
        store
            .upsert_message(make_record("m1", "a@x.com", "Hi", false))
            .unwrap();

        let ids = vec![MessageId::new("m1"), MessageId::new("missing")];
        assert_eq!(store.mark_deleted(&ids).unwrap(), 1);
        assert_eq!(store.mark_deleted(&ids).unwrap(), 0);
    }

    #[test]
    fn test_retained() {
        let (store, _dir) = create_test_store();

        assert!(store.add_retained("z@x.com").unwrap());
        assert!(!store.add_retained("z@x.com").unwrap());
        assert!(store.add_retained("a@x.com").unwrap());
        assert_eq!(store.list_retained().unwrap(), vec!["a@x.com", "z@x.com"]);

        assert!(store.remove_retained("z@x.com").unwrap());
        assert!(!store.remove_retained("never@x.com").unwrap());
        assert_eq!(store.list_retained().unwrap(), vec!["a@x.com"]);
    }

    #[test]
    fn test_summarize() {
        let (store, _dir) = create_test_store();

        let mut records = Vec::new();
        for (sender, count, attachments) in [("five@x.com", 5, 2), ("two@x.com", 2, 0), ("nine@x.com", 9, 9)] {
            for i in 0..count {
                records.push(make_record(
                    &format!("{sender}-{i}"),
                    sender,
                    "Subject",
                    i < attachments,
                ));
            }
        }
        store.upsert_messages(&records).unwrap();

        let summary = store.summarize(false).unwrap();
        let totals: Vec<(&str, usize, usize)> = summary
            .iter()
            .map(|s| (s.from_addr.as_str(), s.total, s.with_attachment))
            .collect();
        assert_eq!(
            totals,
            vec![("nine@x.com", 9, 9), ("five@x.com", 5, 2), ("two@x.com", 2, 0)]
        );

        store.add_retained("nine@x.com").unwrap();
        store
            .mark_deleted(&[MessageId::new("five@x.com-0"), MessageId::new("five@x.com-1")])
            .unwrap();

        let summary = store.summarize(false).unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].from_addr, "five@x.com");
        assert_eq!(summary[0].total, 3);

        let summary = store.summarize(true).unwrap();
        assert_eq!(summary[0].total, 5);
    }

    #[test]
    fn test_checkpoints() {
        let (store, _dir) = create_test_store();
        assert!(store.get_checkpoint("q").unwrap().is_none());

        store.save_checkpoint(&IngestCheckpoint::new("q", "tok-1", 500)).unwrap();
        store.save_checkpoint(&IngestCheckpoint::new("q", "tok-2", 1000)).unwrap();

        let cp = store.get_checkpoint("q").unwrap().unwrap();
        assert_eq!(cp.next_page_token, "tok-2");
        assert_eq!(cp.messages_upserted, 1000);

        store.clear_checkpoint("q").unwrap();
        assert!(store.get_checkpoint("q").unwrap().is_none());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("gclean.test.sqlite");

        {
            let store = SqliteMessageStore::new(&db_path).unwrap();
            store
                .upsert_message(make_record("m1", "a@x.com", "Hi", false))
                .unwrap();
            store.mark_deleted(&[MessageId::new("m1")]).unwrap();
        }

        let store = SqliteMessageStore::new(&db_path).unwrap();
        let msg = store.get_message(&MessageId::new("m1")).unwrap().unwrap();
        assert!(msg.is_deleted);
    }
}
