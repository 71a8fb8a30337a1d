//! Record store for santasheet.
//!
//! [`RecordStore`] is the contract every consumer talks to: create, update,
//! paginated list, and a live subscription that yields the complete current
//! set of sheets after every change. [`SqliteStore`] implements it on top of
//! `SQLite`.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::sheet::{NewSheet, SheetFields, SheetRecord};

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Sheets on this page, in insertion order.
    pub items: Vec<SheetRecord>,
    /// Token for the following page; `None` on the last page.
    pub next_token: Option<String>,
}

/// Access to the sheet collection.
///
/// Errors carry a human-readable message and are never retried here;
/// callers catch them and show the message.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Create a sheet. The store assigns `id` (unless one is supplied)
    /// and `updatedAt`.
    async fn create(&self, sheet: NewSheet) -> Result<SheetRecord>;

    /// Overwrite every field of an existing sheet. Last write wins.
    async fn update(&self, id: &str, fields: SheetFields) -> Result<SheetRecord>;

    /// Fetch up to `page_size` sheets following `page_token`.
    async fn list(&self, page_token: Option<&str>, page_size: u32) -> Result<Page>;

    /// Subscribe to whole-collection snapshots.
    fn subscribe(&self) -> Subscription;
}

/// A live view of the whole sheet collection.
///
/// The first call to [`Subscription::next`] yields the current snapshot;
/// later calls wait for the next change. Every snapshot is the complete
/// set, so consumers replace their list rather than merging. Dropping the
/// subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: watch::Receiver<Vec<SheetRecord>>,
    primed: bool,
}

impl Subscription {
    fn new(rx: watch::Receiver<Vec<SheetRecord>>) -> Self {
        Self { rx, primed: false }
    }

    /// Wait for the next snapshot. Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Vec<SheetRecord>> {
        if self.primed {
            self.rx.changed().await.ok()?;
        }
        self.primed = true;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Take a snapshot without waiting, if one is pending.
    pub fn try_next(&mut self) -> Option<Vec<SheetRecord>> {
        if self.primed && !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        self.primed = true;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Stop receiving snapshots.
    pub fn unsubscribe(self) {}
}

/// Read every sheet by following page tokens until the last page.
///
/// Nothing is returned until all pages have been fetched.
///
/// # Errors
///
/// Returns the first error raised by the store; partial results are dropped.
pub async fn collect_all(store: &dyn RecordStore, page_size: u32) -> Result<Vec<SheetRecord>> {
    let mut items = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = store.list(token.as_deref(), page_size).await?;
        debug!("Fetched page of {} sheets", page.items.len());
        items.extend(page.items);
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(items)
}

/// `SQLite`-backed sheet store.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
    /// Latest full snapshot, pushed after every write.
    snapshots: watch::Sender<Vec<SheetRecord>>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::from_connection(path, conn)?;
        info!("Database opened successfully at {}", store.path.display());
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(PathBuf::from(":memory:"), conn)
    }

    fn from_connection(path: PathBuf, conn: Connection) -> Result<Self> {
        migrations::initialize_schema(&conn)?;
        let (snapshots, _) = watch::channel(Vec::new());
        let store = Self {
            path,
            conn: Mutex::new(conn),
            snapshots,
        };
        store.publish()?;
        Ok(store)
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Insert a sheet, keeping a supplied id or generating a UUID.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is already taken or the write fails.
    pub fn insert(&self, sheet: &NewSheet) -> Result<SheetRecord> {
        let id = sheet
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now();
        let fields = serde_json::to_string(&sheet.fields)?;

        self.lock()?.execute(
            r"
            INSERT INTO sheets (id, fields, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ",
            params![id, fields, now.to_rfc3339()],
        )?;
        debug!("Inserted sheet {}", id);
        self.notify();

        Ok(SheetRecord {
            id,
            fields: sheet.fields.clone(),
            updated_at: Some(now),
        })
    }

    /// Overwrite every field of the sheet with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such sheet exists, or an error if
    /// the write fails.
    pub fn overwrite(&self, id: &str, fields: &SheetFields) -> Result<SheetRecord> {
        let now = Utc::now();
        let json = serde_json::to_string(fields)?;

        let affected = self.lock()?.execute(
            "UPDATE sheets SET fields = ?1, updated_at = ?2 WHERE id = ?3",
            params![json, now.to_rfc3339(), id],
        )?;
        if affected == 0 {
            return Err(Error::not_found(id));
        }
        debug!("Updated sheet {}", id);
        self.notify();

        Ok(SheetRecord {
            id: id.to_string(),
            fields: fields.clone(),
            updated_at: Some(now),
        })
    }

    /// Fetch one page in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed token or a failed query.
    pub fn page(&self, page_token: Option<&str>, page_size: u32) -> Result<Page> {
        let after: i64 = match page_token {
            None => 0,
            Some(token) => token.parse().map_err(|_| Error::InvalidPageToken {
                token: token.to_string(),
            })?,
        };
        let page_size = page_size.max(1);
        let page_len = usize::try_from(page_size).unwrap_or(usize::MAX);

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r"
            SELECT seq, id, fields, updated_at FROM sheets
            WHERE seq > ?1 ORDER BY seq LIMIT ?2
            ",
        )?;
        // One extra row tells us whether another page exists.
        let mut rows = stmt
            .query_map(params![after, i64::from(page_size) + 1], |row| {
                Ok((row.get::<_, i64>("seq")?, Self::row_to_record(row)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let next_token = if rows.len() > page_len {
            rows.truncate(page_len);
            rows.last().map(|(seq, _)| seq.to_string())
        } else {
            None
        };

        Ok(Page {
            items: rows.into_iter().map(|(_, record)| record).collect(),
            next_token,
        })
    }

    /// Get a sheet by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: &str) -> Result<Option<SheetRecord>> {
        let record = self
            .lock()?
            .query_row(
                "SELECT id, fields, updated_at FROM sheets WHERE id = ?1",
                [id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Every sheet in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn all(&self) -> Result<Vec<SheetRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, fields, updated_at FROM sheets ORDER BY seq")?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Count stored sheets.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM sheets", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Push the current full collection to subscribers.
    fn publish(&self) -> Result<()> {
        let all = self.all()?;
        self.snapshots.send_replace(all);
        Ok(())
    }

    /// Publish after a committed write. The write already succeeded, so a
    /// failed refresh is logged rather than returned.
    fn notify(&self) {
        if let Err(e) = self.publish() {
            warn!("Failed to refresh sheet subscribers: {}", e);
        }
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<SheetRecord> {
        let id: String = row.get("id")?;
        let fields_json: String = row.get("fields")?;
        let updated_at: String = row.get("updated_at")?;

        let fields = serde_json::from_str(&fields_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));

        Ok(SheetRecord {
            id,
            fields,
            updated_at,
        })
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn create(&self, sheet: NewSheet) -> Result<SheetRecord> {
        self.insert(&sheet)
    }

    async fn update(&self, id: &str, fields: SheetFields) -> Result<SheetRecord> {
        self.overwrite(id, &fields)
    }

    async fn list(&self, page_token: Option<&str>, page_size: u32) -> Result<Page> {
        self.page(page_token, page_size)
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.snapshots.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("failed to create test store")
    }

    fn named(name: &str) -> NewSheet {
        NewSheet::new(SheetFields::seeded(name, 2024))
    }

    #[test]
    fn test_insert_assigns_unique_ids() {
        let store = create_test_store();
        let a = store.insert(&named("Ada")).unwrap();
        let b = store.insert(&named("Bob")).unwrap();

        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
        assert!(a.updated_at.is_some());
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_insert_preserves_supplied_id() {
        let store = create_test_store();
        let record = store
            .insert(&NewSheet::with_id("legacy-7", SheetFields::seeded("Cy", 2023)))
            .unwrap();
        assert_eq!(record.id, "legacy-7");
        assert_eq!(store.get("legacy-7").unwrap().unwrap().fields.display_name, "Cy");
    }

    #[test]
    fn test_insert_blank_id_is_generated() {
        let store = create_test_store();
        let record = store
            .insert(&NewSheet::with_id("  ", SheetFields::default()))
            .unwrap();
        assert!(Uuid::parse_str(&record.id).is_ok());
    }

    #[test]
    fn test_insert_duplicate_id_fails() {
        let store = create_test_store();
        store
            .insert(&NewSheet::with_id("dup", SheetFields::default()))
            .unwrap();
        let err = store
            .insert(&NewSheet::with_id("dup", SheetFields::default()))
            .unwrap_err();
        assert!(matches!(err, Error::DatabaseQuery(_)));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_overwrite_replaces_all_fields() {
        let store = create_test_store();
        let mut fields = SheetFields::seeded("Ada", 2024);
        fields.favorite_scents = vec!["Pine".to_string()];
        let created = store.insert(&NewSheet::new(fields)).unwrap();

        let replacement = SheetFields::seeded("Ada L.", 2025);
        let updated = store.overwrite(&created.id, &replacement).unwrap();
        assert_eq!(updated.id, created.id);

        let stored = store.get(&created.id).unwrap().unwrap();
        assert_eq!(stored.fields, replacement);
        assert!(stored.fields.favorite_scents.is_empty());
        assert!(stored.updated_at >= created.updated_at);
    }

    #[test]
    fn test_overwrite_unknown_id() {
        let store = create_test_store();
        let err = store
            .overwrite("missing", &SheetFields::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_page_walks_in_insertion_order() {
        let store = create_test_store();
        for name in ["A", "B", "C"] {
            store.insert(&named(name)).unwrap();
        }

        let first = store.page(None, 2).unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].fields.display_name, "A");
        let token = first.next_token.expect("second page expected");

        let second = store.page(Some(&token), 2).unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].fields.display_name, "C");
        assert!(second.next_token.is_none());
    }

    #[test]
    fn test_page_exact_fit_has_no_token() {
        let store = create_test_store();
        store.insert(&named("A")).unwrap();
        store.insert(&named("B")).unwrap();

        let page = store.page(None, 2).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.next_token.is_none());
    }

    #[test]
    fn test_page_bad_token() {
        let store = create_test_store();
        let err = store.page(Some("not-a-token"), 10).unwrap_err();
        assert!(matches!(err, Error::InvalidPageToken { .. }));
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_collect_all_follows_tokens() {
        let store = create_test_store();
        for i in 0..7 {
            store.insert(&named(&format!("Sheet {i}"))).unwrap();
        }

        let all = collect_all(&store, 3).await.unwrap();
        assert_eq!(all.len(), 7);
        assert_eq!(all[6].fields.display_name, "Sheet 6");
    }

    #[tokio::test]
    async fn test_subscription_yields_initial_then_changes() {
        let store = create_test_store();
        let mut sub = store.subscribe();

        let initial = sub.next().await.unwrap();
        assert!(initial.is_empty());
        assert!(sub.try_next().is_none());

        store.create(named("Ada")).await.unwrap();
        let after_create = sub.next().await.unwrap();
        assert_eq!(after_create.len(), 1);

        let id = after_create[0].id.clone();
        store
            .update(&id, SheetFields::seeded("Ada L.", 2024))
            .await
            .unwrap();
        let after_update = sub.try_next().unwrap();
        assert_eq!(after_update.len(), 1);
        assert_eq!(after_update[0].fields.display_name, "Ada L.");
    }

    #[tokio::test]
    async fn test_subscription_ends_with_store() {
        let store = create_test_store();
        let mut sub = store.subscribe();
        assert!(sub.next().await.is_some());

        drop(store);
        assert!(sub.next().await.is_none());
    }

    #[test]
    fn test_open_file_based_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("sheets.db");

        let id = {
            let store = SqliteStore::open(&db_path).unwrap();
            assert_eq!(store.path(), db_path);
            store.insert(&named("Persisted")).unwrap().id
        };

        let reopened = SqliteStore::open(&db_path).unwrap();
        let record = reopened.get(&id).unwrap().unwrap();
        assert_eq!(record.fields.display_name, "Persisted");
    }

    #[test]
    fn test_unicode_content() {
        let store = create_test_store();
        let mut fields = SheetFields::seeded("Zoë", 2024);
        fields.favorite_candy_snack = vec!["Turrón".to_string(), "抹茶 KitKat".to_string()];
        let record = store.insert(&NewSheet::new(fields.clone())).unwrap();

        assert_eq!(store.get(&record.id).unwrap().unwrap().fields, fields);
    }
}
