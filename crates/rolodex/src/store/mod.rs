//! Contact storage and live queries.
//!
//! This module provides `SQLite`-based persistent storage for contacts and
//! the reactive query surface on top of it: every mutation republishes the
//! affected query results through `tokio::sync::watch` channels before the
//! mutating call returns, so subscribers are promptly consistent with the
//! latest committed write and never observe two sequential writes out of
//! order.

pub mod migrations;
pub mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::contact::Contact;
use crate::error::{Error, Result};

/// Handle to the contact store.
///
/// Cheap to clone; all clones share one connection and one set of live
/// queries. Writes are serialized behind an async mutex (single writer at a
/// time); readers observe watch snapshots without taking that lock, so
/// multiple screens can watch the same table concurrently.
#[derive(Debug, Clone)]
pub struct ContactStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection, locked for the duration of each write and its
    /// republish so no reader can observe writes out of order.
    conn: Mutex<Connection>,
    /// Live query: all contacts, ascending by first name.
    all_tx: watch::Sender<Vec<Contact>>,
    /// Live query: favorite contacts only, same order.
    favorites_tx: watch::Sender<Vec<Contact>>,
    /// Live single-record queries, created lazily per observed id. Entries
    /// nobody is watching anymore are pruned on the next write.
    by_id: Mutex<HashMap<i64, watch::Sender<Option<Contact>>>>,
}

impl ContactStore {
    /// Open or create a contact database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist,
    /// initializes the schema on a new database, and migrates an old one
    /// forward (see [`migrations`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
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

        // WAL keeps concurrent readers off the writer's back
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Self::from_connection(path, conn)
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

        migrations::initialize_schema(&conn)?;

        Self::from_connection(PathBuf::from(":memory:"), conn)
    }

    /// Seed the live query channels from the current table contents and wrap
    /// everything into a shared handle.
    fn from_connection(path: PathBuf, conn: Connection) -> Result<Self> {
        let all = snapshot_all(&conn)?;
        let favorites = snapshot_favorites(&conn)?;

        let (all_tx, _) = watch::channel(all);
        let (favorites_tx, _) = watch::channel(favorites);

        Ok(Self {
            inner: Arc::new(StoreInner {
                path,
                conn: Mutex::new(conn),
                all_tx,
                favorites_tx,
                by_id: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Insert a contact.
    ///
    /// Returns the assigned id, or `None` if a record with the same id
    /// already exists (ignore-on-conflict: the existing record's fields are
    /// left untouched and no error is raised). A contact without an id gets
    /// a store-assigned one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn insert(&self, contact: &Contact) -> Result<Option<i64>> {
        let conn = self.inner.conn.lock().await;

        let affected = conn.execute(
            r"
            INSERT OR IGNORE INTO contacts (id, firstName, lastName, address, isFavorite)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                contact.id,
                contact.first_name,
                contact.last_name,
                contact.address,
                contact.is_favorite,
            ],
        )?;

        if affected == 0 {
            debug!(id = ?contact.id, "Insert ignored, id already present");
            return Ok(None);
        }

        let id = conn.last_insert_rowid();
        debug!(id, "Inserted contact");
        self.publish(&conn).await?;
        Ok(Some(id))
    }

    /// Replace the full record matching the given contact's id.
    ///
    /// Returns the number of affected rows; an unknown id is a benign no-op
    /// returning 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingId`] when the contact carries no id, or a
    /// database error if the operation fails.
    pub async fn update(&self, contact: &Contact) -> Result<usize> {
        let Some(id) = contact.id else {
            return Err(Error::missing_id("update"));
        };

        let conn = self.inner.conn.lock().await;
        let affected = conn.execute(
            r"
            UPDATE contacts SET firstName = ?1, lastName = ?2, address = ?3, isFavorite = ?4
            WHERE id = ?5
            ",
            params![
                contact.first_name,
                contact.last_name,
                contact.address,
                contact.is_favorite,
                id,
            ],
        )?;

        if affected == 0 {
            debug!(id, "Update matched no row");
            return Ok(0);
        }

        debug!(id, "Updated contact");
        self.publish(&conn).await?;
        Ok(affected)
    }

    /// Delete the record with the given id.
    ///
    /// Returns the number of affected rows; an unknown id is a benign no-op
    /// returning 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn delete(&self, id: i64) -> Result<usize> {
        let conn = self.inner.conn.lock().await;
        let affected = conn.execute("DELETE FROM contacts WHERE id = ?1", [id])?;

        if affected == 0 {
            debug!(id, "Delete matched no row");
            return Ok(0);
        }

        debug!(id, "Deleted contact");
        self.publish(&conn).await?;
        Ok(affected)
    }

    /// Read a single contact as a one-shot snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn get(&self, id: i64) -> Result<Option<Contact>> {
        let conn = self.inner.conn.lock().await;
        snapshot_one(&conn, id)
    }

    /// Count total contacts in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count(&self) -> Result<i64> {
        let conn = self.inner.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM contacts", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Subscribe to the live all-contacts query.
    ///
    /// The receiver holds the current result immediately and is notified on
    /// every insert, update, or delete. The stream never completes on its
    /// own.
    #[must_use]
    pub fn all_contacts(&self) -> watch::Receiver<Vec<Contact>> {
        self.inner.all_tx.subscribe()
    }

    /// Subscribe to the live favorites-only query. Same contract as
    /// [`Self::all_contacts`], restricted to records with the favorite flag
    /// set.
    #[must_use]
    pub fn favorite_contacts(&self) -> watch::Receiver<Vec<Contact>> {
        self.inner.favorites_tx.subscribe()
    }

    /// Subscribe to a live single-record query.
    ///
    /// The receiver holds `Some(record)` or `None` (absent) immediately and
    /// reissues on every change to that record, including deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if seeding the initial value fails.
    pub async fn contact(&self, id: i64) -> Result<watch::Receiver<Option<Contact>>> {
        let conn = self.inner.conn.lock().await;
        let mut by_id = self.inner.by_id.lock().await;

        if let Some(tx) = by_id.get(&id) {
            return Ok(tx.subscribe());
        }

        let current = snapshot_one(&conn, id)?;
        let (tx, rx) = watch::channel(current);
        by_id.insert(id, tx);
        Ok(rx)
    }

    /// Recompute and republish every live query. Called with the connection
    /// lock held so publishes land in write order.
    async fn publish(&self, conn: &Connection) -> Result<()> {
        let all = snapshot_all(conn)?;
        let favorites = snapshot_favorites(conn)?;

        let mut by_id = self.inner.by_id.lock().await;
        // drop single-record channels nobody watches anymore
        by_id.retain(|_, tx| tx.receiver_count() > 0);
        for (id, tx) in by_id.iter() {
            let current = all.iter().find(|c| c.id == Some(*id)).cloned();
            tx.send_replace(current);
        }
        drop(by_id);

        self.inner.all_tx.send_replace(all);
        self.inner.favorites_tx.send_replace(favorites);
        Ok(())
    }
}

/// All contacts, ascending by first name.
fn snapshot_all(conn: &Connection) -> Result<Vec<Contact>> {
    let mut stmt =
        conn.prepare("SELECT id, firstName, lastName, address, isFavorite FROM contacts ORDER BY firstName ASC")?;
    let contacts = stmt
        .query_map([], row_to_contact)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(contacts)
}

/// Favorite contacts only, same order.
fn snapshot_favorites(conn: &Connection) -> Result<Vec<Contact>> {
    let mut stmt = conn.prepare(
        "SELECT id, firstName, lastName, address, isFavorite FROM contacts WHERE isFavorite = 1 ORDER BY firstName ASC",
    )?;
    let contacts = stmt
        .query_map([], row_to_contact)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(contacts)
}

fn snapshot_one(conn: &Connection, id: i64) -> Result<Option<Contact>> {
    let result = conn
        .query_row(
            "SELECT id, firstName, lastName, address, isFavorite FROM contacts WHERE id = ?1",
            [id],
            row_to_contact,
        )
        .optional()?;
    Ok(result)
}

/// Convert a database row to a Contact struct.
fn row_to_contact(row: &rusqlite::Row) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: Some(row.get(0)?),
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        address: row.get(3)?,
        is_favorite: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> ContactStore {
        ContactStore::open_in_memory().expect("failed to create test store")
    }

    fn ann() -> Contact {
        Contact::new("Ann", "Archer", "555-1111")
    }

    fn bob() -> Contact {
        Contact::new("Bob", "Baker", "555-2222").with_favorite(true)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = create_test_store();

        let id = store.insert(&ann()).await.unwrap().unwrap();
        let retrieved = store.get(id).await.unwrap().unwrap();

        assert_eq!(retrieved.first_name, "Ann");
        assert_eq!(retrieved.address, "555-1111");
        assert!(!retrieved.is_favorite);
    }

    #[tokio::test]
    async fn test_insert_assigns_distinct_ids() {
        let store = create_test_store();

        let id1 = store.insert(&ann()).await.unwrap().unwrap();
        let id2 = store.insert(&bob()).await.unwrap().unwrap();

        assert_ne!(id1, id2);
    }

    #[tokio::test]
    async fn test_insert_existing_id_is_ignored() {
        let store = create_test_store();

        let first = store.insert(&ann().with_id(1)).await.unwrap();
        assert_eq!(first, Some(1));

        let second = store
            .insert(&Contact::new("Impostor", "Nobody", "000-0000").with_id(1))
            .await
            .unwrap();
        assert_eq!(second, None);

        // the existing record's fields are unchanged
        let stored = store.get(1).await.unwrap().unwrap();
        assert_eq!(stored.first_name, "Ann");
        assert_eq!(stored.address, "555-1111");
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let store = create_test_store();
        assert!(store.get(99999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_full_record() {
        let store = create_test_store();
        let id = store.insert(&ann()).await.unwrap().unwrap();

        let edited = Contact::new("Anne", "Archer", "555-9999").with_id(id);
        let affected = store.update(&edited).await.unwrap();
        assert_eq!(affected, 1);

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.first_name, "Anne");
        assert_eq!(stored.address, "555-9999");
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_noop() {
        let store = create_test_store();
        let affected = store.update(&ann().with_id(42)).await.unwrap();
        assert_eq!(affected, 0);
    }

    #[tokio::test]
    async fn test_update_without_id_is_an_error() {
        let store = create_test_store();
        let err = store.update(&ann()).await.unwrap_err();
        assert!(err.is_missing_id());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = create_test_store();
        let id = store.insert(&ann()).await.unwrap().unwrap();

        assert_eq!(store.delete(id).await.unwrap(), 1);
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_noop() {
        let store = create_test_store();
        assert_eq!(store.delete(99999).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count() {
        let store = create_test_store();
        assert_eq!(store.count().await.unwrap(), 0);

        store.insert(&ann()).await.unwrap();
        store.insert(&bob()).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_all_contacts_sorted_by_first_name() {
        let store = create_test_store();

        store
            .insert(&Contact::new("Carla", "Cruz", "555-3333"))
            .await
            .unwrap();
        store.insert(&ann()).await.unwrap();
        store.insert(&bob()).await.unwrap();

        let rx = store.all_contacts();
        let names: Vec<String> = rx.borrow().iter().map(|c| c.first_name.clone()).collect();
        assert_eq!(names, vec!["Ann", "Bob", "Carla"]);
    }

    #[tokio::test]
    async fn test_each_contact_appears_exactly_once() {
        let store = create_test_store();
        store.insert(&ann()).await.unwrap();
        store.insert(&bob()).await.unwrap();

        let rx = store.all_contacts();
        let list = rx.borrow().clone();
        assert_eq!(list.len(), 2);
        assert_eq!(
            list.iter().filter(|c| c.first_name == "Ann").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_live_query_emits_on_insert() {
        let store = create_test_store();
        let mut rx = store.all_contacts();
        assert!(rx.borrow_and_update().is_empty());

        store.insert(&ann()).await.unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);
    }

    #[tokio::test]
    async fn test_sequential_writes_observed_in_issue_order() {
        let store = create_test_store();
        let mut rx = store.all_contacts();
        rx.borrow_and_update();

        let id = store.insert(&ann()).await.unwrap().unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update()[0].address, "555-1111");

        store
            .update(&Contact::new("Ann", "Archer", "555-7777").with_id(id))
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update()[0].address, "555-7777");
    }

    #[tokio::test]
    async fn test_favorites_membership_follows_flag() {
        let store = create_test_store();
        let id = store.insert(&ann()).await.unwrap().unwrap();

        let rx = store.favorite_contacts();
        assert!(rx.borrow().is_empty());

        // flip on: read current record, set flag, write back the full record
        let current = store.get(id).await.unwrap().unwrap();
        store.update(&current.with_favorite(true)).await.unwrap();
        assert_eq!(rx.borrow().len(), 1);

        // flip off again: membership returns to the original state
        let current = store.get(id).await.unwrap().unwrap();
        store.update(&current.with_favorite(false)).await.unwrap();
        assert!(rx.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_from_every_query_shape() {
        let store = create_test_store();
        let id = store.insert(&bob()).await.unwrap().unwrap();

        let all_rx = store.all_contacts();
        let fav_rx = store.favorite_contacts();
        let one_rx = store.contact(id).await.unwrap();
        assert!(one_rx.borrow().is_some());

        store.delete(id).await.unwrap();

        assert!(all_rx.borrow().is_empty());
        assert!(fav_rx.borrow().is_empty());
        assert!(one_rx.borrow().is_none());
    }

    #[tokio::test]
    async fn test_by_id_stream_tracks_updates() {
        let store = create_test_store();
        let id = store.insert(&ann()).await.unwrap().unwrap();

        let mut rx = store.contact(id).await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().address, "555-1111");

        store
            .update(&Contact::new("Ann", "Archer", "555-8888").with_id(id))
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().address, "555-8888");
    }

    #[tokio::test]
    async fn test_by_id_stream_for_absent_record() {
        let store = create_test_store();

        let mut rx = store.contact(5).await.unwrap();
        assert!(rx.borrow_and_update().is_none());

        store.insert(&ann().with_id(5)).await.unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_some());
    }

    #[tokio::test]
    async fn test_unwatched_by_id_channels_pruned_on_write() {
        let store = create_test_store();
        let id = store.insert(&ann()).await.unwrap().unwrap();

        let rx = store.contact(id).await.unwrap();
        assert_eq!(store.inner.by_id.lock().await.len(), 1);
        drop(rx);

        store.insert(&bob()).await.unwrap();
        assert!(store.inner.by_id.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_resubscribe_after_prune() {
        let store = create_test_store();
        let id = store.insert(&ann()).await.unwrap().unwrap();

        drop(store.contact(id).await.unwrap());
        store.insert(&bob()).await.unwrap();

        let rx = store.contact(id).await.unwrap();
        assert!(rx.borrow().is_some());
    }

    #[tokio::test]
    async fn test_open_file_based() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("contacts.db");

        let store = ContactStore::open(&db_path).unwrap();
        store.insert(&ann()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.path(), db_path);
    }

    #[tokio::test]
    async fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested/deeper/contacts.db");

        let _store = ContactStore::open(&nested).unwrap();
        assert!(nested.exists());
    }

    #[tokio::test]
    async fn test_open_legacy_v1_file_migrates_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("legacy.db");

        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute(
                r"CREATE TABLE contacts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    firstName TEXT NOT NULL,
                    lastName TEXT NOT NULL,
                    address TEXT NOT NULL
                )",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO contacts (id, firstName, lastName, address) VALUES (1, 'Leah', 'Legacy', '555-0000')",
                [],
            )
            .unwrap();
        }

        let store = ContactStore::open(&db_path).unwrap();

        // the migrated row is present with the flag defaulted off, and
        // therefore excluded from favorites
        let migrated = store.get(1).await.unwrap().unwrap();
        assert_eq!(migrated.first_name, "Leah");
        assert!(!migrated.is_favorite);
        assert!(store.favorite_contacts().borrow().is_empty());
        assert_eq!(store.all_contacts().borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_unicode_fields() {
        let store = create_test_store();
        let id = store
            .insert(&Contact::new("Åsa", "Öberg", "+46 70 123"))
            .await
            .unwrap()
            .unwrap();

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.first_name, "Åsa");
        assert_eq!(stored.address, "+46 70 123");
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let store = create_test_store();

        store
            .insert(&Contact::new("Ann", "", "555-1111").with_id(1))
            .await
            .unwrap();
        store
            .insert(&Contact::new("Bob", "", "555-2222").with_id(2).with_favorite(true))
            .await
            .unwrap();

        let all: Vec<String> = store
            .all_contacts()
            .borrow()
            .iter()
            .map(|c| c.first_name.clone())
            .collect();
        assert_eq!(all, vec!["Ann", "Bob"]);

        let favorites: Vec<String> = store
            .favorite_contacts()
            .borrow()
            .iter()
            .map(|c| c.first_name.clone())
            .collect();
        assert_eq!(favorites, vec!["Bob"]);

        let filtered = crate::search::filter(&store.all_contacts().borrow(), "555-22");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].first_name, "Bob");
    }
}
