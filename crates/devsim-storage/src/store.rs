//! ETag-versioned record store using redb.
//!
//! Every record kind lives in its own table keyed by Id, values are JSON.
//! redb runs one write transaction at a time, so reading the current ETag and
//! writing the new record inside the same write transaction is an atomic
//! check-and-set: of two writers holding the same ETag exactly one wins.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// A record with a service-assigned Id and ETag.
pub trait Versioned: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// redb table holding this kind.
    const TABLE: &'static str;
    /// Human name used in error messages.
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn etag(&self) -> &str;
    fn set_etag(&mut self, etag: String);

    /// Ids that can never be deleted.
    fn is_protected_id(_id: &str) -> bool {
        false
    }

    /// Stored records that can never be deleted.
    fn is_protected(&self) -> bool {
        false
    }
}

/// Generate a fresh ETag.
pub fn new_etag() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Open or create the database file, creating parent directories as needed.
pub fn open_database<P: AsRef<Path>>(path: P) -> Result<Arc<Database>> {
    let path = path.as_ref();
    let db = if path.exists() {
        Database::open(path)?
    } else {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Database::create(path)?
    };
    tracing::info!("Record database initialized at {}", path.display());
    Ok(Arc::new(db))
}

/// Open a database that lives only in memory.
pub fn memory_database() -> Result<Arc<Database>> {
    let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
    Ok(Arc::new(db))
}

/// Versioned store for one record kind.
pub struct VersionedStore<T> {
    db: Arc<Database>,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Clone for VersionedStore<T> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            _kind: PhantomData,
        }
    }
}

impl<T: Versioned> VersionedStore<T> {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            _kind: PhantomData,
        }
    }

    /// Store backed by an in-memory database.
    pub fn memory() -> Result<Self> {
        Ok(Self::new(memory_database()?))
    }

    fn table() -> TableDefinition<'static, &'static str, Vec<u8>> {
        TableDefinition::new(T::TABLE)
    }

    /// Insert a new record. Assigns an Id when empty and always a fresh ETag.
    pub async fn insert(&self, entity: T) -> Result<T> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.insert_blocking(entity)).await?
    }

    /// Replace the record at `id` if `entity`'s ETag matches the stored one.
    /// Missing records are created. Returns the saved record and the one it
    /// replaced, both read inside the same write transaction.
    pub async fn upsert(&self, id: &str, entity: T) -> Result<(T, Option<T>)> {
        let this = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || this.upsert_blocking(&id, entity)).await?
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        let this = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || this.get_blocking(&id)).await?
    }

    pub async fn list(&self) -> Result<Vec<T>> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.list_blocking()).await?
    }

    /// Delete the record at `id`, returning what was stored.
    pub async fn delete(&self, id: &str) -> Result<T> {
        let this = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || this.delete_blocking(&id)).await?
    }

    /// Insert every entity whose Id is not stored yet. Returns how many were added.
    pub async fn seed(&self, entities: Vec<T>) -> Result<usize> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.seed_blocking(entities)).await?
    }

    fn insert_blocking(&self, mut entity: T) -> Result<T> {
        if entity.id().trim().is_empty() {
            entity.set_id(uuid::Uuid::new_v4().to_string());
        }
        entity.set_etag(new_etag());

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(Self::table())?;
            if table.get(entity.id())?.is_some() {
                return Err(Error::Conflict(format!(
                    "{} {} already exists",
                    T::KIND,
                    entity.id()
                )));
            }
            let bytes = serde_json::to_vec(&entity)?;
            table.insert(entity.id(), bytes)?;
        }
        write_txn.commit()?;

        tracing::debug!(kind = T::KIND, id = entity.id(), "Inserted record");
        Ok(entity)
    }

    fn upsert_blocking(&self, id: &str, mut entity: T) -> Result<(T, Option<T>)> {
        let write_txn = self.db.begin_write()?;
        let previous = {
            let mut table = write_txn.open_table(Self::table())?;
            let current = match table.get(id)? {
                Some(value) => Some(serde_json::from_slice::<T>(value.value().as_slice())?),
                None => None,
            };
            if let Some(current) = &current {
                if current.etag() != entity.etag() {
                    return Err(Error::Conflict(format!(
                        "{} {} has been modified, ETag {} is stale",
                        T::KIND,
                        id,
                        entity.etag()
                    )));
                }
            }

            entity.set_id(id.to_string());
            entity.set_etag(new_etag());
            let bytes = serde_json::to_vec(&entity)?;
            table.insert(id, bytes)?;
            current
        };
        write_txn.commit()?;

        tracing::debug!(kind = T::KIND, id, etag = entity.etag(), "Upserted record");
        Ok((entity, previous))
    }

    fn get_blocking(&self, id: &str) -> Result<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(Self::table()) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value().as_slice())?)),
            None => Ok(None),
        }
    }

    fn list_blocking(&self) -> Result<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(Self::table()) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            records.push(serde_json::from_slice(value.value().as_slice())?);
        }
        Ok(records)
    }

    fn delete_blocking(&self, id: &str) -> Result<T> {
        if T::is_protected_id(id) {
            return Err(Error::Forbidden(format!("{} {} cannot be deleted", T::KIND, id)));
        }

        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(Self::table())?;
            let current = match table.get(id)? {
                Some(value) => serde_json::from_slice::<T>(value.value().as_slice())?,
                None => return Err(Error::NotFound(format!("{} {}", T::KIND, id))),
            };
            if current.is_protected() {
                return Err(Error::Forbidden(format!("{} {} cannot be deleted", T::KIND, id)));
            }
            table.remove(id)?;
            current
        };
        write_txn.commit()?;

        tracing::debug!(kind = T::KIND, id, "Deleted record");
        Ok(removed)
    }

    fn seed_blocking(&self, entities: Vec<T>) -> Result<usize> {
        let write_txn = self.db.begin_write()?;
        let mut added = 0;
        {
            let mut table = write_txn.open_table(Self::table())?;
            for mut entity in entities {
                if table.get(entity.id())?.is_some() {
                    continue;
                }
                entity.set_etag(new_etag());
                let bytes = serde_json::to_vec(&entity)?;
                table.insert(entity.id(), bytes)?;
                added += 1;
            }
        }
        write_txn.commit()?;

        if added > 0 {
            tracing::info!(kind = T::KIND, added, "Seeded records");
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        etag: String,
        text: String,
    }

    impl Versioned for Note {
        const TABLE: &'static str = "notes";
        const KIND: &'static str = "Note";

        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
        fn etag(&self) -> &str {
            &self.etag
        }
        fn set_etag(&mut self, etag: String) {
            self.etag = etag;
        }
        fn is_protected_id(id: &str) -> bool {
            id == "pinned"
        }
    }

    fn note(id: &str, text: &str) -> Note {
        Note {
            id: id.to_string(),
            etag: String::new(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_table_reads() {
        let store = VersionedStore::<Note>::memory().unwrap();
        assert!(store.get("x").await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_etag() {
        let store = VersionedStore::<Note>::memory().unwrap();
        let mut draft = note("", "hello");
        draft.etag = "client".to_string();

        let saved = store.insert(draft).await.unwrap();
        assert!(!saved.id.is_empty());
        assert!(!saved.etag.is_empty());
        assert_ne!(saved.etag, "client");
        let fetched = store.get(&saved.id).await.unwrap();
        assert_eq!(fetched, Some(saved));
    }

    #[tokio::test]
    async fn test_insert_duplicate_conflicts() {
        let store = VersionedStore::<Note>::memory().unwrap();
        store.insert(note("a", "one")).await.unwrap();
        let err = store.insert(note("a", "two")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_upsert_checks_etag() {
        let store = VersionedStore::<Note>::memory().unwrap();
        let saved = store.insert(note("a", "one")).await.unwrap();

        let mut next = saved.clone();
        next.text = "two".to_string();
        let (updated, previous) = store.upsert("a", next.clone()).await.unwrap();
        assert_ne!(updated.etag, saved.etag);
        assert_eq!(updated.text, "two");
        assert_eq!(previous, Some(saved));

        // `next` still carries the old ETag.
        let err = store.upsert("a", next).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.get("a").await.unwrap().unwrap().text, "two");
    }

    #[tokio::test]
    async fn test_upsert_creates_missing_and_path_id_wins() {
        let store = VersionedStore::<Note>::memory().unwrap();
        let (created, previous) = store.upsert("b", note("other", "x")).await.unwrap();
        assert_eq!(created.id, "b");
        assert!(previous.is_none());
        assert!(store.get("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = VersionedStore::<Note>::memory().unwrap();
        store.insert(note("a", "one")).await.unwrap();

        let removed = store.delete("a").await.unwrap();
        assert_eq!(removed.text, "one");
        assert!(matches!(store.delete("a").await, Err(Error::NotFound(_))));
        assert!(matches!(store.delete("pinned").await, Err(Error::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_seed_keeps_existing() {
        let store = VersionedStore::<Note>::memory().unwrap();
        store.insert(note("a", "mine")).await.unwrap();

        let added = store
            .seed(vec![note("a", "seeded"), note("b", "seeded")])
            .await
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(store.get("a").await.unwrap().unwrap().text, "mine");
        assert!(!store.get("b").await.unwrap().unwrap().etag.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_returns_record_it_replaced() {
        let store = VersionedStore::<Note>::memory().unwrap();
        let first = store.insert(note("a", "one")).await.unwrap();

        // A writer that raced ahead; the next upsert must report its record,
        // not the one read before it.
        let mut raced = first.clone();
        raced.text = "raced".to_string();
        let (raced, _) = store.upsert("a", raced).await.unwrap();

        let mut next = raced.clone();
        next.text = "three".to_string();
        let (_, previous) = store.upsert("a", next).await.unwrap();
        assert_eq!(previous.map(|p| p.text), Some("raced".to_string()));
    }

    #[tokio::test]
    async fn test_memory_stores_are_isolated() {
        let one = VersionedStore::<Note>::memory().unwrap();
        let two = VersionedStore::<Note>::memory().unwrap();
        one.insert(note("a", "one")).await.unwrap();
        assert!(two.get("a").await.unwrap().is_none());
    }
}
