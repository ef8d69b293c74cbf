//! Document store used by the loaders and the query layer.
//!
//! The pipeline needs only three things from a store: select by name,
//! replace-or-insert by name and read a whole collection (plus dropping a
//! collection for full rebuilds). [`SledDocumentStore`] keeps each logical
//! collection in its own sled tree, keyed by the document's identity value.

use crate::logging::LogFeature;
use serde_json::Value as JsonValue;
use std::path::Path;
use thiserror::Error;

/// Errors raised by a document store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Failed to (de)serialize document: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Operations the ingestion pipeline requires from the store.
pub trait DocumentStore: Send + Sync {
    /// Select one document by its identity value.
    fn find_by_name(&self, collection: &str, name: &str) -> StoreResult<Option<JsonValue>>;

    /// Replace the whole document stored under `name`, or insert it.
    fn upsert_by_name(
        &self,
        collection: &str,
        name: &str,
        doc: &JsonValue,
    ) -> StoreResult<UpsertOutcome>;

    /// Every document of a collection.
    fn read_all(&self, collection: &str) -> StoreResult<Vec<JsonValue>>;

    /// Remove a collection and all of its documents.
    fn drop_collection(&self, collection: &str) -> StoreResult<()>;
}

pub struct SledDocumentStore {
    db: sled::Db,
}

impl SledDocumentStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path.as_ref())?;
        log::info!(
            target: LogFeature::Store.target(),
            "opened document store at {}",
            path.as_ref().display()
        );
        Ok(Self { db })
    }

    /// Store that lives only as long as the handle, for tests and dry runs.
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Gets a reference to the underlying database
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn tree(&self, collection: &str) -> StoreResult<sled::Tree> {
        Ok(self.db.open_tree(collection)?)
    }
}

impl DocumentStore for SledDocumentStore {
    fn find_by_name(&self, collection: &str, name: &str) -> StoreResult<Option<JsonValue>> {
        match self.tree(collection)?.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn upsert_by_name(
        &self,
        collection: &str,
        name: &str,
        doc: &JsonValue,
    ) -> StoreResult<UpsertOutcome> {
        let tree = self.tree(collection)?;
        let bytes = serde_json::to_vec(doc)?;
        let previous = tree.insert(name.as_bytes(), bytes)?;

        // Ensure the data is durably written to disk
        tree.flush()?;

        Ok(match previous {
            Some(_) => UpsertOutcome::Replaced,
            None => UpsertOutcome::Inserted,
        })
    }

    fn read_all(&self, collection: &str) -> StoreResult<Vec<JsonValue>> {
        let mut docs = Vec::new();
        for result in self.tree(collection)?.iter() {
            let (_, bytes) = result?;
            docs.push(serde_json::from_slice(&bytes)?);
        }
        Ok(docs)
    }

    fn drop_collection(&self, collection: &str) -> StoreResult<()> {
        let existed = self.db.drop_tree(collection)?;
        log::debug!(
            target: LogFeature::Store.target(),
            "dropped [{}] (existed: {})",
            collection,
            existed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upsert_replaces_whole_document() {
        let store = SledDocumentStore::temporary().unwrap();
        let first = json!({"Entity": "Student", "Definition": "old", "Extra": 1});
        let second = json!({"Entity": "Student", "Definition": "new"});

        assert_eq!(
            store.upsert_by_name("entities", "Student", &first).unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            store.upsert_by_name("entities", "Student", &second).unwrap(),
            UpsertOutcome::Replaced
        );

        let stored = store.find_by_name("entities", "Student").unwrap().unwrap();
        assert_eq!(stored, second);
        assert_eq!(store.read_all("entities").unwrap().len(), 1);
    }

    #[test]
    fn collections_are_isolated_and_droppable() {
        let store = SledDocumentStore::temporary().unwrap();
        store
            .upsert_by_name("entities", "A", &json!({"Entity": "A"}))
            .unwrap();
        store
            .upsert_by_name("pathval", "A", &json!({"Entity": "A", "Entity[dot]x": "1"}))
            .unwrap();

        store.drop_collection("pathval").unwrap();
        assert!(store.read_all("pathval").unwrap().is_empty());
        assert!(store.find_by_name("entities", "A").unwrap().is_some());
        assert!(store.find_by_name("entities", "missing").unwrap().is_none());
    }
}
