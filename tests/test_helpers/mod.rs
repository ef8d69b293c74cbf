//! Shared fixtures for the ingestion integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use datadic::store::StoreResult;
use datadic::{
    DataLayout, DocumentStore, InProcessTransformer, IngestionService, PipelineOptions,
    RecordKind, ReingestionScheduler, SledDocumentStore, StoreError, TransformOutcome,
    Transformer, UpsertOutcome,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A data tree in a temporary directory, a temporary sled store and a
/// service wired to them.
pub struct IngestFixture {
    pub layout: DataLayout,
    pub store: Arc<dyn DocumentStore>,
    pub service: Arc<IngestionService>,
    pub scheduler: Arc<ReingestionScheduler>,
    pub _temp_dir: TempDir,
}

impl IngestFixture {
    /// Fixture running the real pipeline in process.
    pub fn new() -> Self {
        Self::with_transformer(|layout| {
            Arc::new(InProcessTransformer::new(
                layout.clone(),
                PipelineOptions::default(),
            ))
        })
    }

    pub fn with_transformer<F>(make: F) -> Self
    where
        F: FnOnce(&DataLayout) -> Arc<dyn Transformer>,
    {
        let store: Arc<dyn DocumentStore> =
            Arc::new(SledDocumentStore::temporary().expect("Failed to open temporary store"));
        Self::with_parts(store, make)
    }

    pub fn with_parts<F>(store: Arc<dyn DocumentStore>, make: F) -> Self
    where
        F: FnOnce(&DataLayout) -> Arc<dyn Transformer>,
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let layout = DataLayout::new(temp_dir.path());
        let transformer = make(&layout);
        let service = Arc::new(IngestionService::new(
            Arc::clone(&store),
            transformer,
            layout.clone(),
        ));
        let scheduler = Arc::new(ReingestionScheduler::new(
            Arc::clone(&service),
            Duration::from_secs(3600),
        ));
        Self {
            layout,
            store,
            service,
            scheduler,
            _temp_dir: temp_dir,
        }
    }

    /// Write a record into the renamed corpus.
    pub fn write_renamed(&self, kind: RecordKind, file_name: &str, content: &[u8]) -> PathBuf {
        let dir = self.layout.renamed(kind);
        std::fs::create_dir_all(&dir).expect("Failed to create renamed dir");
        let path = dir.join(file_name);
        std::fs::write(&path, content).expect("Failed to write record");
        path
    }

    pub fn find(&self, collection: &str, name: &str) -> Option<Value> {
        self.store
            .find_by_name(collection, name)
            .expect("Store lookup failed")
    }

    pub fn names(&self, collection: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .store
            .read_all(collection)
            .expect("Store read failed")
            .iter()
            .filter_map(|doc| doc.get("Entity").and_then(Value::as_str).map(str::to_string))
            .collect();
        names.sort();
        names
    }
}

pub fn entity(name: &str, identifier: &str, collections: &[&str], superclasses: &[&str]) -> Vec<u8> {
    let collections: Vec<Value> = collections
        .iter()
        .map(|c| serde_json::json!({ "Name": c }))
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "Entity": name,
        "Definition": format!("<p>{} definition</p>", name),
        "Collections": collections,
        "Metadata": {
            "Identifier": identifier,
            "Type": "Element",
            "Superclass": superclasses,
        }
    }))
    .expect("Failed to encode entity")
}

pub fn collection(name: &str, identifier: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "Entity": name,
        "Definition": format!("{} collection", name),
        "URL": [],
        "Metadata": { "Identifier": identifier, "Type": "Collection" }
    }))
    .expect("Failed to encode collection")
}

/// Transformer that reports a fixed outcome without touching the data tree.
pub struct FixedTransformer(pub TransformOutcome);

#[async_trait]
impl Transformer for FixedTransformer {
    async fn run(&self) -> TransformOutcome {
        self.0.clone()
    }
}

/// Transformer that takes a while and records how many runs overlap.
#[derive(Default)]
pub struct SlowTransformer {
    pub delay: Duration,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub runs: AtomicUsize,
}

impl SlowTransformer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Transformer for SlowTransformer {
    async fn run(&self) -> TransformOutcome {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
        TransformOutcome::Success {
            output: String::new(),
        }
    }
}

/// Store that rejects writes to one collection.
pub struct FailingStore {
    pub inner: SledDocumentStore,
    pub fail_on: &'static str,
}

impl FailingStore {
    pub fn new(fail_on: &'static str) -> Self {
        Self {
            inner: SledDocumentStore::temporary().expect("Failed to open temporary store"),
            fail_on,
        }
    }
}

impl DocumentStore for FailingStore {
    fn find_by_name(&self, collection: &str, name: &str) -> StoreResult<Option<Value>> {
        self.inner.find_by_name(collection, name)
    }

    fn upsert_by_name(
        &self,
        collection: &str,
        name: &str,
        doc: &Value,
    ) -> StoreResult<UpsertOutcome> {
        if collection == self.fail_on {
            return Err(StoreError::Backend(format!("write rejected on {}", collection)));
        }
        self.inner.upsert_by_name(collection, name, doc)
    }

    fn read_all(&self, collection: &str) -> StoreResult<Vec<Value>> {
        self.inner.read_all(collection)
    }

    fn drop_collection(&self, collection: &str) -> StoreResult<()> {
        self.inner.drop_collection(collection)
    }
}
