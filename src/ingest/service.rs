//! The ingestion orchestrator.
//!
//! One run invokes the transform step, then loads every derived artifact
//! into its store collection in a fixed order and finally back-fills the
//! collection documents. Runs are single-flight: the service holds one async
//! lock for the whole run.

use crate::config::DataLayout;
use crate::constants::{
    collections, CLASS_LINK_FILE, COLLECTION_ENTITIES_FILE, ENTITY_FIELD, REF_NAME_FIELD,
    RESERVED_FILES,
};
use crate::error::{IngestError, IngestResult};
use crate::ingest::backfill::backfill_collections;
use crate::ingest::loader::{ingest_from_dir, ingest_from_file, LoadCount, LoadTarget};
use crate::ingest::transformer::{TransformOutcome, Transformer};
use crate::logging::{LogFeature, PerformanceTimer};
use crate::record::RecordKind;
use crate::store::{DocumentStore, UpsertOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Where a run currently is. `Failed` is reachable from every other stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IngestStage {
    Idle,
    InvokingTransform,
    LoadingEntities,
    LoadingClassLinkage,
    LoadingEntityPathValues,
    LoadingCollections,
    LoadingCollectionPathValues,
    LoadingCollectionMembership,
    BackfillingCollections,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageCount {
    pub stage: IngestStage,
    pub collection: String,
    pub loaded: usize,
    pub skipped: usize,
}

/// What one successful run did.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub run_id: Uuid,
    pub cleared: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageCount>,
    pub backfilled: usize,
}

impl IngestionReport {
    pub fn loaded(&self, stage: IngestStage) -> usize {
        self.stages
            .iter()
            .filter(|s| s.stage == stage)
            .map(|s| s.loaded)
            .sum()
    }
}

/// A file placed into the data tree under the run lock, right before the
/// run it belongs to.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

pub struct IngestionService {
    store: Arc<dyn DocumentStore>,
    transformer: Arc<dyn Transformer>,
    layout: DataLayout,
    run_lock: Mutex<()>,
    stage: RwLock<IngestStage>,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        transformer: Arc<dyn Transformer>,
        layout: DataLayout,
    ) -> Self {
        Self {
            store,
            transformer,
            layout,
            run_lock: Mutex::new(()),
            stage: RwLock::new(IngestStage::Idle),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn current_stage(&self) -> IngestStage {
        match self.stage.read() {
            Ok(stage) => *stage,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Run ingestion, waiting for an in-flight run to finish first.
    pub async fn run_ingestion(&self, clear_first: bool) -> IngestResult<IngestionReport> {
        self.run_ingestion_after(&[], clear_first).await
    }

    /// Write `pending` and then run ingestion, all under one hold of the run
    /// lock so no in-flight run sees a partial file.
    pub async fn run_ingestion_after(
        &self,
        pending: &[PendingWrite],
        clear_first: bool,
    ) -> IngestResult<IngestionReport> {
        let _guard = self.run_lock.lock().await;
        for write in pending {
            if let Some(parent) = write.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&write.path, &write.bytes).await?;
            log_ingest_debug!("{} written before run", write.path.display());
        }
        self.run_exclusive(clear_first).await
    }

    /// Run ingestion unless one is already in flight, in which case `None`.
    pub async fn try_run_ingestion(
        &self,
        clear_first: bool,
    ) -> Option<IngestResult<IngestionReport>> {
        let _guard = self.run_lock.try_lock().ok()?;
        Some(self.run_exclusive(clear_first).await)
    }

    fn set_stage(&self, stage: IngestStage) {
        match self.stage.write() {
            Ok(mut current) => *current = stage,
            Err(poisoned) => *poisoned.into_inner() = stage,
        }
    }

    async fn run_exclusive(&self, clear_first: bool) -> IngestResult<IngestionReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = PerformanceTimer::new(LogFeature::Ingest, format!("ingestion run {}", run_id));
        log_ingest_info!("ingestion run {} started (clear: {})", run_id, clear_first);

        match self.run_stages(clear_first).await {
            Ok((stages, backfilled)) => {
                self.set_stage(IngestStage::Done);
                timer.finish();
                Ok(IngestionReport {
                    run_id,
                    cleared: clear_first,
                    started_at,
                    finished_at: Utc::now(),
                    stages,
                    backfilled,
                })
            }
            Err(e) => {
                log_ingest_error!(
                    "ingestion run {} failed at {:?}: {}",
                    run_id,
                    self.current_stage(),
                    e
                );
                self.set_stage(IngestStage::Failed);
                Err(e)
            }
        }
    }

    async fn run_stages(&self, clear_first: bool) -> IngestResult<(Vec<StageCount>, usize)> {
        self.set_stage(IngestStage::InvokingTransform);
        match self.transformer.run().await {
            TransformOutcome::Success { output } => {
                log_ingest_debug!("transform output: {}", output.trim_end());
            }
            TransformOutcome::Failure { status, output } => {
                return Err(IngestError::process_failure(format!(
                    "exit status {:?}: {}",
                    status,
                    output.trim_end()
                )));
            }
            TransformOutcome::TimedOut { after } => {
                return Err(IngestError::process_failure(format!(
                    "timed out for ingestion after {:?}",
                    after
                )));
            }
        }

        if clear_first {
            for collection in collections::DERIVED_AND_CANONICAL {
                self.store.drop_collection(collection)?;
            }
            log_ingest_info!("dropped {:?}", collections::DERIVED_AND_CANONICAL);
        }

        let store = self.store.as_ref();
        let entity_out = self.layout.out(RecordKind::Entity);
        let collection_out = self.layout.out(RecordKind::Collection);
        let mut stages = Vec::new();

        self.load_dir(
            &mut stages,
            IngestStage::LoadingEntities,
            canonical(collections::ENTITIES),
            &entity_out,
        )?;
        self.load_singleton(
            &mut stages,
            IngestStage::LoadingClassLinkage,
            singleton(collections::CLASS_LINKAGE),
            &entity_out.join(CLASS_LINK_FILE),
        )?;
        self.load_dir(
            &mut stages,
            IngestStage::LoadingEntityPathValues,
            canonical(collections::PATH_VALUES),
            &self.layout.path_values(RecordKind::Entity),
        )?;
        // `Entities` is derived; whatever a source file carries is discarded.
        self.load_dir(
            &mut stages,
            IngestStage::LoadingCollections,
            LoadTarget {
                strip: &["Entities"],
                ..canonical(collections::COLLECTIONS)
            },
            &collection_out,
        )?;
        self.load_dir(
            &mut stages,
            IngestStage::LoadingCollectionPathValues,
            canonical(collections::PATH_VALUES),
            &self.layout.path_values(RecordKind::Collection),
        )?;
        self.load_singleton(
            &mut stages,
            IngestStage::LoadingCollectionMembership,
            singleton(collections::COLLECTION_ENTITIES),
            &entity_out.join(COLLECTION_ENTITIES_FILE),
        )?;

        self.set_stage(IngestStage::BackfillingCollections);
        let backfilled = backfill_collections(store)?;

        Ok((stages, backfilled))
    }

    fn load_dir(
        &self,
        stages: &mut Vec<StageCount>,
        stage: IngestStage,
        target: LoadTarget<'_>,
        dir: &Path,
    ) -> IngestResult<()> {
        self.set_stage(stage);
        let timer = PerformanceTimer::new(LogFeature::Ingest, format!("{:?}", stage));
        let count = ingest_from_dir(self.store.as_ref(), &target, dir)?;
        timer.finish();
        stages.push(stage_count(stage, target.collection, count));
        Ok(())
    }

    fn load_singleton(
        &self,
        stages: &mut Vec<StageCount>,
        stage: IngestStage,
        target: LoadTarget<'_>,
        path: &Path,
    ) -> IngestResult<()> {
        self.set_stage(stage);
        let mut count = LoadCount::default();
        if !path.exists() {
            log_ingest_warn!("{} not found, [{}] left as is", path.display(), target.collection);
            count.skipped = 1;
        } else {
            match ingest_from_file(self.store.as_ref(), &target, path)? {
                Some(UpsertOutcome::Inserted) => count.inserted = 1,
                Some(UpsertOutcome::Replaced) => count.replaced = 1,
                None => count.skipped = 1,
            }
            log_ingest_info!("[{}] has been updated on [{}]", path.display(), target.collection);
        }
        stages.push(stage_count(stage, target.collection, count));
        Ok(())
    }
}

fn canonical(collection: &'static str) -> LoadTarget<'static> {
    LoadTarget {
        collection,
        id_field: ENTITY_FIELD,
        exclude: &RESERVED_FILES,
        strip: &[],
    }
}

fn singleton(collection: &'static str) -> LoadTarget<'static> {
    LoadTarget {
        collection,
        id_field: REF_NAME_FIELD,
        exclude: &[],
        strip: &[],
    }
}

fn stage_count(stage: IngestStage, collection: &str, count: LoadCount) -> StageCount {
    StageCount {
        stage,
        collection: collection.to_string(),
        loaded: count.loaded(),
        skipped: count.skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SledDocumentStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Fixed(TransformOutcome);

    #[async_trait]
    impl Transformer for Fixed {
        async fn run(&self) -> TransformOutcome {
            self.0.clone()
        }
    }

    fn service(outcome: TransformOutcome, root: &Path) -> IngestionService {
        IngestionService::new(
            Arc::new(SledDocumentStore::temporary().unwrap()),
            Arc::new(Fixed(outcome)),
            DataLayout::new(root),
        )
    }

    #[tokio::test]
    async fn transform_failure_stops_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let out = DataLayout::new(dir.path()).out(RecordKind::Entity);
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("E1.json"), r#"{"Entity":"E1"}"#).unwrap();

        for outcome in [
            TransformOutcome::Failure { status: Some(2), output: "boom".into() },
            TransformOutcome::TimedOut { after: Duration::from_secs(5) },
        ] {
            let service = service(outcome, dir.path());
            let err = service.run_ingestion(false).await.unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::ProcessFailure);
            assert_eq!(service.current_stage(), IngestStage::Failed);
            assert!(service.store().read_all(collections::ENTITIES).unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn pending_writes_land_before_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(TransformOutcome::Success { output: String::new() }, dir.path());
        let out = service.layout().out(RecordKind::Entity);
        let pending = [PendingWrite {
            path: out.join("E1.json"),
            bytes: br#"{"Entity":"E1"}"#.to_vec(),
        }];

        let report = service.run_ingestion_after(&pending, false).await.unwrap();

        assert_eq!(report.loaded(IngestStage::LoadingEntities), 1);
        assert!(service.store().find_by_name(collections::ENTITIES, "E1").unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_tree_completes_with_zero_counts() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(TransformOutcome::Success { output: String::new() }, dir.path());
        let report = service.run_ingestion(true).await.unwrap();
        assert_eq!(report.loaded(IngestStage::LoadingEntities), 0);
        assert_eq!(report.stages.len(), 6);
        assert_eq!(report.backfilled, 0);
        assert_eq!(service.current_stage(), IngestStage::Done);
        assert!(!service.is_running());
    }
}
