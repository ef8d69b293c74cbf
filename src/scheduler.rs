//! Periodic and on-demand re-ingestion, plus the name-list cache the query
//! layer uses for cheap existence and kind lookups.

use crate::constants::collections;
use crate::error::IngestResult;
use crate::ingest::{IngestionReport, IngestionService, PendingWrite};
use crate::record::{entity_name, record_name, RecordKind, ValueKind};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Which area a name list is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListSource {
    /// The canonical, ingested records.
    Existing,
    /// Inbound plain-text submissions.
    Text,
    /// Inbound markup submissions.
    Html,
}

impl ListSource {
    pub const ALL: [ListSource; 3] = [ListSource::Existing, ListSource::Text, ListSource::Html];

    /// Store collection holding the records of `kind` from this source.
    pub fn collection(&self, kind: RecordKind) -> &'static str {
        match (kind, self) {
            (RecordKind::Entity, ListSource::Existing) => collections::ENTITIES,
            (RecordKind::Entity, ListSource::Text) => collections::ENTITIES_TEXT,
            (RecordKind::Entity, ListSource::Html) => collections::ENTITIES_HTML,
            (RecordKind::Collection, ListSource::Existing) => collections::COLLECTIONS,
            (RecordKind::Collection, ListSource::Text) => collections::COLLECTIONS_TEXT,
            (RecordKind::Collection, ListSource::Html) => collections::COLLECTIONS_HTML,
        }
    }

    /// Value kind of the records this source holds.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            ListSource::Html => ValueKind::Html,
            ListSource::Existing | ListSource::Text => ValueKind::Text,
        }
    }
}

impl fmt::Display for ListSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListSource::Existing => "existing",
            ListSource::Text => "text",
            ListSource::Html => "html",
        })
    }
}

impl FromStr for ListSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "existing" => Ok(ListSource::Existing),
            "text" => Ok(ListSource::Text),
            "html" => Ok(ListSource::Html),
            other => Err(format!("source can only be [existing text html], got '{}'", other)),
        }
    }
}

/// Name lists keyed by record kind and source. Every access goes through
/// one mutex.
#[derive(Debug, Default)]
pub struct NameListCache {
    lists: Mutex<HashMap<(RecordKind, ListSource), Vec<String>>>,
}

impl NameListCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(RecordKind, ListSource), Vec<String>>> {
        self.lists.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, kind: RecordKind, source: ListSource) -> Option<Vec<String>> {
        self.lock().get(&(kind, source)).cloned()
    }

    /// Lists are stored sorted and deduplicated for [`Self::kind_of`].
    pub fn put(&self, kind: RecordKind, source: ListSource, mut names: Vec<String>) {
        names.sort();
        names.dedup();
        self.lock().insert((kind, source), names);
    }

    /// Kind of the first cached list that contains `name`, entities first.
    pub fn kind_of(&self, name: &str) -> Option<RecordKind> {
        let lists = self.lock();
        RecordKind::ALL.into_iter().find(|kind| {
            ListSource::ALL.iter().any(|source| {
                lists
                    .get(&(*kind, *source))
                    .map(|names| names.binary_search_by(|n| n.as_str().cmp(name)).is_ok())
                    .unwrap_or(false)
            })
        })
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Stops the periodic task started by [`ReingestionScheduler::start`].
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            log_scheduler_warn!("scheduler task ended abnormally: {}", e);
        }
    }
}

pub struct ReingestionScheduler {
    service: Arc<IngestionService>,
    cache: Arc<NameListCache>,
    period: Duration,
}

impl ReingestionScheduler {
    pub fn new(service: Arc<IngestionService>, period: Duration) -> Self {
        Self {
            service,
            cache: Arc::new(NameListCache::new()),
            period,
        }
    }

    pub fn service(&self) -> &Arc<IngestionService> {
        &self.service
    }

    pub fn cache(&self) -> &Arc<NameListCache> {
        &self.cache
    }

    /// One timer tick: a non-clearing run, skipped when a run is already in
    /// flight. Failures are logged and left for the next tick.
    pub async fn tick(&self) -> Option<IngestResult<IngestionReport>> {
        let result = self.service.try_run_ingestion(false).await;
        match &result {
            None => log_scheduler_info!("ingestion already in progress, tick skipped"),
            Some(Ok(report)) => {
                self.cache.clear();
                log_scheduler_info!("scheduled ingestion {} finished", report.run_id);
            }
            Some(Err(e)) => log_scheduler_warn!("scheduled ingestion failed: {}", e),
        }
        result
    }

    /// Run a non-clearing ingestion now, after any in-flight run, and surface
    /// its error to the caller.
    pub async fn trigger_now(&self) -> IngestResult<IngestionReport> {
        self.trigger_after(&[]).await
    }

    /// Like [`Self::trigger_now`], writing `pending` first under the run lock.
    pub async fn trigger_after(&self, pending: &[PendingWrite]) -> IngestResult<IngestionReport> {
        let report = self.service.run_ingestion_after(pending, false).await?;
        self.cache.clear();
        log_scheduler_info!("triggered ingestion {} finished", report.run_id);
        Ok(report)
    }

    /// Spawn the periodic task. The first tick fires one period from now.
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let (shutdown, mut stopped) = watch::channel(false);
        let scheduler = Arc::clone(self);
        let period = self.period;

        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            log_scheduler_info!("re-ingestion scheduled every {:?}", period);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scheduler.tick().await;
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            log_scheduler_info!("re-ingestion scheduler stopped");
        });

        SchedulerHandle { shutdown, task }
    }

    /// Sorted names of every record of `kind` in `source`, read from the
    /// store. The result replaces the cached list.
    pub fn list_names(&self, kind: RecordKind, source: ListSource) -> IngestResult<Vec<String>> {
        let mut names: Vec<String> = self
            .service
            .store()
            .read_all(source.collection(kind))?
            .iter()
            .filter_map(|doc| entity_name(doc).map(|name| record_name(name, source.value_kind())))
            .collect();
        names.sort();
        names.dedup();
        self.cache.put(kind, source, names.clone());
        Ok(names)
    }

    /// Answer from the cache only; lists are filled by [`Self::list_names`].
    pub fn kind_of(&self, name: &str) -> Option<RecordKind> {
        self.cache.kind_of(name)
    }
}
