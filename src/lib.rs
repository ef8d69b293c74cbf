//! # Data Dictionary Ingestion
//!
//! Ingests hand-curated, frequently malformed JSON records describing
//! educational entities and collections, repairs them, derives secondary
//! indices and loads everything into a document store read by a separate
//! query layer.
//!
//! ## Core Components
//!
//! * `process` - The transform step: file normalization, JSON repair,
//!   path-value flattening, class linkage and collection membership
//! * `ingest` - Transform invocation and upsert-by-identity loading
//! * `scheduler` - Periodic and triggered re-ingestion, name-list cache
//! * `inbound` - Write path for submitted records
//! * `store` - Document store abstraction and its sled backend
//! * `config` - Runtime configuration and the data directory layout
//! * `error` - Error types and the closed error-kind taxonomy
//!
//! ## Architecture
//!
//! Source files flow through the transform step, which writes repaired
//! records and derived artifacts under `data/out`. An ingestion run then
//! loads each artifact into its own logical collection. Runs are
//! single-flight; the scheduler either waits for or skips past a run that
//! is already in progress.

#[macro_use]
pub mod logging;

pub mod config;
pub mod constants;
pub mod error;
pub mod inbound;
pub mod ingest;
pub mod process;
pub mod record;
pub mod scheduler;
pub mod store;

// Re-export main types for convenience
pub use config::{load_ingestion_config, DataLayout, IngestionConfig};
pub use error::{ErrorKind, IngestError, IngestResult};
pub use inbound::{InboundWriter, SubmitReceipt};
pub use ingest::{
    CommandTransformer, InProcessTransformer, IngestStage, IngestionReport, IngestionService,
    PendingWrite, TransformOutcome, Transformer,
};
pub use process::{run_pipeline, PipelineOptions, PipelineReport};
pub use record::{RecordKind, ValueKind};
pub use scheduler::{ListSource, NameListCache, ReingestionScheduler, SchedulerHandle};
pub use store::{DocumentStore, SledDocumentStore, StoreError, UpsertOutcome};
