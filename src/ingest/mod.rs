//! Loading the transform step's output into the document store.

pub mod backfill;
pub mod loader;
pub mod service;
pub mod transformer;

pub use loader::{ingest_from_dir, ingest_from_file, LoadCount, LoadTarget};
pub use service::{IngestStage, IngestionReport, IngestionService, PendingWrite, StageCount};
pub use transformer::{CommandTransformer, InProcessTransformer, TransformOutcome, Transformer};
