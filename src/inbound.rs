//! Write path for submitted records.
//!
//! A submission is validated, stored in the inbound collection for its value
//! kind, staged as `<Entity>.json`, and (for plain-text records) promoted
//! into the existing area. A non-clearing ingestion then runs before the
//! call returns, so the record is queryable as soon as `submit` succeeds.

use crate::config::DataLayout;
use crate::error::{IngestError, IngestResult};
use crate::ingest::{IngestionReport, PendingWrite};
use crate::record::{entity_name, field_as_string, is_file_safe, record_name, RecordKind, ValueKind};
use crate::scheduler::{ListSource, ReingestionScheduler};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub kind: RecordKind,
    pub entity: String,
    pub staged: PathBuf,
    /// Set for plain-text records only.
    pub promoted: Option<PathBuf>,
    pub report: IngestionReport,
}

pub struct InboundWriter {
    scheduler: Arc<ReingestionScheduler>,
    layout: DataLayout,
}

impl InboundWriter {
    pub fn new(scheduler: Arc<ReingestionScheduler>) -> Self {
        let layout = scheduler.service().layout().clone();
        Self { scheduler, layout }
    }

    /// Check a payload and return its kind and the name it is filed under.
    /// Markup names wrapped in tags are reduced to their text.
    pub fn validate(payload: &[u8], value_kind: ValueKind) -> IngestResult<(RecordKind, String, Value)> {
        let doc: Value = serde_json::from_slice(payload)
            .map_err(|e| IngestError::invalid_payload(format!("invalid JSON: {}", e)))?;
        let kind = RecordKind::detect(&doc).ok_or_else(|| {
            IngestError::invalid_payload("payload is neither an entity nor a collection")
        })?;
        let raw = entity_name(&doc)
            .ok_or_else(|| IngestError::invalid_payload("Entity is missing"))?;
        let entity = record_name(raw, value_kind);
        if entity.is_empty() {
            return Err(IngestError::invalid_payload("Entity has no text"));
        }
        if !is_file_safe(&entity) {
            return Err(IngestError::invalid_payload(format!(
                "Entity '{}' cannot name a file",
                entity
            )));
        }

        if !value_kind.is_markup() {
            let identifier = field_as_string(&doc, "Metadata.Identifier");
            if identifier.trim().parse::<u64>().is_err() {
                return Err(IngestError::invalid_payload(format!(
                    "Metadata.Identifier '{}' is not numeric",
                    identifier
                )));
            }
        }
        Ok((kind, entity, doc))
    }

    pub async fn submit(&self, payload: &[u8], value_kind: ValueKind) -> IngestResult<SubmitReceipt> {
        let (kind, entity, doc) = Self::validate(payload, value_kind)?;

        let source = match value_kind {
            ValueKind::Text => ListSource::Text,
            ValueKind::Html => ListSource::Html,
        };
        let store = self.scheduler.service().store();
        store.upsert_by_name(source.collection(kind), &entity, &doc)?;
        log_inbound_info!(
            "{} [{}] stored on [{}]",
            kind,
            entity,
            source.collection(kind)
        );

        let file_name = format!("{}.json", entity);
        let bytes = serde_json::to_vec_pretty(&doc)?;

        let staged = self.layout.inbound(kind, value_kind).join(&file_name);
        let promoted = match value_kind {
            ValueKind::Text => Some(self.layout.existing(kind).join(&file_name)),
            ValueKind::Html => None,
        };

        // Files land under the run lock: an in-flight run owns the existing area.
        let mut pending = vec![PendingWrite {
            path: staged.clone(),
            bytes: bytes.clone(),
        }];
        if let Some(target) = &promoted {
            pending.push(PendingWrite {
                path: target.clone(),
                bytes,
            });
        }

        let report = self.scheduler.trigger_after(&pending).await?;
        Ok(SubmitReceipt {
            kind,
            entity,
            staged,
            promoted,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn rejects_bad_payloads() {
        let cases: [&[u8]; 5] = [
            b"not json",
            br#"{"Foo": 1}"#,
            br#"{"Entity": "", "Metadata": {"Identifier": "1"}}"#,
            br#"{"Entity": "A", "Metadata": {"Identifier": "abc"}}"#,
            br#"{"Entity": "../A", "Metadata": {"Identifier": "1"}}"#,
        ];
        for payload in cases {
            let err = InboundWriter::validate(payload, ValueKind::Text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn markup_skips_identifier_check() {
        let (kind, entity, _) = InboundWriter::validate(
            br#"{"Entity": "A", "URL": [], "Metadata": {"Identifier": "abc"}}"#,
            ValueKind::Html,
        )
        .unwrap();
        assert_eq!(kind, RecordKind::Collection);
        assert_eq!(entity, "A");
    }

    #[test]
    fn markup_entity_is_named_by_its_text() {
        let payload = br#"{"Entity": "<p>Grade Level</p>", "URL": [], "Metadata": {"Type": "Collection"}}"#;
        let (_, entity, doc) = InboundWriter::validate(payload, ValueKind::Html).unwrap();
        assert_eq!(entity, "Grade Level");
        assert_eq!(doc["Entity"], "<p>Grade Level</p>");

        let err = InboundWriter::validate(payload, ValueKind::Text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
