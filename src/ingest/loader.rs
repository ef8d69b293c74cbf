//! Upsert-by-identity loaders: every `*.json` file of a directory, or one
//! singleton file, replaces the stored document with the same identity.

use crate::error::{IngestError, IngestResult};
use crate::process::list_json_files;
use crate::record::field_as_string;
use crate::store::{DocumentStore, UpsertOutcome};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// How files of one stage are identified and cleaned before upsert.
#[derive(Debug, Clone, Copy)]
pub struct LoadTarget<'a> {
    pub collection: &'a str,
    pub id_field: &'a str,
    /// Filenames that are never loaded from this directory.
    pub exclude: &'a [&'a str],
    /// Top-level keys removed from each document before it is stored.
    pub strip: &'a [&'a str],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadCount {
    pub inserted: usize,
    pub replaced: usize,
    pub skipped: usize,
}

impl LoadCount {
    pub fn loaded(&self) -> usize {
        self.inserted + self.replaced
    }

    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Replaced => self.replaced += 1,
        }
    }
}

/// Load one file. `Ok(None)` means its identity was empty and it was skipped.
pub fn ingest_from_file(
    store: &dyn DocumentStore,
    target: &LoadTarget<'_>,
    path: &Path,
) -> IngestResult<Option<UpsertOutcome>> {
    let data = fs::read(path)?;
    let mut doc: Value = serde_json::from_slice(&data)
        .map_err(|e| IngestError::validation(path, format!("invalid JSON: {}", e)))?;

    let identity = field_as_string(&doc, target.id_field);
    if identity.is_empty() {
        log_ingest_warn!(
            "empty value of [{}] @ {}, ignored",
            target.id_field,
            path.display()
        );
        return Ok(None);
    }

    if let Some(map) = doc.as_object_mut() {
        for key in target.strip {
            map.remove(*key);
        }
    }

    let outcome = store.upsert_by_name(target.collection, &identity, &doc)?;
    log_ingest_debug!("{:?} [{}] on [{}]", outcome, identity, target.collection);
    Ok(Some(outcome))
}

/// Load every file of `dir`. Store errors abort the load; so do files that
/// are not JSON, since the transform step only writes valid documents.
pub fn ingest_from_dir(
    store: &dyn DocumentStore,
    target: &LoadTarget<'_>,
    dir: &Path,
) -> IngestResult<LoadCount> {
    let mut count = LoadCount::default();
    for path in list_json_files(dir, target.exclude)? {
        match ingest_from_file(store, target, &path)? {
            Some(outcome) => count.record(outcome),
            None => count.skipped += 1,
        }
    }
    log_ingest_info!(
        "all [{}] files have been ingested or updated on [{}]",
        count.loaded(),
        target.collection
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SledDocumentStore;
    use serde_json::json;

    const TARGET: LoadTarget<'static> = LoadTarget {
        collection: "collections",
        id_field: "Entity",
        exclude: &["class-link.json"],
        strip: &["Entities"],
    };

    #[test]
    fn upserts_and_skips_empty_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledDocumentStore::temporary().unwrap();
        fs::write(
            dir.path().join("C1.json"),
            r#"{"Entity":"C1","Entities":["stale"]}"#,
        )
        .unwrap();
        fs::write(dir.path().join("blank.json"), r#"{"Entity":""}"#).unwrap();
        fs::write(dir.path().join("class-link.json"), r#"{"RefName":"ClassLinkage"}"#).unwrap();

        let first = ingest_from_dir(&store, &TARGET, dir.path()).unwrap();
        assert_eq!(first, LoadCount { inserted: 1, replaced: 0, skipped: 1 });

        let second = ingest_from_dir(&store, &TARGET, dir.path()).unwrap();
        assert_eq!(second.replaced, 1);

        let stored = store.find_by_name("collections", "C1").unwrap().unwrap();
        assert_eq!(stored, json!({"Entity": "C1"}));
        assert_eq!(store.read_all("collections").unwrap().len(), 1);
    }

    #[test]
    fn singleton_keyed_by_ref_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledDocumentStore::temporary().unwrap();
        let path = dir.path().join("class-link.json");
        fs::write(&path, r#"{"RefName":"ClassLinkage","A":{"Branch":"A","Children":[]}}"#).unwrap();

        let target = LoadTarget {
            collection: "class",
            id_field: "RefName",
            exclude: &[],
            strip: &[],
        };
        let outcome = ingest_from_file(&store, &target, &path).unwrap();
        assert_eq!(outcome, Some(UpsertOutcome::Inserted));
        assert!(store.find_by_name("class", "ClassLinkage").unwrap().is_some());
    }
}
