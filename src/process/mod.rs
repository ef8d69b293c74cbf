//! The transform step: everything between raw source files and the
//! directories the loaders read.
//!
//! For each record kind (entities first, then collections) the output and
//! quarantine directories are emptied, the renamed corpus is repaired, and
//! the derived artifacts are recomputed from the repaired files.

pub mod class_link;
pub mod collection;
pub mod flatten;
pub mod normalizer;
pub mod repair;

use crate::config::DataLayout;
use crate::constants::{
    CLASS_LINK_FILE, COLLECTION_ENTITIES_FILE, COLLECTION_TYPES, DEFAULT_IDENTIFIER_WIDTH,
    ENTITY_TYPES,
};
use crate::error::IngestResult;
use crate::record::{field_as_string, RecordKind, ValueKind};
use std::fs;
use std::path::{Path, PathBuf};

pub use class_link::{dump_class_linkage, ClassLinkage, ClassNode};
pub use collection::{dump_collection, CollectionMembership};
pub use flatten::{flatten, flatten_dir, path_value_document};
pub use normalizer::normalize_file_names;
pub use repair::{RepairOptions, Repairer};

/// Sorted `*.json` files directly inside `dir`, minus the `exclude` names.
/// A missing directory has no files.
pub fn list_json_files(dir: &Path, exclude: &[&str]) -> IngestResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(".json") && !exclude.contains(&name.as_ref()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Delete the files directly inside `dir`, keeping subdirectories.
pub fn clear_files_in(dir: &Path) -> IngestResult<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn holds_files(dir: &Path) -> IngestResult<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() || holds_files(&entry.path())? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Re-derive the renamed corpus from `original` first.
    pub whole: bool,
    pub identifier_width: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            whole: false,
            identifier_width: DEFAULT_IDENTIFIER_WIDTH,
        }
    }
}

/// Per-kind outcome of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct KindSummary {
    pub repaired: usize,
    pub quarantined: Vec<PathBuf>,
    pub path_values: usize,
    pub classes: usize,
    /// Only computed for entities.
    pub collections: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub entities: KindSummary,
    pub collections: KindSummary,
}

impl PipelineReport {
    pub fn quarantined_count(&self) -> usize {
        self.entities.quarantined.len() + self.collections.quarantined.len()
    }
}

/// Run the whole transform step over `layout`.
///
/// Collision errors from the normalizer and IO errors abort the run;
/// per-file validation failures end up in quarantine.
pub fn run_pipeline(layout: &DataLayout, options: PipelineOptions) -> IngestResult<PipelineReport> {
    if options.whole {
        for kind in RecordKind::ALL {
            let renamed = layout.renamed(kind);
            for path in list_json_files(&renamed, &[])? {
                fs::remove_file(path)?;
            }
            normalize_file_names(&layout.original(kind), &renamed)?;
            check_types(&renamed, kind)?;
        }
    }

    let repairer = Repairer::new(RepairOptions {
        identifier_width: options.identifier_width,
        value_kind: ValueKind::Text,
    });

    let mut report = PipelineReport::default();
    for kind in RecordKind::ALL {
        let summary = process_kind(layout, kind, &repairer)?;
        match kind {
            RecordKind::Entity => report.entities = summary,
            RecordKind::Collection => report.collections = summary,
        }
    }

    let err_root = layout.err_root();
    if err_root.exists() && !holds_files(&err_root)? {
        fs::remove_dir_all(&err_root)?;
    }

    log_process_info!(
        "pipeline finished: {} entities, {} collections, {} quarantined",
        report.entities.repaired,
        report.collections.repaired,
        report.quarantined_count()
    );
    Ok(report)
}

fn process_kind(layout: &DataLayout, kind: RecordKind, repairer: &Repairer) -> IngestResult<KindSummary> {
    let (renamed, out, err) = (layout.renamed(kind), layout.out(kind), layout.err(kind));
    clear_files_in(&out)?;
    clear_files_in(&err)?;

    let repaired = repairer.repair_dir(&renamed, &out, &err)?;
    let mut quarantined: Vec<PathBuf> = repaired
        .quarantined
        .iter()
        .map(|q| q.quarantined.clone())
        .collect();

    // Records the flattener rejects are quarantined too, so that no derived
    // artifact mentions them.
    let flattened = flatten_dir(&out, &layout.path_values(kind))?;
    for (path, err_detail) in &flattened.failed {
        let Some(name) = path.file_name() else {
            continue;
        };
        let source = renamed.join(name);
        fs::create_dir_all(&err)?;
        let target = err.join(name);
        if source.exists() {
            fs::copy(&source, &target)?;
        } else {
            fs::copy(path, &target)?;
        }
        fs::remove_file(path)?;
        log_process_warn!("{}, quarantined", err_detail);
        quarantined.push(target);
    }
    clear_stale_path_values(layout, kind, &flattened.written)?;

    let (_, linkage) = dump_class_linkage(&out, CLASS_LINK_FILE)?;
    let collections = match kind {
        RecordKind::Entity => Some(dump_collection(&out, COLLECTION_ENTITIES_FILE)?.1.len()),
        RecordKind::Collection => None,
    };

    Ok(KindSummary {
        repaired: repaired.repaired.len() - flattened.failed.len(),
        quarantined,
        path_values: flattened.written.len(),
        classes: linkage.nodes.len(),
        collections,
    })
}

fn clear_stale_path_values(layout: &DataLayout, kind: RecordKind, written: &[PathBuf]) -> IngestResult<()> {
    for path in list_json_files(&layout.path_values(kind), &[])? {
        if !written.contains(&path) {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

fn check_types(dir: &Path, kind: RecordKind) -> IngestResult<()> {
    let expected: &[&str] = match kind {
        RecordKind::Entity => &ENTITY_TYPES,
        RecordKind::Collection => &COLLECTION_TYPES,
    };
    for path in list_json_files(dir, &[])? {
        let Ok(doc) = serde_json::from_slice::<serde_json::Value>(&fs::read(&path)?) else {
            continue;
        };
        let declared = field_as_string(&doc, "Metadata.Type");
        if !expected.contains(&declared.as_str()) {
            log_process_warn!(
                "Metadata.Type '{}' @ {} is not one of {:?}",
                declared,
                path.display(),
                expected
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn whole_run_derives_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        write(
            &layout.original(RecordKind::Entity).join("raw-1.json"),
            r#"{"Entity":"E1","Collections":[{"Name":"C1"}],"Metadata":{"Identifier":"1","Type":"Element","Superclass":[]}}"#,
        );
        write(
            &layout.original(RecordKind::Collection).join("raw-c.json"),
            r#"{"Entity":"C1","URL":[],"Metadata":{"Identifier":"2","Type":"Collection"}}"#,
        );

        let report = run_pipeline(&layout, PipelineOptions { whole: true, ..Default::default() }).unwrap();
        assert_eq!(report.entities.repaired, 1);
        assert_eq!(report.collections.repaired, 1);
        assert_eq!(report.entities.collections, Some(1));
        assert_eq!(report.quarantined_count(), 0);

        let out = layout.out(RecordKind::Entity);
        assert!(out.join("E1.json").exists());
        assert!(out.join(CLASS_LINK_FILE).exists());
        assert!(out.join(COLLECTION_ENTITIES_FILE).exists());
        assert!(layout.path_values(RecordKind::Entity).join("E1.json").exists());
        assert!(layout.path_values(RecordKind::Collection).join("C1.json").exists());
        assert!(!layout.out(RecordKind::Collection).join(COLLECTION_ENTITIES_FILE).exists());
        assert!(!layout.err_root().exists());

        let e1: Value = serde_json::from_slice(&fs::read(out.join("E1.json")).unwrap()).unwrap();
        assert_eq!(e1["Metadata"]["Identifier"], "00000001");
    }

    #[test]
    fn collision_stops_before_processing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let original = layout.original(RecordKind::Entity);
        write(&original.join("a.json"), r#"{"Entity":"Dup"}"#);
        write(&original.join("b.json"), r#"{"Entity":"Dup"}"#);

        let err = run_pipeline(&layout, PipelineOptions { whole: true, ..Default::default() }).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Collision);
        assert!(!layout.out(RecordKind::Entity).exists());
    }

    #[test]
    fn rerun_drops_stale_outputs_and_keeps_quarantine_tree_when_used() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let renamed = layout.renamed(RecordKind::Entity);
        write(&renamed.join("Good.json"), r#"{"Entity":"Good","Metadata":{"Identifier":"3"}}"#);
        write(&renamed.join("Gone.json"), r#"{"Entity":"Gone","Metadata":{"Identifier":"4"}}"#);
        run_pipeline(&layout, PipelineOptions::default()).unwrap();

        fs::remove_file(renamed.join("Gone.json")).unwrap();
        write(&renamed.join("Bad.json"), "{\"Entity\":\"Bad\",\"Metadata\":{\"Identifier\":\"x\"}}");
        let report = run_pipeline(&layout, PipelineOptions::default()).unwrap();

        let out = layout.out(RecordKind::Entity);
        assert!(!out.join("Gone.json").exists());
        assert!(!layout.path_values(RecordKind::Entity).join("Gone.json").exists());
        assert_eq!(report.entities.quarantined, vec![layout.err(RecordKind::Entity).join("Bad.json")]);
        assert!(layout.err(RecordKind::Entity).join("Bad.json").exists());
    }

    #[test]
    fn lists_only_json_files() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("b.json"), "{}");
        write(&dir.path().join("a.json"), "{}");
        write(&dir.path().join("notes.txt"), "");
        write(&dir.path().join("class-link.json"), "{}");
        fs::create_dir_all(dir.path().join("nested.json")).unwrap();

        let files = list_json_files(dir.path(), &[CLASS_LINK_FILE]).unwrap();
        assert_eq!(files, vec![dir.path().join("a.json"), dir.path().join("b.json")]);
        assert!(list_json_files(&dir.path().join("missing"), &[]).unwrap().is_empty());
    }
}
