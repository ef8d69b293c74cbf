//! Forward pass of the collection aggregation: invert every entity's
//! declared `Collections[].Name` into a collection -> members map.

use crate::constants::{COLLECTION_ENTITIES_REF, REF_NAME_FIELD, RESERVED_FILES};
use crate::error::IngestResult;
use crate::process::list_json_files;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub type CollectionMembership = BTreeMap<String, Vec<String>>;

/// Collection names declared by one entity document.
pub fn declared_collections(doc: &Value) -> Vec<String> {
    doc.get("Collections")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("Name").and_then(Value::as_str))
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn membership_document(membership: &CollectionMembership) -> Value {
    let mut doc = Map::new();
    doc.insert(
        REF_NAME_FIELD.to_string(),
        Value::String(COLLECTION_ENTITIES_REF.to_string()),
    );
    for (collection, members) in membership {
        doc.insert(
            collection.clone(),
            Value::Array(members.iter().cloned().map(Value::String).collect()),
        );
    }
    Value::Object(doc)
}

/// Scan the entity records of `dir` and write the membership singleton to
/// `dir/<file_name>`. Members are named after their record file.
pub fn dump_collection(dir: &Path, file_name: &str) -> IngestResult<(PathBuf, CollectionMembership)> {
    let mut membership = CollectionMembership::new();

    for path in list_json_files(dir, &RESERVED_FILES)? {
        let member = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };
        let doc: Value = match serde_json::from_slice(&fs::read(&path)?) {
            Ok(doc) => doc,
            Err(e) => {
                log_process_warn!("{} @ {}, skipped for membership", e, path.display());
                continue;
            }
        };
        for collection in declared_collections(&doc) {
            membership.entry(collection).or_default().push(member.clone());
        }
    }

    let target = dir.join(file_name);
    fs::write(&target, serde_json::to_vec(&membership_document(&membership))?)?;
    log_process_info!(
        "dumped membership of {} collections into {}",
        membership.len(),
        target.display()
    );
    Ok((target, membership))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COLLECTION_ENTITIES_FILE;

    #[test]
    fn inverts_declared_memberships() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("E1.json"),
            r#"{"Entity":"E1","Collections":[{"Name":"C1"},{"Name":"C2"}]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("E2.json"),
            r#"{"Entity":"E2","Collections":[{"Name":"C1"},{"Name":""}]}"#,
        )
        .unwrap();
        fs::write(dir.path().join("E3.json"), r#"{"Entity":"E3"}"#).unwrap();

        let (path, membership) = dump_collection(dir.path(), COLLECTION_ENTITIES_FILE).unwrap();
        assert_eq!(membership["C1"], vec!["E1", "E2"]);
        assert_eq!(membership["C2"], vec!["E1"]);
        assert_eq!(membership.len(), 2);

        let doc: Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(doc["RefName"], "CollectionEntities");
        assert_eq!(doc["C1"], serde_json::json!(["E1", "E2"]));
    }

    #[test]
    fn rerun_ignores_its_own_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("E1.json"),
            r#"{"Entity":"E1","Collections":[{"Name":"C1"}]}"#,
        )
        .unwrap();

        dump_collection(dir.path(), COLLECTION_ENTITIES_FILE).unwrap();
        let (_, again) = dump_collection(dir.path(), COLLECTION_ENTITIES_FILE).unwrap();
        assert_eq!(again["C1"], vec!["E1"]);
    }
}
