//! PathFlattener: one flat `path -> value` document per record, used by the
//! query layer for substring search across every field.

use crate::constants::{DOT_SENTINEL, ENTITY_FIELD, RESERVED_FILES};
use crate::error::{IngestError, IngestResult};
use crate::process::list_json_files;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct FlattenReport {
    pub written: Vec<PathBuf>,
    /// Records that could not be flattened; each error is file-scoped.
    pub failed: Vec<(PathBuf, IngestError)>,
}

/// Flatten nested objects and arrays into dot-joined leaf paths. Array
/// elements are addressed by index. Leaves are coerced to strings; null
/// becomes the empty string.
pub fn flatten(doc: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    flatten_into(doc, String::new(), &mut pairs);
    pairs
}

fn flatten_into(value: &Value, prefix: String, pairs: &mut Vec<(String, String)>) {
    let child = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", prefix, key)
        }
    };
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                flatten_into(v, child(key), pairs);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_into(v, child(&i.to_string()), pairs);
            }
        }
        Value::String(s) => pairs.push((prefix, s.clone())),
        Value::Null => pairs.push((prefix, String::new())),
        other => pairs.push((prefix, other.to_string())),
    }
}

/// Build the path-value document for one record.
///
/// Literal dots in paths are replaced with the sentinel since the store uses
/// dots as its field-path separator.
pub fn path_value_document(doc: &Value) -> Result<(String, Value), String> {
    let mut out = Map::new();
    for (path, value) in flatten(doc) {
        out.insert(path.replace('.', DOT_SENTINEL), Value::String(value));
    }

    let entity = match out.get(ENTITY_FIELD) {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => return Err("entity missing".to_string()),
    };

    let encoded = serde_json::to_string(&out).map_err(|e| e.to_string())?;
    let reparsed: Value =
        serde_json::from_str(&encoded).map_err(|_| "invalid path-value json".to_string())?;
    Ok((entity, reparsed))
}

/// Write `<out_dir>/<Entity>.json` for every record of `in_dir`, skipping
/// the reserved derived files.
pub fn flatten_dir(in_dir: &Path, out_dir: &Path) -> IngestResult<FlattenReport> {
    fs::create_dir_all(out_dir)?;
    let mut report = FlattenReport::default();

    for path in list_json_files(in_dir, &RESERVED_FILES)? {
        let data = fs::read(&path)?;
        let result = serde_json::from_slice::<Value>(&data)
            .map_err(|e| e.to_string())
            .and_then(|doc| path_value_document(&doc));

        match result {
            Ok((entity, doc)) => {
                let target = out_dir.join(format!("{}.json", entity));
                fs::write(&target, serde_json::to_vec(&doc)?)?;
                report.written.push(target);
            }
            Err(message) => {
                log_process_warn!("{} @ {}", message, path.display());
                report
                    .failed
                    .push((path.clone(), IngestError::validation(path, message)));
            }
        }
    }

    log_process_info!(
        "dumped {} path-value documents into {}",
        report.written.len(),
        out_dir.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_metadata() {
        let (entity, doc) =
            path_value_document(&json!({"Entity": "Foo", "Metadata": {"Type": "Element"}}))
                .unwrap();
        assert_eq!(entity, "Foo");
        assert_eq!(doc["Metadata[dot]Type"], "Element");
        assert_eq!(doc["Entity"], "Foo");

        let encoded = serde_json::to_string(&doc).unwrap();
        assert!(serde_json::from_str::<Value>(&encoded).is_ok());
    }

    #[test]
    fn arrays_use_indices_and_leaves_become_strings() {
        let pairs = flatten(&json!({
            "Entity": "A",
            "SIF": [{"XPath": ["x/y", "z"]}],
            "Count": 3,
            "Flag": true,
            "Gone": null,
            "Empty": []
        }));
        assert!(pairs.contains(&("SIF.0.XPath.1".to_string(), "z".to_string())));
        assert!(pairs.contains(&("Count".to_string(), "3".to_string())));
        assert!(pairs.contains(&("Flag".to_string(), "true".to_string())));
        assert!(pairs.contains(&("Gone".to_string(), String::new())));
        assert!(!pairs.iter().any(|(path, _)| path.starts_with("Empty")));
    }

    #[test]
    fn quotes_survive_reassembly() {
        let (_, doc) =
            path_value_document(&json!({"Entity": "A", "Definition": "say \"hi\""})).unwrap();
        assert_eq!(doc["Definition"], "say \"hi\"");
    }

    #[test]
    fn missing_entity_fails_only_that_file() {
        let dir = tempfile::tempdir().unwrap();
        let (input, out) = (dir.path().join("out"), dir.path().join("out/path_val"));
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("A.json"), r#"{"Entity":"A"}"#).unwrap();
        fs::write(input.join("B.json"), r#"{"Definition":"no name"}"#).unwrap();
        fs::write(input.join("class-link.json"), r#"{"RefName":"ClassLinkage"}"#).unwrap();

        let report = flatten_dir(&input, &out).unwrap();
        assert_eq!(report.written, vec![out.join("A.json")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, input.join("B.json"));
        assert!(report.failed[0].1.kind().is_file_scoped());
        assert!(!out.join("ClassLinkage.json").exists());
    }
}
