//! ClassLinker: superclass chains and direct children, derived from each
//! record's `Metadata.Superclass` declaration.
//!
//! `Superclass` lists a record's ancestors root first, so the nearest
//! superclass is the last entry.

use crate::constants::{BRANCH_SEPARATOR, CLASS_LINKAGE_REF, REF_NAME_FIELD, RESERVED_FILES};
use crate::error::IngestResult;
use crate::process::list_json_files;
use crate::record::entity_name;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClassNode {
    pub branch: String,
    pub children: Vec<String>,
}

/// Entity name to its linkage, for every record of one output tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassLinkage {
    pub nodes: BTreeMap<String, ClassNode>,
}

impl ClassLinkage {
    /// Derive linkage from `(entity, superclasses)` declarations.
    pub fn build<I>(declarations: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let declarations: Vec<(String, Vec<String>)> = declarations.into_iter().collect();
        let mut nodes: BTreeMap<String, ClassNode> = declarations
            .iter()
            .map(|(name, supers)| {
                let branch = supers
                    .iter()
                    .map(String::as_str)
                    .chain(std::iter::once(name.as_str()))
                    .collect::<Vec<_>>()
                    .join(BRANCH_SEPARATOR);
                (
                    name.clone(),
                    ClassNode {
                        branch,
                        children: Vec::new(),
                    },
                )
            })
            .collect();

        for (name, supers) in &declarations {
            let Some(parent) = supers.last() else {
                continue;
            };
            match nodes.get_mut(parent) {
                Some(node) => node.children.push(name.clone()),
                None => log_process_warn!(
                    "superclass '{}' of '{}' is not a known entity",
                    parent,
                    name
                ),
            }
        }
        for node in nodes.values_mut() {
            node.children.sort();
            node.children.dedup();
        }

        Self { nodes }
    }

    /// The singleton document, keyed by its reference name.
    pub fn to_document(&self) -> IngestResult<Value> {
        let mut doc = Map::new();
        doc.insert(
            REF_NAME_FIELD.to_string(),
            Value::String(CLASS_LINKAGE_REF.to_string()),
        );
        for (name, node) in &self.nodes {
            doc.insert(name.clone(), serde_json::to_value(node)?);
        }
        Ok(Value::Object(doc))
    }
}

fn declared_superclasses(doc: &Value) -> Vec<String> {
    match doc.pointer("/Metadata/Superclass") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) if !single.is_empty() => vec![single.clone()],
        _ => Vec::new(),
    }
}

/// Derive class linkage for the records of `dir` and write it to
/// `dir/<file_name>`.
pub fn dump_class_linkage(dir: &Path, file_name: &str) -> IngestResult<(PathBuf, ClassLinkage)> {
    let mut declarations = Vec::new();
    for path in list_json_files(dir, &RESERVED_FILES)? {
        let data = fs::read(&path)?;
        match serde_json::from_slice::<Value>(&data) {
            Ok(doc) => match entity_name(&doc) {
                Some(name) => declarations.push((name.to_string(), declared_superclasses(&doc))),
                None => log_process_warn!("entity missing @ {}, not linked", path.display()),
            },
            Err(e) => log_process_warn!("{} @ {}, not linked", e, path.display()),
        }
    }

    let linkage = ClassLinkage::build(declarations);
    let target = dir.join(file_name);
    fs::write(&target, serde_json::to_vec(&linkage.to_document()?)?)?;
    log_process_info!(
        "linked {} classes into {}",
        linkage.nodes.len(),
        target.display()
    );
    Ok((target, linkage))
}
