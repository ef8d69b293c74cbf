//! Dictionary record shapes.
//!
//! A record is either an entity or a collection. There is no stored tag;
//! the kind is whichever shape the document parses against.

use crate::constants::COLLECTION_TYPES;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Entity,
    Collection,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Entity, RecordKind::Collection];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Entity => "entity",
            RecordKind::Collection => "collection",
        }
    }

    /// Detect the kind of a parsed document from its shape. A document both
    /// shapes accept is a collection only when `Metadata.Type` says so.
    pub fn detect(doc: &Value) -> Option<RecordKind> {
        let entity = serde_json::from_value::<EntityRecord>(doc.clone()).is_ok();
        let collection = serde_json::from_value::<CollectionRecord>(doc.clone()).is_ok();
        match (entity, collection) {
            (true, true) => {
                let declared = field_as_string(doc, "Metadata.Type");
                if COLLECTION_TYPES.contains(&declared.as_str()) {
                    Some(RecordKind::Collection)
                } else {
                    Some(RecordKind::Entity)
                }
            }
            (true, false) => Some(RecordKind::Entity),
            (false, true) => Some(RecordKind::Collection),
            (false, false) => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entity" => Ok(RecordKind::Entity),
            "collection" => Ok(RecordKind::Collection),
            other => Err(format!("kind can only be [entity collection], got '{}'", other)),
        }
    }
}

/// Whether a record's values are plain text or rich markup.
///
/// Declared by whoever supplies the record. Markup records skip identifier
/// validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    Text,
    Html,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Html => "html",
        }
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, ValueKind::Html)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SifReference {
    #[serde(rename = "XPath")]
    pub xpath: Vec<String>,
    pub definition: String,
    pub commentary: String,
    pub datestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct OtherStandard {
    pub standard: String,
    pub link: Vec<String>,
    pub path: Vec<String>,
    pub definition: String,
    pub commentary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LegalDefinition {
    pub legislation_name: String,
    pub citation: String,
    pub link: String,
    pub definition: String,
    pub commentary: String,
    pub datestamp: String,
}

/// One of an entity's declared collection memberships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CollectionRef {
    pub name: String,
    pub description: String,
    pub standard: String,
    pub elements: Vec<String>,
    pub business_rules: Vec<String>,
    pub definition_modification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EntityMetadata {
    pub identifier: String,
    #[serde(rename = "Type")]
    pub kind: String,
    pub expected_attributes: Vec<String>,
    pub superclass: Vec<String>,
    pub crossref_entities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase", deny_unknown_fields)]
pub struct EntityRecord {
    pub entity: String,
    pub other_names: Vec<String>,
    pub definition: String,
    #[serde(rename = "SIF")]
    pub sif: Vec<SifReference>,
    pub other_standards: Vec<OtherStandard>,
    pub legal_definitions: Vec<LegalDefinition>,
    pub collections: Vec<CollectionRef>,
    pub metadata: EntityMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CollectionMetadata {
    pub identifier: String,
    #[serde(rename = "Type")]
    pub kind: String,
}

/// A collection as persisted. `Entities` is derived at load time from the
/// collection-membership singleton and never comes from the source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase", deny_unknown_fields)]
pub struct CollectionRecord {
    pub entity: String,
    pub definition: String,
    #[serde(rename = "URL")]
    pub url: Vec<String>,
    pub metadata: CollectionMetadata,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
}

/// Top-level `Entity` value of a document, if it is a non-empty string.
pub fn entity_name(doc: &Value) -> Option<&str> {
    doc.get("Entity")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
}

/// Name a record is filed and keyed under. A markup `Entity` wrapped in
/// tags is reduced to its text content.
pub fn record_name(raw: &str, value_kind: ValueKind) -> String {
    if value_kind.is_markup() && raw.starts_with('<') && raw.ends_with('>') {
        TAG_RE.replace_all(raw, "").trim().to_string()
    } else {
        raw.to_string()
    }
}

/// Whether `name` can be used as a file stem inside one directory.
pub fn is_file_safe(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\' || c == '\0')
}

/// String form of a field addressed by a dotted path, the way identity
/// fields are read from files: strings verbatim, numbers and booleans
/// rendered, anything else empty.
pub fn field_as_string(doc: &Value, dotted: &str) -> String {
    let mut current = doc;
    for part in dotted.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    match current {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
