//! Configuration for the ingestion pipeline
//!
//! Values come from defaults, an optional TOML file and `DATADIC_*`
//! environment variables, in that order of precedence (lowest first).

use crate::constants::{
    DEFAULT_IDENTIFIER_WIDTH, DEFAULT_REINGEST_INTERVAL_SECS, DEFAULT_TRANSFORM_EXECUTABLE,
    DEFAULT_TRANSFORM_TIMEOUT_SECS, PATH_VAL_DIR,
};
use crate::error::{IngestError, IngestResult};
use crate::record::{RecordKind, ValueKind};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for an ingestion node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Root of the data tree (`original`, `renamed`, `out`, `err`, inbound areas)
    pub data_root: PathBuf,
    /// Path of the sled database backing the document store
    pub storage_path: PathBuf,
    /// External transform executable, run without arguments
    pub transform_executable: PathBuf,
    /// Hard timeout for the transform step in seconds
    pub transform_timeout_secs: u64,
    /// Period of scheduled re-ingestion in seconds
    pub reingest_interval_secs: u64,
    /// Width identifiers are zero-padded to
    pub identifier_width: usize,
    /// Default log level
    pub log_level: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
            storage_path: PathBuf::from("./data/db"),
            transform_executable: PathBuf::from(DEFAULT_TRANSFORM_EXECUTABLE),
            transform_timeout_secs: DEFAULT_TRANSFORM_TIMEOUT_SECS,
            reingest_interval_secs: DEFAULT_REINGEST_INTERVAL_SECS,
            identifier_width: DEFAULT_IDENTIFIER_WIDTH,
            log_level: "INFO".to_string(),
        }
    }
}

impl IngestionConfig {
    /// Create a config rooted at `data_root`, storing the database beneath it
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        let data_root = data_root.into();
        Self {
            storage_path: data_root.join("db"),
            data_root,
            ..Default::default()
        }
    }

    /// Load a config from a TOML file. Missing keys fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> IngestResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| {
            IngestError::configuration_error(format!(
                "Failed to parse {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Create a config from defaults and environment variables
    pub fn from_env() -> IngestResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `DATADIC_*` environment overrides on top of this config
    pub fn with_env_overrides(self) -> IngestResult<Self> {
        self.with_overrides_from(|name| env::var(name).ok())
    }

    /// Apply `DATADIC_*` overrides read through `lookup`
    pub fn with_overrides_from<F>(mut self, lookup: F) -> IngestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("DATADIC_DATA_ROOT") {
            self.data_root = PathBuf::from(root);
        }
        if let Some(path) = lookup("DATADIC_STORAGE_PATH") {
            self.storage_path = PathBuf::from(path);
        }
        if let Some(exe) = lookup("DATADIC_TRANSFORM_EXE") {
            self.transform_executable = PathBuf::from(exe);
        }
        if let Some(secs) = parse_override(&lookup, "DATADIC_TRANSFORM_TIMEOUT_SECS")? {
            self.transform_timeout_secs = secs;
        }
        if let Some(secs) = parse_override(&lookup, "DATADIC_REINGEST_INTERVAL_SECS")? {
            self.reingest_interval_secs = secs;
        }
        if let Some(width) = parse_override(&lookup, "DATADIC_IDENTIFIER_WIDTH")? {
            self.identifier_width = width;
        }
        if let Some(level) = lookup("DATADIC_LOG_LEVEL") {
            self.log_level = level;
        }
        self.validate()?;
        Ok(self)
    }

    /// Environment handed to the transform executable so it processes the
    /// same data tree the loaders read.
    pub fn transform_env(&self) -> Vec<(&'static str, String)> {
        vec![
            ("DATADIC_DATA_ROOT", self.data_root.display().to_string()),
            ("DATADIC_IDENTIFIER_WIDTH", self.identifier_width.to_string()),
            ("DATADIC_LOG_LEVEL", self.log_level.clone()),
        ]
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.transform_timeout_secs == 0 {
            return Err(IngestError::configuration_error(
                "transform_timeout_secs must be greater than 0",
            ));
        }
        if self.reingest_interval_secs == 0 {
            return Err(IngestError::configuration_error(
                "reingest_interval_secs must be greater than 0",
            ));
        }
        if self.identifier_width == 0 {
            return Err(IngestError::configuration_error(
                "identifier_width must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn transform_timeout(&self) -> Duration {
        Duration::from_secs(self.transform_timeout_secs)
    }

    pub fn reingest_interval(&self) -> Duration {
        Duration::from_secs(self.reingest_interval_secs)
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_root)
    }
}

/// Load the config file at `path` if given and present, then apply
/// environment overrides.
pub fn load_ingestion_config(path: Option<&Path>) -> IngestResult<IngestionConfig> {
    let base = match path {
        Some(path) if path.exists() => IngestionConfig::from_file(path)?,
        Some(path) => {
            log::warn!("config file {} not found, using defaults", path.display());
            IngestionConfig::default()
        }
        None => IngestionConfig::default(),
    };
    base.with_env_overrides()
}

fn parse_override<T, F>(lookup: &F, name: &str) -> IngestResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            IngestError::configuration_error(format!("{} is invalid ({}): {}", name, raw, e))
        }),
        None => Ok(None),
    }
}

/// Directory layout of the data tree.
///
/// ```text
/// data/original(/collections)   raw input
/// data/renamed(/collections)    normalized, also the "existing" area
/// data/out(/collections)        repaired records, derived singletons
///     .../path_val              path-value documents
/// data/err(/collections)        quarantine
/// data/{entities,collections}/{text,html}   inbound staging
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn original(&self, kind: RecordKind) -> PathBuf {
        self.with_kind(self.root.join("original"), kind)
    }

    pub fn renamed(&self, kind: RecordKind) -> PathBuf {
        self.with_kind(self.root.join("renamed"), kind)
    }

    /// Canonical area approved records are promoted into.
    pub fn existing(&self, kind: RecordKind) -> PathBuf {
        self.renamed(kind)
    }

    pub fn out(&self, kind: RecordKind) -> PathBuf {
        self.with_kind(self.root.join("out"), kind)
    }

    pub fn path_values(&self, kind: RecordKind) -> PathBuf {
        self.out(kind).join(PATH_VAL_DIR)
    }

    pub fn err(&self, kind: RecordKind) -> PathBuf {
        self.with_kind(self.root.join("err"), kind)
    }

    pub fn err_root(&self) -> PathBuf {
        self.root.join("err")
    }

    pub fn inbound(&self, kind: RecordKind, value_kind: ValueKind) -> PathBuf {
        let base = match kind {
            RecordKind::Entity => self.root.join("entities"),
            RecordKind::Collection => self.root.join("collections"),
        };
        base.join(value_kind.as_str())
    }

    fn with_kind(&self, base: PathBuf, kind: RecordKind) -> PathBuf {
        match kind {
            RecordKind::Entity => base,
            RecordKind::Collection => base.join("collections"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_constants() {
        let config = IngestionConfig::default();
        assert_eq!(config.transform_timeout(), Duration::from_secs(5));
        assert_eq!(config.reingest_interval(), Duration::from_secs(3600));
        assert_eq!(config.identifier_width, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datadic.toml");
        std::fs::write(
            &path,
            "data_root = \"/srv/dic\"\nreingest_interval_secs = 60\n",
        )
        .unwrap();

        let config = IngestionConfig::from_file(&path).unwrap();
        assert_eq!(config.data_root, PathBuf::from("/srv/dic"));
        assert_eq!(config.reingest_interval_secs, 60);
        assert_eq!(config.transform_timeout_secs, 5);
    }

    #[test]
    fn transform_env_resolves_the_same_layout() {
        let node = IngestionConfig {
            identifier_width: 6,
            ..IngestionConfig::new("/srv/dic")
        };
        let env: std::collections::HashMap<_, _> = node.transform_env().into_iter().collect();

        let child = IngestionConfig::default()
            .with_overrides_from(|name| env.get(name).cloned())
            .unwrap();

        assert_eq!(child.layout(), node.layout());
        assert_eq!(child.identifier_width, 6);
    }

    #[test]
    fn bad_override_is_a_configuration_error() {
        let result = IngestionConfig::default().with_overrides_from(|name| {
            (name == "DATADIC_IDENTIFIER_WIDTH").then(|| "wide".to_string())
        });
        assert!(matches!(result, Err(IngestError::Configuration(_))));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = IngestionConfig {
            transform_timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(IngestError::Configuration(_))
        ));
    }

    #[test]
    fn layout_nests_collections_under_each_area() {
        let layout = DataLayout::new("data");
        assert_eq!(layout.renamed(RecordKind::Entity), PathBuf::from("data/renamed"));
        assert_eq!(
            layout.renamed(RecordKind::Collection),
            PathBuf::from("data/renamed/collections")
        );
        assert_eq!(
            layout.path_values(RecordKind::Collection),
            PathBuf::from("data/out/collections/path_val")
        );
        assert_eq!(layout.existing(RecordKind::Entity), layout.renamed(RecordKind::Entity));
        assert_eq!(
            layout.inbound(RecordKind::Entity, ValueKind::Html),
            PathBuf::from("data/entities/html")
        );
    }
}
