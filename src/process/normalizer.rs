//! FileNormalizer: names every source file after its declared `Entity`.

use crate::error::{IngestError, IngestResult};
use crate::process::list_json_files;
use crate::record::{entity_name, is_file_safe};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

// Raw input may not parse yet, so fall back to scanning for the key.
static ENTITY_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""Entity"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("static regex")
});

/// Result of a normalization pass.
#[derive(Debug, Default)]
pub struct NormalizeReport {
    /// Destination paths written
    pub copied: Vec<PathBuf>,
    /// Source files without a usable `Entity` value
    pub skipped: Vec<PathBuf>,
    /// Source files whose `Entity` cannot name a file
    pub rejected: Vec<IngestError>,
}

/// Copy every `*.json` file of `src_dir` to `dst_dir/<Entity>.json`.
///
/// Fails the whole pass with a collision error as soon as a destination
/// already exists: two source files claim the same identity and a human has
/// to resolve it.
pub fn normalize_file_names(src_dir: &Path, dst_dir: &Path) -> IngestResult<NormalizeReport> {
    fs::create_dir_all(dst_dir)?;
    let mut report = NormalizeReport::default();

    for path in list_json_files(src_dir, &[])? {
        log_process_debug!("reading...  {}", path.display());
        let data = fs::read(&path)?;

        let Some(entity) = declared_entity(&data) else {
            log_process_warn!("Entity value missing, file@ {}, ignored", path.display());
            report.skipped.push(path);
            continue;
        };

        if !is_file_safe(&entity) {
            let err = IngestError::validation(
                &path,
                format!("Entity '{}' cannot name a file", entity),
            );
            log_process_warn!("{}, ignored", err);
            report.rejected.push(err);
            continue;
        }

        let destination = dst_dir.join(format!("{}.json", entity));
        if destination.exists() {
            let err = IngestError::collision(&destination);
            log_process_warn!("{} (source {})", err, path.display());
            return Err(err);
        }

        log_process_debug!("destination...  {}", destination.display());
        fs::write(&destination, &data)?;
        report.copied.push(destination);
    }

    log_process_info!(
        "normalized {} files from {} into {}",
        report.copied.len(),
        src_dir.display(),
        dst_dir.display()
    );
    Ok(report)
}

fn declared_entity(data: &[u8]) -> Option<String> {
    if let Ok(doc) = serde_json::from_slice::<serde_json::Value>(data) {
        return entity_name(&doc).map(str::to_string);
    }
    let text = String::from_utf8_lossy(data);
    ENTITY_FIELD_RE
        .captures(&text)
        .map(|caps| caps[1].replace("\\\"", "\""))
        .filter(|name| !name.is_empty())
}
