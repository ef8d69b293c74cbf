//! Repairer: heuristically fixes near-valid JSON, pads identifiers and
//! quarantines whatever still fails.
//!
//! The heuristics run in a fixed order:
//! 1. strip literal `\n` / `\r` bytes
//! 2. collapse `</p><p>` into `<br>` and drop the remaining paragraph tags
//! 3. escape double quotes inside tags that carry attributes
//! 4. drop trailing commas before `}` / `]`
//!
//! After that the text must parse as JSON, and `Metadata.Identifier` is
//! zero-padded. Encoding can expose markup that was escaped in the source
//! (`\u003cp\u003e`), so the pass repeats on its own output until the bytes
//! settle. Failures are scoped to the file: its original bytes are copied
//! into the quarantine directory and the batch carries on.

use crate::error::IngestResult;
use crate::process::list_json_files;
use crate::record::{field_as_string, ValueKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

static PARAGRAPH_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</p>\s*<p>").expect("static regex"));
static ATTRIBUTE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[\w\d]+\s[^>]+>").expect("static regex"));
/// Passes a document may take before its output stops changing.
const MAX_PASSES: usize = 4;

static TRAILING_COMMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("static regex"));

#[derive(Debug, Clone, Copy)]
pub struct RepairOptions {
    pub identifier_width: usize,
    /// Markup records are exempt from identifier validation.
    pub value_kind: ValueKind,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            identifier_width: crate::constants::DEFAULT_IDENTIFIER_WIDTH,
            value_kind: ValueKind::Text,
        }
    }
}

/// A file that failed repair, copied verbatim into quarantine.
#[derive(Debug, Clone)]
pub struct QuarantinedFile {
    pub source: PathBuf,
    pub quarantined: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct RepairReport {
    pub repaired: Vec<PathBuf>,
    pub quarantined: Vec<QuarantinedFile>,
    pub skipped_empty: Vec<PathBuf>,
}

impl RepairReport {
    pub fn failure_count(&self) -> usize {
        self.quarantined.len()
    }
}

pub struct Repairer {
    options: RepairOptions,
}

impl Repairer {
    pub fn new(options: RepairOptions) -> Self {
        Self { options }
    }

    /// Repair every `*.json` file of `in_dir` into `out_dir`, quarantining
    /// failures into `err_dir` under their original filename.
    pub fn repair_dir(
        &self,
        in_dir: &Path,
        out_dir: &Path,
        err_dir: &Path,
    ) -> IngestResult<RepairReport> {
        fs::create_dir_all(out_dir)?;
        let mut report = RepairReport::default();

        for (i, path) in list_json_files(in_dir, &[])?.into_iter().enumerate() {
            log_process_debug!("processing... {} --- {}", i, path.display());
            let raw = fs::read(&path)?;
            if raw.is_empty() {
                report.skipped_empty.push(path);
                continue;
            }

            let file_name = match path.file_name() {
                Some(name) => name.to_owned(),
                None => continue,
            };

            match self.repair_bytes(&raw) {
                Ok(repaired) => {
                    let out = out_dir.join(&file_name);
                    fs::write(&out, repaired)?;
                    log_process_debug!("{} is processed & stored", out.display());
                    report.repaired.push(out);
                }
                Err(reason) => {
                    fs::create_dir_all(err_dir)?;
                    let quarantined = err_dir.join(&file_name);
                    fs::write(&quarantined, &raw)?;
                    log_process_warn!("json error@ {}: {}, quarantined", path.display(), reason);
                    report.quarantined.push(QuarantinedFile {
                        source: path,
                        quarantined,
                        reason,
                    });
                }
            }
        }

        log_process_info!(
            "repaired {} files from {}, {} quarantined",
            report.repaired.len(),
            in_dir.display(),
            report.failure_count()
        );
        Ok(report)
    }

    /// Repair one document. Repairing the result again yields the same bytes.
    pub fn repair_bytes(&self, raw: &[u8]) -> Result<Vec<u8>, String> {
        let mut current = self.repair_pass(raw)?;
        for _ in 1..MAX_PASSES {
            let next = self.repair_pass(&current)?;
            if next == current {
                return Ok(current);
            }
            current = next;
        }
        Err(format!("repair did not settle after {} passes", MAX_PASSES))
    }

    /// Run the heuristics, validation and identifier padding once.
    fn repair_pass(&self, raw: &[u8]) -> Result<Vec<u8>, String> {
        let text = String::from_utf8(strip_line_breaks(raw))
            .map_err(|e| format!("not valid UTF-8: {}", e))?;
        let text = collapse_paragraphs(&text);
        let text = escape_quotes_in_tags(&text);
        let text = remove_trailing_commas(&text);

        let mut doc: Value =
            serde_json::from_str(&text).map_err(|e| format!("invalid JSON: {}", e))?;
        pad_identifier(&mut doc, self.options.identifier_width, self.options.value_kind)?;
        serde_json::to_vec(&doc).map_err(|e| format!("failed to encode: {}", e))
    }
}

pub fn strip_line_breaks(data: &[u8]) -> Vec<u8> {
    data.iter()
        .copied()
        .filter(|b| *b != b'\n' && *b != b'\r')
        .collect()
}

pub fn collapse_paragraphs(text: &str) -> String {
    PARAGRAPH_BREAK_RE
        .replace_all(text, "<br>")
        .replace("<p>", "")
        .replace("</p>", "")
}

/// Tags without attributes are left untouched.
pub fn escape_quotes_in_tags(text: &str) -> String {
    ATTRIBUTE_TAG_RE
        .replace_all(text, |caps: &regex::Captures| {
            caps[0].replace('"', "\\\"").replace("\\\\", "\\")
        })
        .into_owned()
}

/// `, }` becomes ` }`: the comma run collapses into one space.
pub fn remove_trailing_commas(text: &str) -> String {
    TRAILING_COMMA_RE.replace_all(text, " $1").into_owned()
}

/// Zero-pad `Metadata.Identifier` to `width` digits.
///
/// Non-numeric identifiers fail the record unless it is a markup record,
/// which is left as is.
pub fn pad_identifier(doc: &mut Value, width: usize, value_kind: ValueKind) -> Result<(), String> {
    let raw = field_as_string(doc, "Metadata.Identifier");
    let id = match raw.trim().parse::<u64>() {
        Ok(id) => id,
        Err(_) if value_kind.is_markup() => return Ok(()),
        Err(_) => return Err(format!("Metadata.Identifier '{}' is not numeric", raw)),
    };

    match doc.get_mut("Metadata").and_then(Value::as_object_mut) {
        Some(metadata) => {
            metadata.insert(
                "Identifier".to_string(),
                Value::String(format!("{:0width$}", id, width = width)),
            );
            Ok(())
        }
        None => Err("Metadata is not an object".to_string()),
    }
}
