//! Content analyzer collaborator for extraction and report steps.
//!
//! Categorizes workspace files by extension and extracts naive keywords
//! from file names. Read-only: every path goes through the sandbox and
//! nothing is written. Output ordering is deterministic.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::error::{CoworkError, ErrorCategory, ErrorContext};
use crate::core::sandbox;

const MAX_KEYWORDS: usize = 10;

/// Coarse file categories used by reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Document,
    Image,
    Spreadsheet,
    Code,
    Other,
}

impl FileCategory {
    fn from_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "pdf" | "txt" | "md" | "doc" | "docx" | "rtf" => FileCategory::Document,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" => FileCategory::Image,
            "csv" | "tsv" | "xls" | "xlsx" | "ods" => FileCategory::Spreadsheet,
            "rs" | "py" | "js" | "ts" | "sh" | "toml" | "json" | "yaml" | "yml" => {
                FileCategory::Code
            }
            _ => FileCategory::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Document => "document",
            FileCategory::Image => "image",
            FileCategory::Spreadsheet => "spreadsheet",
            FileCategory::Code => "code",
            FileCategory::Other => "other",
        }
    }
}

/// One analyzed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub name: String,
    pub category: FileCategory,
    pub size_bytes: u64,
}

/// Deterministic summary of a directory's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub files: Vec<FileSummary>,
    /// Category label to file count, in label order.
    pub categories: BTreeMap<String, usize>,
    /// Most frequent file-name words, by count then lexicographic.
    pub keywords: Vec<String>,
}

/// Analyze the files directly under `path` (workspace root when `None`).
#[instrument(skip_all, fields(path = path.unwrap_or(".")))]
pub fn analyze(workspace: &Path, path: Option<&str>) -> Result<AnalysisSummary, CoworkError> {
    let subpath = path.unwrap_or(".");
    let target = sandbox::resolve(workspace, subpath).map_err(|err| {
        CoworkError::new(
            ErrorCategory::Safety,
            err.to_string(),
            ErrorContext::new("extractData")
                .with_workspace(workspace)
                .with_file(subpath),
        )
    })?;

    let entries = fs::read_dir(&target).map_err(|err| {
        CoworkError::new(
            ErrorCategory::Filesystem,
            format!("extractData failed for '{subpath}': {err}"),
            ErrorContext::new("extractData")
                .with_workspace(workspace)
                .with_file(subpath),
        )
        .retryable(false)
    })?;

    let mut files = Vec::new();
    let mut word_counts: BTreeMap<String, usize> = BTreeMap::new();
    for entry in entries.filter_map(|entry| entry.ok()) {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        for word in name_words(&name) {
            *word_counts.entry(word).or_insert(0) += 1;
        }
        files.push(FileSummary {
            category: FileCategory::from_name(&name),
            size_bytes: metadata.len(),
            name,
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));

    let mut categories = BTreeMap::new();
    for file in &files {
        *categories.entry(file.category.as_str().to_string()).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = word_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let keywords = ranked
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(word, _)| word)
        .collect();

    debug!(files = files.len(), "analyzed directory");
    Ok(AnalysisSummary {
        files,
        categories,
        keywords,
    })
}

/// Lowercased alphabetic words from a file stem, minimum three characters.
fn name_words(name: &str) -> Vec<String> {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    stem.split(|c: char| !c.is_alphabetic())
        .filter(|word| word.len() >= 3)
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_and_counts_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("receipt1.pdf"), "pdf").expect("write");
        fs::write(temp.path().join("receipt2.pdf"), "pdf").expect("write");
        fs::write(temp.path().join("photo.png"), "png").expect("write");
        fs::create_dir(temp.path().join("subdir")).expect("mkdir");

        let summary = analyze(temp.path(), None).expect("analyze");
        assert_eq!(summary.files.len(), 3);
        assert_eq!(summary.categories.get("document"), Some(&2));
        assert_eq!(summary.categories.get("image"), Some(&1));
    }

    #[test]
    fn keywords_rank_by_frequency_then_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("invoice-march.pdf"), "a").expect("write");
        fs::write(temp.path().join("invoice-april.pdf"), "a").expect("write");
        fs::write(temp.path().join("photo.png"), "a").expect("write");

        let summary = analyze(temp.path(), None).expect("analyze");
        assert_eq!(summary.keywords[0], "invoice");
        assert!(summary.keywords.contains(&"photo".to_string()));
    }

    #[test]
    fn analyze_outside_workspace_is_a_safety_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = analyze(temp.path(), Some("../elsewhere")).expect_err("must fail");
        assert_eq!(err.category, ErrorCategory::Safety);
    }

    #[test]
    fn analyze_missing_directory_is_a_filesystem_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = analyze(temp.path(), Some("missing")).expect_err("must fail");
        assert_eq!(err.category, ErrorCategory::Filesystem);
    }
}
