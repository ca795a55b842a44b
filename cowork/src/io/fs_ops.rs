//! Sandboxed filesystem operations behind the step executor.
//!
//! Every operation resolves its target through [`sandbox::resolve`] before
//! any read or write; a containment failure is classified as a safety error
//! and no side effect happens. Listings are sorted by name so outputs stay
//! deterministic across runs.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::core::error::{CoworkError, ErrorCategory, ErrorContext};
use crate::core::sandbox::{self, OutOfBoundsError};

/// List directory entries, optionally filtered by extension or name pattern.
#[instrument(skip_all, fields(path))]
pub fn read_listing(
    workspace: &Path,
    path: &str,
    extensions: &[String],
    pattern: Option<&str>,
) -> Result<Value, CoworkError> {
    let target = resolve(workspace, path, "readFiles")?;
    let matcher = pattern
        .map(Regex::new)
        .transpose()
        .map_err(|err| {
            CoworkError::new(
                ErrorCategory::Execution,
                format!("invalid pattern: {err}"),
                context("readFiles", workspace).with_file(path),
            )
        })?;

    let entries = fs::read_dir(&target)
        .map_err(|err| fs_error("readFiles", workspace, path, &err))?;

    let mut listed = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| fs_error("readFiles", workspace, path, &err))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let metadata = entry
            .metadata()
            .map_err(|err| fs_error("readFiles", workspace, &name, &err))?;

        if !matches_extension(&name, extensions) {
            continue;
        }
        if let Some(matcher) = &matcher
            && !matcher.is_match(&name)
        {
            continue;
        }

        listed.push(json!({
            "name": name,
            "kind": if metadata.is_dir() { "dir" } else { "file" },
            "sizeBytes": metadata.len(),
        }));
    }
    listed.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

    debug!(count = listed.len(), "listed directory");
    Ok(json!({ "path": path, "entries": listed }))
}

/// Write a file, creating parent directories inside the workspace as needed.
#[instrument(skip_all, fields(path))]
pub fn write_file(workspace: &Path, path: &str, content: &str) -> Result<Value, CoworkError> {
    let target = resolve(workspace, path, "writeFile")?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|err| fs_error("writeFile", workspace, path, &err))?;
    }
    fs::write(&target, content).map_err(|err| fs_error("writeFile", workspace, path, &err))?;

    debug!(bytes = content.len(), "wrote file");
    Ok(json!({ "path": path, "bytesWritten": content.len() }))
}

/// Create one or more directories under the workspace.
#[instrument(skip_all, fields(count = folders.len()))]
pub fn create_folders(workspace: &Path, folders: &[String]) -> Result<Value, CoworkError> {
    // Resolve every folder before creating any, so a single out-of-bounds
    // entry causes no partial side effects.
    let mut targets = Vec::with_capacity(folders.len());
    for folder in folders {
        targets.push((folder, resolve(workspace, folder, "createFolder")?));
    }

    let mut created = Vec::with_capacity(targets.len());
    for (folder, target) in targets {
        fs::create_dir_all(&target)
            .map_err(|err| fs_error("createFolder", workspace, folder, &err))?;
        created.push(folder.clone());
    }

    debug!(?created, "created folders");
    Ok(json!({ "created": created }))
}

/// Rename a file addressed directly or by a name pattern over the workspace
/// root. With a pattern, the first match in name order is renamed.
#[instrument(skip_all)]
pub fn rename_entry(
    workspace: &Path,
    source_path: Option<&str>,
    pattern: Option<&str>,
    destination: &str,
) -> Result<Value, CoworkError> {
    let source = match (source_path, pattern) {
        (Some(source), _) => source.to_string(),
        (None, Some(pattern)) => find_match(workspace, pattern)?,
        (None, None) => {
            return Err(CoworkError::new(
                ErrorCategory::Execution,
                "renameFile requires a source path or pattern",
                context("renameFile", workspace),
            ));
        }
    };

    let from = resolve(workspace, &source, "renameFile")?;
    let to = resolve(workspace, destination, "renameFile")?;
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| fs_error("renameFile", workspace, destination, &err))?;
    }
    fs::rename(&from, &to).map_err(|err| fs_error("renameFile", workspace, &source, &err))?;

    debug!(from = %from.display(), to = %to.display(), "renamed entry");
    Ok(json!({ "from": source, "to": destination }))
}

/// First workspace-root entry whose name matches `pattern`, in name order.
fn find_match(workspace: &Path, pattern: &str) -> Result<String, CoworkError> {
    let matcher = Regex::new(pattern).map_err(|err| {
        CoworkError::new(
            ErrorCategory::Execution,
            format!("invalid pattern: {err}"),
            context("renameFile", workspace),
        )
    })?;

    let entries = fs::read_dir(workspace)
        .map_err(|err| fs_error("renameFile", workspace, ".", &err))?;
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    names
        .into_iter()
        .find(|name| matcher.is_match(name))
        .ok_or_else(|| {
            CoworkError::new(
                ErrorCategory::Filesystem,
                format!("no file matching pattern '{pattern}'"),
                context("renameFile", workspace).with_file(pattern),
            )
            .retryable(false)
        })
}

fn matches_extension(name: &str, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    let Some(ext) = Path::new(name).extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// Resolve through the sandbox, classifying escapes as safety errors.
fn resolve(workspace: &Path, candidate: &str, operation: &str) -> Result<std::path::PathBuf, CoworkError> {
    sandbox::resolve(workspace, candidate).map_err(|err: OutOfBoundsError| {
        CoworkError::new(
            ErrorCategory::Safety,
            err.to_string(),
            context(operation, workspace).with_file(candidate),
        )
    })
}

fn context(operation: &str, workspace: &Path) -> ErrorContext {
    ErrorContext::new(operation).with_workspace(workspace)
}

/// Classify an `io::Error`. Transient kinds stay retryable; a missing file
/// will not appear by retrying.
fn fs_error(operation: &str, workspace: &Path, file: &str, err: &std::io::Error) -> CoworkError {
    use std::io::ErrorKind;
    let retryable = matches!(
        err.kind(),
        ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock
    );
    CoworkError::new(
        ErrorCategory::Filesystem,
        format!("{operation} failed for '{file}': {err}"),
        context(operation, workspace).with_file(file),
    )
    .retryable(retryable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_listing_returns_sorted_entries() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("b.txt"), "b").expect("write");
        fs::write(temp.path().join("a.txt"), "a").expect("write");

        let value = read_listing(temp.path(), ".", &[], None).expect("list");
        let entries = value["entries"].as_array().expect("entries");
        assert_eq!(entries[0]["name"], "a.txt");
        assert_eq!(entries[1]["name"], "b.txt");
    }

    #[test]
    fn read_listing_filters_by_extension() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("receipt.pdf"), "pdf").expect("write");
        fs::write(temp.path().join("note.txt"), "txt").expect("write");

        let value =
            read_listing(temp.path(), ".", &["pdf".to_string()], None).expect("list");
        let entries = value["entries"].as_array().expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["name"], "receipt.pdf");
    }

    #[test]
    fn read_listing_fails_on_missing_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_listing(temp.path(), "missing", &[], None).expect_err("must fail");
        assert_eq!(err.category, ErrorCategory::Filesystem);
        assert!(!err.retryable);
    }

    #[test]
    fn write_file_creates_parents_and_reports_bytes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let value = write_file(temp.path(), "nested/out.txt", "hi").expect("write");
        assert_eq!(value["bytesWritten"], 2);
        let written = fs::read_to_string(temp.path().join("nested/out.txt")).expect("read");
        assert_eq!(written, "hi");
    }

    #[test]
    fn write_outside_workspace_is_a_safety_error_with_no_side_effect() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = write_file(temp.path(), "../escape.txt", "hi").expect_err("must fail");
        assert_eq!(err.category, ErrorCategory::Safety);
        assert!(!temp.path().join("../escape.txt").exists());
    }

    #[test]
    fn create_folders_is_all_or_nothing_on_containment() {
        let temp = tempfile::tempdir().expect("tempdir");
        let folders = vec!["documents".to_string(), "../escape".to_string()];
        let err = create_folders(temp.path(), &folders).expect_err("must fail");
        assert_eq!(err.category, ErrorCategory::Safety);
        assert!(!temp.path().join("documents").exists());
    }

    #[test]
    fn rename_by_pattern_picks_first_match_in_name_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("receipt2.pdf"), "b").expect("write");
        fs::write(temp.path().join("receipt1.pdf"), "a").expect("write");

        let value = rename_entry(
            temp.path(),
            None,
            Some(r"^receipt.*\.pdf$"),
            "documents/receipt.pdf",
        )
        .expect("rename");
        assert_eq!(value["from"], "receipt1.pdf");
        assert!(temp.path().join("documents/receipt.pdf").exists());
        assert!(temp.path().join("receipt2.pdf").exists());
    }

    #[test]
    fn rename_with_no_match_reports_pattern() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = rename_entry(temp.path(), None, Some("^nope$"), "d").expect_err("must fail");
        assert!(err.message.contains("no file matching pattern"));
    }
}
