//! Corpus loading.
//!
//! Reads plain-text documents from disk. A folder load matches file names
//! against a glob, returns documents in lexicographic path order, and skips
//! files that cannot be read as UTF-8 instead of failing the whole load.

use crate::types::{AppError, Document, LoadReport, Result, SkippedFile};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Load a single UTF-8 text file as one document.
pub async fn load_documents(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Configuration(format!("Cannot read document {}: {}", path.display(), e))
    })?;

    Ok(vec![Document {
        content,
        source: path.display().to_string(),
    }])
}

/// Load every file in `folder` whose name matches `file_pattern`.
///
/// # Errors
///
/// `Configuration` if the folder does not exist, the pattern is invalid, or no
/// document could be loaded. Unreadable files are listed in
/// [`LoadReport::skipped`] and logged.
pub async fn load_documents_from_folder(
    folder: impl AsRef<Path>,
    file_pattern: &str,
) -> Result<LoadReport> {
    let folder = folder.as_ref();
    let pattern = glob::Pattern::new(file_pattern).map_err(|e| {
        AppError::Configuration(format!("Invalid file pattern '{}': {}", file_pattern, e))
    })?;

    if !tokio::fs::try_exists(folder).await.unwrap_or(false) {
        return Err(AppError::Configuration(format!(
            "Corpus folder not found: {}",
            folder.display()
        )));
    }

    let mut paths = matching_files(folder, &pattern).await?;
    paths.sort();

    let mut report = LoadReport::default();
    for path in paths {
        match load_documents(&path).await {
            Ok(mut docs) => {
                debug!(path = %path.display(), "Loaded document");
                report.documents.append(&mut docs);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable document");
                report.skipped.push(SkippedFile {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if report.documents.is_empty() {
        return Err(AppError::Configuration(format!(
            "No documents matching '{}' found in {}",
            file_pattern,
            folder.display()
        )));
    }

    info!(
        folder = %folder.display(),
        documents = report.documents.len(),
        skipped = report.skipped.len(),
        "Loaded corpus"
    );
    Ok(report)
}

async fn matching_files(folder: &Path, pattern: &glob::Pattern) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(folder).await.map_err(|e| {
        AppError::Configuration(format!("Cannot list {}: {}", folder.display(), e))
    })?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::Internal(format!("Cannot list {}: {}", folder.display(), e)))?
    {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        if pattern.matches(&entry.file_name().to_string_lossy()) {
            paths.push(entry.path());
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_folder_load_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "second").unwrap();
        std::fs::write(dir.path().join("a.txt"), "first").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("sub.txt")).unwrap();

        let report = load_documents_from_folder(dir.path(), "*.txt").await.unwrap();
        let contents: Vec<&str> = report.documents.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert!(report.documents[0].source.ends_with("a.txt"));
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_skipped_and_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("good.txt"), "cells").unwrap();
        std::fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let report = load_documents_from_folder(dir.path(), "*.txt").await.unwrap();
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("bad.txt"));
    }

    #[tokio::test]
    async fn test_missing_folder_is_configuration_error() {
        let result = load_documents_from_folder("/nonexistent/corpus", "*.txt").await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_no_matching_documents_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("readme.md"), "nope").unwrap();

        let result = load_documents_from_folder(dir.path(), "*.txt").await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_single_file_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("biology.txt");
        std::fs::write(&path, "Mitochondria produce ATP.").unwrap();

        let docs = load_documents(&path).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Mitochondria produce ATP.");
        assert_eq!(docs[0].source, path.display().to_string());
    }
}
