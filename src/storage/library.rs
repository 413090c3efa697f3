// Directory scan that enumerates candidate records for reconciliation

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use walkdir::WalkDir;

use super::{Candidate, DataError, LocalState};
use crate::domain::models::CompletionSummary;

/// Extensions treated as documents.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["epub", "pdf", "djvu", "cbz", "fb2", "mobi", "txt"];

const SIDECAR_FILE: &str = "metadata.json";

#[derive(Debug, thiserror::Error)]
#[error("library directory {} is not accessible: {source}", .path.display())]
pub struct LibraryUnavailable {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Sidecar written by the reader next to each opened document.
#[derive(Debug, Deserialize)]
struct Sidecar {
    #[serde(default)]
    summary: CompletionSummary,
    #[serde(default)]
    percent_finished: Option<f64>,
    #[serde(default)]
    last_read: Option<i64>,
}

pub struct LibraryScan {
    root: PathBuf,
}

impl LibraryScan {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Every document under the root, in path order.
    #[tracing::instrument(level = "debug", skip(self), fields(root = %self.root.display()))]
    pub fn candidates(&self) -> Result<Vec<Candidate>, LibraryUnavailable> {
        fs::read_dir(&self.root).map_err(|source| LibraryUnavailable {
            path: self.root.clone(),
            source,
        })?;

        let mut out = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable library entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_document(entry.path()) {
                continue;
            }
            let path = absolute(entry.path());
            let local = read_local_state(&path);
            out.push(Candidate {
                key: path.to_string_lossy().into_owned(),
                local,
            });
        }
        tracing::debug!(count = out.len(), "enumerated library candidates");
        Ok(out)
    }
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|known| e.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// `<dir>/<stem>.sdr/metadata.json` for `<dir>/<stem>.<ext>`.
pub fn sidecar_path(document: &Path) -> PathBuf {
    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    document
        .with_file_name(format!("{stem}.sdr"))
        .join(SIDECAR_FILE)
}

/// A document without a sidecar was never opened and reads as an empty summary.
pub fn read_local_state(document: &Path) -> Result<LocalState, DataError> {
    let path = sidecar_path(document);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LocalState::default()),
        Err(source) => return Err(DataError::Io { path, source }),
    };
    let sidecar: Sidecar = serde_json::from_str(&raw).map_err(|source| DataError::Malformed {
        path: path.clone(),
        source,
    })?;

    let mut summary = sidecar.summary;
    if summary.percent_complete.is_none() {
        summary.percent_complete = sidecar.percent_finished;
    }
    let last_read = sidecar.last_read.or_else(|| modified_ms(&path));
    Ok(LocalState { summary, last_read })
}

fn modified_ms(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified).timestamp_millis())
}
