// Interfaces of the host application's state consumed by the sync engine

pub mod library;

use std::path::PathBuf;

use crate::domain::models::CompletionSummary;

/// Page layout of the currently open document.
pub trait DocumentView {
    /// Absolute path identifying the document in the remote table.
    fn document_key(&self) -> &str;
    fn current_page(&self) -> u32;
    fn page_flow(&self, page: u32) -> u32;
    fn pages_in_flow(&self, flow: u32) -> u32;
    fn position_in_flow(&self, page: u32) -> u32;
}

/// Local settings/history of the currently open document.
pub trait ReadingHistory {
    fn completion_summary(&self) -> CompletionSummary;
}

/// Locally stored state that could not be read for one candidate.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed reading state in {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Local knowledge about one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalState {
    pub summary: CompletionSummary,
    pub last_read: Option<i64>,
}

/// One record enumerated for a reconciliation pass.
#[derive(Debug)]
pub struct Candidate {
    pub key: String,
    pub local: Result<LocalState, DataError>,
}

impl Candidate {
    pub fn new(key: impl Into<String>, local: LocalState) -> Self {
        Candidate {
            key: key.into(),
            local: Ok(local),
        }
    }
}
