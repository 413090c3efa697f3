//! External-state synchronization engine.

pub mod batch;
pub mod binding;
pub mod debounce;
pub mod engine;
pub mod payload;
pub mod record;
pub mod retry;

pub use batch::{BatchReconciler, BatchReport};
pub use binding::{RemoteBinding, RemoteHandleCache};
pub use debounce::DebounceScheduler;
pub use engine::{LifecycleEvent, MissingRecordPolicy, SyncEngine, SyncOptions};
pub use payload::build_update;
pub use record::RecordSync;
pub use retry::RetryPolicy;

use crate::remote::RemoteError;

/// Rows touched by one update; zero means the record is not present remotely.
pub type RowsAffected = u64;

/// The provider binding could not be resolved or has gone stale.
#[derive(Debug, thiserror::Error)]
#[error("failed to bind {what}: {source}")]
pub struct BindingError {
    pub what: String,
    #[source]
    pub source: RemoteError,
}

impl BindingError {
    pub fn new(what: impl Into<String>, source: RemoteError) -> Self {
        Self {
            what: what.into(),
            source,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// Client acquisition failed or the provider faulted during the call.
    #[error("transient provider failure: {0}")]
    Transient(#[source] RemoteError),

    #[error("provider rejected update of {key} (code {code})")]
    Rejected { key: String, code: i64 },

    #[error("provider sent an unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}
