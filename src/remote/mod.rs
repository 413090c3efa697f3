//! Transport seam to the external reading-state provider.
//!
//! The provider is addressed by an authority string and spoken to through
//! opaque handles: a class reference that must be pinned to outlive the call
//! that produced it, method identifiers resolved against that class, and a
//! per-call client that has to be handed back after use.

#[cfg(test)]
pub mod fake;
pub mod sqlite;

use std::collections::BTreeMap;

use crate::domain::models::RemoteRecord;

/// Names the provider resolves.
pub mod interface {
    pub const CLIENT_CLASS: &str = "reading_state.ProviderClient";
    pub const UPDATE: &str = "update";
    pub const INSERT: &str = "insert";
    pub const QUERY: &str = "query";
}

/// Field names of the remote table.
pub mod columns {
    pub const KEY: &str = "path";
    pub const STATUS: &str = "read_state";
    pub const PROGRESS: &str = "reading_progress";
    pub const LAST_ACCESS: &str = "last_access";
}

/// Class reference valid only until it is pinned.
#[derive(Debug, PartialEq, Eq)]
pub struct LocalClass(pub u64);

/// Pinned class reference. Owned; give it back with `release_class`.
#[derive(Debug, PartialEq, Eq)]
pub struct ClassHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub u64);

/// Per-call provider client. Owned; give it back with `release_client`.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    /// Explicitly clears the remote field.
    Null,
}

/// Field set sent with an update or insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    fields: BTreeMap<String, FieldValue>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_text(&mut self, field: &str, value: impl Into<String>) {
        self.fields
            .insert(field.to_string(), FieldValue::Text(value.into()));
    }

    pub fn put_integer(&mut self, field: &str, value: i64) {
        self.fields
            .insert(field.to_string(), FieldValue::Integer(value));
    }

    pub fn put_null(&mut self, field: &str) {
        self.fields.insert(field.to_string(), FieldValue::Null);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One invocation against the provider.
#[derive(Debug, Clone, Copy)]
pub enum Call<'a> {
    Update {
        selection: &'a str,
        values: &'a Payload,
    },
    Insert {
        values: &'a Payload,
    },
    Query {
        selection: &'a str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Rows touched by an update. Negative values are provider-side failure sentinels.
    Rows(i64),
    Inserted(Option<String>),
    Records(Vec<RemoteRecord>),
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("provider does not know {kind} {name:?}")]
    Unresolved { kind: &'static str, name: String },

    #[error("handle {0} is no longer valid")]
    StaleHandle(u64),

    /// The client could not be acquired. `partial` carries a client that was
    /// handed out before the failure and still has to be released.
    #[error("provider {authority:?} unavailable: {reason}")]
    Unavailable {
        authority: String,
        reason: String,
        partial: Option<ClientHandle>,
    },

    #[error("provider raised a fault: {0}")]
    Fault(String),
}

impl RemoteError {
    /// Errors that mean the cached binding itself is unusable.
    pub fn is_binding(&self) -> bool {
        matches!(
            self,
            RemoteError::Unresolved { .. } | RemoteError::StaleHandle(_)
        )
    }
}

#[async_trait::async_trait]
pub trait RemoteService: Send + Sync {
    async fn find_class(&self, name: &str) -> Result<LocalClass, RemoteError>;
    async fn pin_class(&self, class: LocalClass) -> Result<ClassHandle, RemoteError>;
    async fn release_class(&self, class: ClassHandle) -> Result<(), RemoteError>;
    async fn method_id(&self, class: &ClassHandle, name: &str) -> Result<MethodId, RemoteError>;
    async fn acquire_client(&self, authority: &str) -> Result<ClientHandle, RemoteError>;
    async fn release_client(&self, client: ClientHandle) -> Result<(), RemoteError>;
    async fn invoke(
        &self,
        client: &ClientHandle,
        method: MethodId,
        call: Call<'_>,
    ) -> Result<Reply, RemoteError>;
}
