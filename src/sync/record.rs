// Single-record update protocol over a per-call provider client

use super::{
    BindingError, RemoteBinding, RemoteHandleCache, RowsAffected, SyncError, payload::with_key,
};
use crate::{
    domain::models::RemoteRecord,
    remote::{Call, ClientHandle, MethodId, Payload, RemoteError, RemoteService, Reply, columns},
};

/// Selection matching exactly the row for `key`, with quotes escaped.
pub fn key_selection(key: &str) -> String {
    format!("{} = '{}'", columns::KEY, key.replace('\'', "''"))
}

pub struct RecordSync<'a, S: ?Sized> {
    service: &'a S,
    cache: &'a mut RemoteHandleCache,
    authority: &'a str,
}

impl<'a, S: RemoteService + ?Sized> RecordSync<'a, S> {
    pub fn new(service: &'a S, cache: &'a mut RemoteHandleCache, authority: &'a str) -> Self {
        Self {
            service,
            cache,
            authority,
        }
    }

    /// Updates the remote row for `key`. `Ok(0)` means the row does not exist.
    #[tracing::instrument(level = "debug", skip(self, payload))]
    pub async fn apply(&mut self, key: &str, payload: &Payload) -> Result<RowsAffected, SyncError> {
        let selection = key_selection(key);
        let call = Call::Update {
            selection: &selection,
            values: payload,
        };
        match self.call(|b| b.update, call).await? {
            Reply::Rows(rows) if rows >= 0 => Ok(rows as RowsAffected),
            Reply::Rows(code) => Err(SyncError::Rejected {
                key: key.to_string(),
                code,
            }),
            _ => Err(SyncError::UnexpectedReply("update")),
        }
    }

    /// Creates the remote row for `key`, returning the provider's identifier.
    #[tracing::instrument(level = "debug", skip(self, payload))]
    pub async fn insert(&mut self, key: &str, payload: &Payload) -> Result<Option<String>, SyncError> {
        let values = with_key(key, payload.clone());
        match self.call(|b| b.insert, Call::Insert { values: &values }).await? {
            Reply::Inserted(id) => Ok(id),
            _ => Err(SyncError::UnexpectedReply("insert")),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn fetch(&mut self, key: &str) -> Result<Option<RemoteRecord>, SyncError> {
        let selection = key_selection(key);
        match self.call(|b| b.query, Call::Query { selection: &selection }).await? {
            Reply::Records(records) => Ok(records.into_iter().find(|r| r.key == key)),
            _ => Err(SyncError::UnexpectedReply("query")),
        }
    }

    /// Runs one invocation inside a freshly acquired client, which is released
    /// on every path.
    async fn call(
        &mut self,
        method: fn(&RemoteBinding) -> MethodId,
        call: Call<'_>,
    ) -> Result<Reply, SyncError> {
        let client = self.acquire().await?;
        let result = self.invoke(&client, method, call).await;
        if let Err(e) = self.service.release_client(client).await {
            tracing::warn!(error = %e, "failed to release provider client");
        }
        result
    }

    async fn invoke(
        &mut self,
        client: &ClientHandle,
        method: fn(&RemoteBinding) -> MethodId,
        call: Call<'_>,
    ) -> Result<Reply, SyncError> {
        let id = method(self.cache.ensure(self.service).await?);
        match self.service.invoke(client, id, call).await {
            Ok(reply) => Ok(reply),
            Err(e) if e.is_binding() => {
                self.cache.invalidate(self.service).await;
                Err(BindingError::new("invocation", e).into())
            }
            Err(e) => Err(SyncError::Transient(e)),
        }
    }

    async fn acquire(&self) -> Result<ClientHandle, SyncError> {
        match self.service.acquire_client(self.authority).await {
            Ok(client) => Ok(client),
            Err(RemoteError::Unavailable {
                authority,
                reason,
                partial,
            }) => {
                if let Some(client) = partial {
                    if let Err(e) = self.service.release_client(client).await {
                        tracing::warn!(error = %e, "failed to release partially acquired client");
                    }
                }
                Err(SyncError::Transient(RemoteError::Unavailable {
                    authority,
                    reason,
                    partial: None,
                }))
            }
            Err(e) => Err(SyncError::Transient(e)),
        }
    }
}
