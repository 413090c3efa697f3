// Provider emulation over a sea-orm SQLite database
//
// Each per-call client is one database transaction, committed when the
// client is released.

use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicU64, Ordering},
};

use entities::reading_state;
use parking_lot::Mutex;
use sea_orm::{
    ActiveValue::Set, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    EntityTrait, FromQueryResult, Statement, TransactionTrait, Value,
};

use super::{
    Call, ClassHandle, ClientHandle, FieldValue, LocalClass, MethodId, Payload, RemoteError,
    RemoteService, Reply, columns, interface,
};
use crate::domain::models::{ReadStatus, RemoteRecord};

const METHODS: [&str; 3] = [interface::UPDATE, interface::INSERT, interface::QUERY];

pub struct SqliteBridge {
    db: DatabaseConnection,
    authority: String,
    next_handle: AtomicU64,
    pinned: Mutex<HashSet<u64>>,
    clients: tokio::sync::Mutex<HashMap<u64, DatabaseTransaction>>,
}

impl SqliteBridge {
    /// `db` must already carry the `reading_state` table.
    pub fn new(db: DatabaseConnection, authority: impl Into<String>) -> Self {
        Self {
            db,
            authority: authority.into(),
            next_handle: AtomicU64::new(1),
            pinned: Mutex::new(HashSet::new()),
            clients: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    fn handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }
}

fn fault(e: sea_orm::DbErr) -> RemoteError {
    RemoteError::Fault(e.to_string())
}

/// Maps a payload field onto a writable column.
fn column_for(field: &str) -> Result<&'static str, RemoteError> {
    [columns::STATUS, columns::PROGRESS, columns::LAST_ACCESS]
        .into_iter()
        .find(|c| *c == field)
        .ok_or_else(|| RemoteError::Fault(format!("unknown field {field:?}")))
}

fn db_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => Value::from(s.clone()),
        FieldValue::Integer(i) => Value::from(*i),
        FieldValue::Null => Value::String(None),
    }
}

async fn update(
    txn: &DatabaseTransaction,
    selection: &str,
    values: &Payload,
) -> Result<Reply, RemoteError> {
    let mut assignments = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len());
    for (field, value) in values.iter() {
        assignments.push(format!("{} = ?", column_for(field)?));
        params.push(db_value(value));
    }
    if assignments.is_empty() {
        return Ok(Reply::Rows(0));
    }
    let sql = format!(
        "UPDATE reading_state SET {} WHERE {selection}",
        assignments.join(", ")
    );
    let result = txn
        .execute(Statement::from_sql_and_values(DbBackend::Sqlite, sql, params))
        .await
        .map_err(fault)?;
    Ok(Reply::Rows(result.rows_affected() as i64))
}

async fn insert(txn: &DatabaseTransaction, values: &Payload) -> Result<Reply, RemoteError> {
    let text = |field| match values.get(field) {
        Some(FieldValue::Text(s)) => Some(s.clone()),
        _ => None,
    };
    let integer = |field| match values.get(field) {
        Some(FieldValue::Integer(i)) => Some(*i),
        _ => None,
    };
    let Some(path) = text(columns::KEY) else {
        return Ok(Reply::Inserted(None));
    };
    let status = integer(columns::STATUS).unwrap_or(ReadStatus::New.wire_value() as i64);
    let model = reading_state::ActiveModel {
        path: Set(path.clone()),
        read_state: Set(status as i32),
        reading_progress: Set(text(columns::PROGRESS)),
        last_access: Set(integer(columns::LAST_ACCESS)),
    };
    reading_state::Entity::insert(model)
        .exec_without_returning(txn)
        .await
        .map_err(fault)?;
    Ok(Reply::Inserted(Some(path)))
}

async fn query(txn: &DatabaseTransaction, selection: &str) -> Result<Reply, RemoteError> {
    let sql = format!(
        "SELECT path, read_state, reading_progress, last_access FROM reading_state WHERE {selection}"
    );
    let rows = txn
        .query_all(Statement::from_string(DbBackend::Sqlite, sql))
        .await
        .map_err(fault)?;
    let records = rows
        .iter()
        .map(|row| reading_state::Model::from_query_result(row, ""))
        .collect::<Result<Vec<_>, _>>()
        .map_err(fault)?
        .into_iter()
        .map(|m| RemoteRecord {
            key: m.path,
            status: ReadStatus::from_wire(m.read_state as i64),
            progress: m.reading_progress,
            last_access: m.last_access,
        })
        .collect();
    Ok(Reply::Records(records))
}

#[async_trait::async_trait]
impl RemoteService for SqliteBridge {
    async fn find_class(&self, name: &str) -> Result<LocalClass, RemoteError> {
        if name != interface::CLIENT_CLASS {
            return Err(RemoteError::Unresolved {
                kind: "class",
                name: name.to_string(),
            });
        }
        Ok(LocalClass(self.handle()))
    }

    async fn pin_class(&self, _class: LocalClass) -> Result<ClassHandle, RemoteError> {
        let id = self.handle();
        self.pinned.lock().insert(id);
        Ok(ClassHandle(id))
    }

    async fn release_class(&self, class: ClassHandle) -> Result<(), RemoteError> {
        if self.pinned.lock().remove(&class.0) {
            Ok(())
        } else {
            Err(RemoteError::StaleHandle(class.0))
        }
    }

    async fn method_id(&self, class: &ClassHandle, name: &str) -> Result<MethodId, RemoteError> {
        if !self.pinned.lock().contains(&class.0) {
            return Err(RemoteError::StaleHandle(class.0));
        }
        METHODS
            .iter()
            .position(|m| *m == name)
            .map(|i| MethodId(i as u64))
            .ok_or_else(|| RemoteError::Unresolved {
                kind: "method",
                name: name.to_string(),
            })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn acquire_client(&self, authority: &str) -> Result<ClientHandle, RemoteError> {
        if authority != self.authority {
            return Err(RemoteError::Unavailable {
                authority: authority.to_string(),
                reason: "no such provider".into(),
                partial: None,
            });
        }
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| RemoteError::Unavailable {
                authority: authority.to_string(),
                reason: e.to_string(),
                partial: None,
            })?;
        let id = self.handle();
        self.clients.lock().await.insert(id, txn);
        Ok(ClientHandle(id))
    }

    async fn release_client(&self, client: ClientHandle) -> Result<(), RemoteError> {
        let txn = self
            .clients
            .lock()
            .await
            .remove(&client.0)
            .ok_or(RemoteError::StaleHandle(client.0))?;
        txn.commit().await.map_err(fault)
    }

    async fn invoke(
        &self,
        client: &ClientHandle,
        method: MethodId,
        call: Call<'_>,
    ) -> Result<Reply, RemoteError> {
        let clients = self.clients.lock().await;
        let txn = clients
            .get(&client.0)
            .ok_or(RemoteError::StaleHandle(client.0))?;
        let name = METHODS
            .get(method.0 as usize)
            .ok_or(RemoteError::StaleHandle(method.0))?;

        match (*name, call) {
            (interface::UPDATE, Call::Update { selection, values }) => {
                update(txn, selection, values).await
            }
            (interface::INSERT, Call::Insert { values }) => insert(txn, values).await,
            (interface::QUERY, Call::Query { selection }) => query(txn, selection).await,
            (name, _) => Err(RemoteError::Fault(format!(
                "method {name} does not accept this call"
            ))),
        }
    }
}
