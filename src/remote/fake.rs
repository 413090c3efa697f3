//! In-memory provider that records every interaction.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::Arc,
};

use parking_lot::Mutex;

use super::{
    Call, ClassHandle, ClientHandle, FieldValue, LocalClass, MethodId, Payload, RemoteError,
    RemoteService, Reply, columns, interface,
};
use crate::domain::models::{ReadStatus, RemoteRecord};

/// Scripted failure for `acquire_client`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireFailure {
    Clean,
    /// Hands out a client and then reports failure.
    Partial,
}

#[derive(Default)]
pub struct FakeState {
    pub rows: BTreeMap<String, Payload>,
    pub next_handle: u64,
    pub pinned: HashSet<u64>,
    pub methods: HashMap<u64, &'static str>,
    pub live_clients: HashSet<u64>,
    pub class_lookups: usize,
    pub class_releases: usize,
    pub clients_acquired: usize,
    pub clients_released: usize,
    /// `(key, values)` of every update call, in order.
    pub updates: Vec<(String, Payload)>,
    pub inserts: usize,
    pub missing_class: bool,
    pub missing_method: Option<&'static str>,
    pub acquire_failures: VecDeque<AcquireFailure>,
    /// Overrides the result of the next update calls.
    pub update_script: VecDeque<Result<i64, RemoteError>>,
    /// Updates for these keys always fault.
    pub faulty_keys: HashSet<String>,
}

impl FakeState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

#[derive(Clone, Default)]
pub struct FakeService {
    state: Arc<Mutex<FakeState>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Adds an existing remote row for `key`.
    pub fn seed(&self, key: &str) {
        let mut values = Payload::new();
        values.put_integer(columns::STATUS, ReadStatus::New.wire_value() as i64);
        self.with(|s| {
            s.rows.insert(key.to_string(), values);
        });
    }

    pub fn row(&self, key: &str) -> Option<Payload> {
        self.with(|s| s.rows.get(key).cloned())
    }
}

/// Inverse of the key-equality selection built by the sync layer.
pub fn key_from_selection(selection: &str) -> Option<String> {
    let quoted = selection.strip_prefix(&format!("{} = ", columns::KEY))?;
    let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

fn record_from(key: &str, values: &Payload) -> RemoteRecord {
    let text = |f| match values.get(f) {
        Some(FieldValue::Text(t)) => Some(t.clone()),
        _ => None,
    };
    let int = |f| match values.get(f) {
        Some(FieldValue::Integer(i)) => Some(*i),
        _ => None,
    };
    RemoteRecord {
        key: key.to_string(),
        status: int(columns::STATUS).and_then(ReadStatus::from_wire),
        progress: text(columns::PROGRESS),
        last_access: int(columns::LAST_ACCESS),
    }
}

#[async_trait::async_trait]
impl RemoteService for FakeService {
    async fn find_class(&self, name: &str) -> Result<LocalClass, RemoteError> {
        let mut s = self.state.lock();
        s.class_lookups += 1;
        if s.missing_class || name != interface::CLIENT_CLASS {
            return Err(RemoteError::Unresolved {
                kind: "class",
                name: name.to_string(),
            });
        }
        Ok(LocalClass(s.handle()))
    }

    async fn pin_class(&self, _class: LocalClass) -> Result<ClassHandle, RemoteError> {
        let mut s = self.state.lock();
        let id = s.handle();
        s.pinned.insert(id);
        Ok(ClassHandle(id))
    }

    async fn release_class(&self, class: ClassHandle) -> Result<(), RemoteError> {
        let mut s = self.state.lock();
        s.class_releases += 1;
        if s.pinned.remove(&class.0) {
            Ok(())
        } else {
            Err(RemoteError::StaleHandle(class.0))
        }
    }

    async fn method_id(&self, class: &ClassHandle, name: &str) -> Result<MethodId, RemoteError> {
        let mut s = self.state.lock();
        if !s.pinned.contains(&class.0) {
            return Err(RemoteError::StaleHandle(class.0));
        }
        let known = [interface::UPDATE, interface::INSERT, interface::QUERY]
            .into_iter()
            .find(|m| *m == name);
        match known {
            Some(m) if s.missing_method != Some(m) => {
                let id = s.handle();
                s.methods.insert(id, m);
                Ok(MethodId(id))
            }
            _ => Err(RemoteError::Unresolved {
                kind: "method",
                name: name.to_string(),
            }),
        }
    }

    async fn acquire_client(&self, authority: &str) -> Result<ClientHandle, RemoteError> {
        let mut s = self.state.lock();
        let id = s.handle();
        s.clients_acquired += 1;
        s.live_clients.insert(id);
        match s.acquire_failures.pop_front() {
            None => Ok(ClientHandle(id)),
            Some(failure) => {
                let partial = if failure == AcquireFailure::Partial {
                    Some(ClientHandle(id))
                } else {
                    s.live_clients.remove(&id);
                    None
                };
                Err(RemoteError::Unavailable {
                    authority: authority.to_string(),
                    reason: "provider busy".into(),
                    partial,
                })
            }
        }
    }

    async fn release_client(&self, client: ClientHandle) -> Result<(), RemoteError> {
        let mut s = self.state.lock();
        s.clients_released += 1;
        if s.live_clients.remove(&client.0) {
            Ok(())
        } else {
            Err(RemoteError::StaleHandle(client.0))
        }
    }

    async fn invoke(
        &self,
        client: &ClientHandle,
        method: MethodId,
        call: Call<'_>,
    ) -> Result<Reply, RemoteError> {
        let mut s = self.state.lock();
        if !s.live_clients.contains(&client.0) {
            return Err(RemoteError::StaleHandle(client.0));
        }
        let name = *s
            .methods
            .get(&method.0)
            .ok_or(RemoteError::StaleHandle(method.0))?;

        match (name, call) {
            (interface::UPDATE, Call::Update { selection, values }) => {
                let key = key_from_selection(selection)
                    .ok_or_else(|| RemoteError::Fault(format!("bad selection {selection}")))?;
                s.updates.push((key.clone(), values.clone()));
                if s.faulty_keys.contains(&key) {
                    return Err(RemoteError::Fault(format!("update of {key} failed")));
                }
                if let Some(scripted) = s.update_script.pop_front() {
                    return scripted.map(Reply::Rows);
                }
                match s.rows.get_mut(&key) {
                    Some(row) => {
                        for (field, value) in values.iter() {
                            row.fields.insert(field.to_string(), value.clone());
                        }
                        Ok(Reply::Rows(1))
                    }
                    None => Ok(Reply::Rows(0)),
                }
            }
            (interface::INSERT, Call::Insert { values }) => {
                s.inserts += 1;
                let Some(FieldValue::Text(key)) = values.get(columns::KEY).cloned() else {
                    return Ok(Reply::Inserted(None));
                };
                s.rows.insert(key.clone(), values.clone());
                Ok(Reply::Inserted(Some(key)))
            }
            (interface::QUERY, Call::Query { selection }) => {
                let key = key_from_selection(selection)
                    .ok_or_else(|| RemoteError::Fault(format!("bad selection {selection}")))?;
                let records = s
                    .rows
                    .get(&key)
                    .map(|values| record_from(&key, values))
                    .into_iter()
                    .collect();
                Ok(Reply::Records(records))
            }
            (name, _) => Err(RemoteError::Fault(format!(
                "method {name} does not accept this call"
            ))),
        }
    }
}
