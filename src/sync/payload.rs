// Update payload for one record

use crate::{
    domain::models::{Progress, ReadStatus},
    remote::{Payload, columns},
};

/// Builds the field set for an update.
///
/// A `New` record gets explicit nulls for progress and timestamp so the
/// remote row cannot keep showing progress from an earlier sync. For other
/// statuses a missing argument leaves that field out of the update.
pub fn build_update(
    progress: Option<Progress>,
    timestamp_ms: Option<i64>,
    status: ReadStatus,
) -> Payload {
    let mut payload = Payload::new();
    payload.put_integer(columns::STATUS, status.wire_value() as i64);
    if status == ReadStatus::New {
        payload.put_null(columns::PROGRESS);
        payload.put_null(columns::LAST_ACCESS);
        return payload;
    }
    if let Some(progress) = progress {
        payload.put_text(columns::PROGRESS, progress.to_string());
    }
    if let Some(ts) = timestamp_ms {
        payload.put_integer(columns::LAST_ACCESS, ts);
    }
    payload
}

/// Insert payload: the update fields plus the key.
pub fn with_key(key: &str, mut payload: Payload) -> Payload {
    payload.put_text(columns::KEY, key);
    payload
}
