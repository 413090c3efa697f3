// Reconciliation pass over a whole local collection

use super::{
    MissingRecordPolicy, RecordSync, RemoteHandleCache, SyncError, build_update,
};
use crate::{
    domain::mapping::target_from_summary,
    remote::{Payload, RemoteService},
    storage::Candidate,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub updated: usize,
    pub skipped: usize,
}

pub struct BatchReconciler<'a, S: ?Sized> {
    service: &'a S,
    cache: &'a mut RemoteHandleCache,
    authority: &'a str,
    missing: MissingRecordPolicy,
}

impl<'a, S: RemoteService + ?Sized> BatchReconciler<'a, S> {
    pub fn new(
        service: &'a S,
        cache: &'a mut RemoteHandleCache,
        authority: &'a str,
        missing: MissingRecordPolicy,
    ) -> Self {
        Self {
            service,
            cache,
            authority,
            missing,
        }
    }

    /// Pushes each candidate's derived state in enumeration order. A failing
    /// record is counted as skipped and the pass carries on.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn reconcile_all(
        &mut self,
        records: impl IntoIterator<Item = Candidate>,
    ) -> BatchReport {
        // never inherit a binding from another lifecycle context
        self.cache.invalidate(self.service).await;
        if let Err(e) = self.cache.ensure(self.service).await {
            tracing::warn!(error = %e, "provider binding unavailable at start of pass");
        }

        let mut report = BatchReport::default();
        for candidate in records {
            let key = candidate.key;
            let local = match candidate.local {
                Ok(local) => local,
                Err(e) => {
                    tracing::warn!(%key, error = %e, "skipping record with unreadable local state");
                    report.skipped += 1;
                    continue;
                }
            };
            let target = target_from_summary(&local.summary, local.last_read);
            let payload = build_update(Some(target.progress), target.last_access, target.status);

            match self.push(&key, &payload).await {
                Ok(true) => report.updated += 1,
                Ok(false) => {
                    tracing::debug!(%key, "record not present remotely");
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(%key, error = %e, "failed to reconcile record");
                    report.skipped += 1;
                }
            }
        }
        tracing::info!(
            updated = report.updated,
            skipped = report.skipped,
            "reconciliation pass finished"
        );
        report
    }

    async fn push(&mut self, key: &str, payload: &Payload) -> Result<bool, SyncError> {
        let mut sync = RecordSync::new(self.service, &mut *self.cache, self.authority);
        if sync.apply(key, payload).await? > 0 {
            return Ok(true);
        }
        match self.missing {
            MissingRecordPolicy::Report => Ok(false),
            MissingRecordPolicy::Insert => Ok(sync.insert(key, payload).await?.is_some()),
        }
    }
}
