// Entry points the host application calls: schedule_sync, sync_now, reconcile_all

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use super::{
    BatchReconciler, BatchReport, DebounceScheduler, RecordSync, RemoteHandleCache, RetryPolicy,
    RowsAffected, build_update,
};
use crate::{
    domain::mapping::{primary_flow_position, status_for},
    remote::{Payload, RemoteService},
    storage::{Candidate, DocumentView, ReadingHistory},
};

/// What to do when an update finds no remote row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingRecordPolicy {
    /// Surface zero rows to the caller.
    #[default]
    Report,
    /// Create the row.
    Insert,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub authority: String,
    pub debounce: Duration,
    pub retry: RetryPolicy,
    /// Pages the reader must move from the last synced page before a change
    /// signal arms the timer.
    pub page_threshold: u32,
    pub missing_record: MissingRecordPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            authority: "reading_state".to_string(),
            debounce: Duration::from_secs(3),
            retry: RetryPolicy::default(),
            page_threshold: 5,
            missing_record: MissingRecordPolicy::Report,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Change,
    Close,
    Suspend,
    Resume,
    EndOfBook,
    SettingsSaved,
}

pub struct SyncEngine<S> {
    service: S,
    cache: RemoteHandleCache,
    scheduler: DebounceScheduler,
    options: SyncOptions,
    last_synced_page: Option<u32>,
}

impl<S: RemoteService> SyncEngine<S> {
    pub fn new(service: S, options: SyncOptions) -> Self {
        Self {
            service,
            cache: RemoteHandleCache::new(),
            scheduler: DebounceScheduler::new(options.debounce),
            options,
            last_synced_page: None,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn pending_until(&self) -> Option<Instant> {
        self.scheduler.due_at()
    }

    pub fn last_synced_page(&self) -> Option<u32> {
        self.last_synced_page
    }

    /// Dispatches one lifecycle event to the debounced or the immediate path.
    #[tracing::instrument(level = "debug", skip(self, doc))]
    pub async fn handle_event<D>(&mut self, event: LifecycleEvent, doc: &D)
    where
        D: DocumentView + ReadingHistory,
    {
        match event {
            LifecycleEvent::Change => {
                self.on_page_update(doc);
            }
            LifecycleEvent::EndOfBook | LifecycleEvent::SettingsSaved => {
                self.sync_now(doc).await;
            }
            LifecycleEvent::Close | LifecycleEvent::Suspend => {
                self.sync_now(doc).await;
                self.cache.invalidate(&self.service).await;
                if event == LifecycleEvent::Close {
                    self.last_synced_page = None;
                }
            }
            LifecycleEvent::Resume => {
                self.cache.invalidate(&self.service).await;
            }
        }
    }

    /// Arms the debounce timer once the reader has moved far enough from the
    /// last synced page. Returns whether it did.
    pub fn on_page_update<D: DocumentView>(&mut self, doc: &D) -> bool {
        let Some((page, _)) = primary_flow_position(doc) else {
            return false;
        };
        let moved = self
            .last_synced_page
            .is_none_or(|last| page.abs_diff(last) >= self.options.page_threshold);
        if moved {
            self.schedule_sync();
        }
        moved
    }

    /// Re-arms the single debounce timer.
    pub fn schedule_sync(&mut self) -> Instant {
        self.scheduler.on_change_signal()
    }

    /// Cancels any pending deferred sync and syncs on the calling flow.
    pub async fn sync_now<D>(&mut self, doc: &D) -> RowsAffected
    where
        D: DocumentView + ReadingHistory,
    {
        if self.scheduler.cancel() {
            tracing::debug!("cancelled pending sync in favour of immediate sync");
        }
        self.sync_current(doc).await
    }

    /// Resolves when the pending deferred sync is due. Await it next to the
    /// host's other event sources and call [`Self::on_timer_fire`] after.
    pub async fn timer_expired(&self) {
        self.scheduler.expired().await
    }

    /// Runs the deferred sync if its deadline has passed.
    pub async fn on_timer_fire<D>(&mut self, doc: &D) -> Option<RowsAffected>
    where
        D: DocumentView + ReadingHistory,
    {
        if !self.scheduler.take_expired() {
            return None;
        }
        Some(self.sync_current(doc).await)
    }

    /// Reconciles every candidate against the remote store.
    pub async fn reconcile_all(&mut self, records: impl IntoIterator<Item = Candidate>) -> BatchReport {
        BatchReconciler::new(
            &self.service,
            &mut self.cache,
            &self.options.authority,
            self.options.missing_record,
        )
        .reconcile_all(records)
        .await
    }

    async fn sync_current<D>(&mut self, doc: &D) -> RowsAffected
    where
        D: DocumentView + ReadingHistory,
    {
        let Some((page, progress)) = primary_flow_position(doc) else {
            tracing::debug!("current page is outside the primary flow, not syncing");
            return 0;
        };
        let key = doc.document_key();
        let status = status_for(&doc.completion_summary(), progress);
        let payload = build_update(Some(progress), Some(Utc::now().timestamp_millis()), status);

        let service = &self.service;
        let authority = self.options.authority.as_str();
        // set only when an attempt completed and found no row; exhausted retries also yield 0
        let mut missing = false;
        let mut rows = self
            .options
            .retry
            .run(service, &mut self.cache, async |cache: &mut RemoteHandleCache| {
                let rows = RecordSync::new(service, cache, authority)
                    .apply(key, &payload)
                    .await?;
                missing = rows == 0;
                Ok(rows)
            })
            .await;

        if missing && self.options.missing_record == MissingRecordPolicy::Insert {
            rows = self.insert_missing(key, &payload).await;
        }
        if rows > 0 {
            self.last_synced_page = Some(page);
            tracing::debug!(%key, %progress, ?status, "synced reading state");
        }
        rows
    }

    async fn insert_missing(&mut self, key: &str, payload: &Payload) -> RowsAffected {
        let authority = self.options.authority.as_str();
        match RecordSync::new(&self.service, &mut self.cache, authority)
            .insert(key, payload)
            .await
        {
            Ok(Some(_)) => 1,
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(%key, error = %e, "failed to insert missing record");
                0
            }
        }
    }
}
