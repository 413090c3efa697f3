use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;

use crate::sync::{MissingRecordPolicy, RetryPolicy, SyncOptions};

#[derive(Debug, Clone)]
pub struct Config {
    pub store_url: String,
    pub authority: String,
    pub library_dir: Option<PathBuf>,
    pub debounce_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub page_threshold: u32,
    pub insert_missing: bool,
}

const DEFAULT_STORE_URL: &str = "sqlite://reading_state.sqlite?mode=rwc";
const DEFAULT_AUTHORITY: &str = "reading_state";
const DEFAULT_DEBOUNCE_MS: u64 = 3000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 150;
const DEFAULT_PAGE_THRESHOLD: u32 = 5;

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {}", name, raw)),
        _ => Ok(default),
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store_url = lookup("SYNC_STORE_URL").unwrap_or(DEFAULT_STORE_URL.into());
        let authority = lookup("SYNC_AUTHORITY").unwrap_or(DEFAULT_AUTHORITY.into());
        let library_dir = lookup("LIBRARY_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);
        Ok(Config {
            store_url,
            authority,
            library_dir,
            debounce_ms: parse_or(&lookup, "SYNC_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?,
            max_retries: parse_or(&lookup, "SYNC_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            retry_backoff_ms: parse_or(&lookup, "SYNC_RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS)?,
            page_threshold: parse_or(&lookup, "SYNC_PAGE_THRESHOLD", DEFAULT_PAGE_THRESHOLD)?,
            insert_missing: parse_or(&lookup, "SYNC_INSERT_MISSING", false)?,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.store_url.is_empty() {
            return Err("SYNC_STORE_URL is missing".into());
        }
        if self.authority.is_empty() {
            return Err("SYNC_AUTHORITY is missing".into());
        }
        if self.page_threshold == 0 {
            return Err("SYNC_PAGE_THRESHOLD must be at least 1".into());
        }
        Ok(())
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            authority: self.authority.clone(),
            debounce: Duration::from_millis(self.debounce_ms),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff: Duration::from_millis(self.retry_backoff_ms),
            },
            page_threshold: self.page_threshold,
            missing_record: if self.insert_missing {
                MissingRecordPolicy::Insert
            } else {
                MissingRecordPolicy::Report
            },
        }
    }
}
