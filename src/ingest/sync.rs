// src/ingest/sync.rs
//! External sheet sources: registry, due-ness, and sync runs that feed the
//! listing pipeline.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use metrics::{counter, gauge};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::SyncError;
use crate::ingest::csv::ColumnMapping;
use crate::ingest::sink::ListingSink;
use crate::ingest::types::{
    IngestionOptions, IngestionResult, ListingInput, SourceType, SyncStatus,
};
use crate::ingest::{ensure_metrics_described, process_listing_batch};

/// Logs kept per source, newest first.
pub const MAX_LOGS_PER_SOURCE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncFrequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
    Manual,
}

impl SyncFrequency {
    /// Minimum gap between runs; `None` for manual-only sources.
    pub fn interval(self) -> Option<ChronoDuration> {
        match self {
            SyncFrequency::Hourly => Some(ChronoDuration::hours(1)),
            SyncFrequency::Daily => Some(ChronoDuration::hours(24)),
            SyncFrequency::Weekly => Some(ChronoDuration::hours(168)),
            SyncFrequency::Manual => None,
        }
    }
}

fn default_source_type() -> SourceType {
    SourceType::GoogleSheets
}

fn default_true() -> bool {
    true
}

/// Descriptor for registering a source (config file or admin call).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSyncSource {
    pub name: String,
    pub url: String,
    #[serde(rename = "type", default = "default_source_type")]
    pub source_type: SourceType,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sync_frequency: SyncFrequency,
    #[serde(default)]
    pub column_mapping: Option<ColumnMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSource {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub is_active: bool,
    pub sync_frequency: SyncFrequency,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: Option<SyncStatus>,
    pub column_mapping: Option<ColumnMapping>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; `None` leaves a field as is.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSourceUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub is_active: Option<bool>,
    pub sync_frequency: Option<SyncFrequency>,
    pub column_mapping: Option<ColumnMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLog {
    pub id: String,
    pub source_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    pub rows_processed: usize,
    pub rows_created: usize,
    pub rows_updated: usize,
    pub rows_skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Default)]
struct RegistryState {
    sources: Vec<SyncSource>,
    logs: HashMap<String, VecDeque<SyncLog>>,
}

/// Shared, cloneable source registry.
#[derive(Clone, Default)]
pub struct SyncRegistry {
    inner: Arc<RwLock<RegistryState>>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sources(sources: impl IntoIterator<Item = NewSyncSource>) -> Self {
        let registry = Self::new();
        for s in sources {
            registry.add(s);
        }
        registry
    }

    pub fn add(&self, new: NewSyncSource) -> SyncSource {
        let now = Utc::now();
        let source = SyncSource {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            url: new.url,
            source_type: new.source_type,
            is_active: new.is_active,
            sync_frequency: new.sync_frequency,
            last_sync_at: None,
            last_sync_status: None,
            column_mapping: new.column_mapping,
            created_at: now,
            updated_at: now,
        };
        self.inner.write().sources.push(source.clone());
        tracing::info!(target: "sync", id = %source.id, name = %source.name, "sync source added");
        source
    }

    pub fn update(&self, id: &str, upd: SyncSourceUpdate) -> Option<SyncSource> {
        let mut state = self.inner.write();
        let source = state.sources.iter_mut().find(|s| s.id == id)?;
        if let Some(name) = upd.name {
            source.name = name;
        }
        if let Some(url) = upd.url {
            source.url = url;
        }
        if let Some(active) = upd.is_active {
            source.is_active = active;
        }
        if let Some(freq) = upd.sync_frequency {
            source.sync_frequency = freq;
        }
        if upd.column_mapping.is_some() {
            source.column_mapping = upd.column_mapping;
        }
        source.updated_at = Utc::now();
        Some(source.clone())
    }

    /// Removes the source and its logs.
    pub fn delete(&self, id: &str) -> bool {
        let mut state = self.inner.write();
        let before = state.sources.len();
        state.sources.retain(|s| s.id != id);
        let deleted = state.sources.len() < before;
        if deleted {
            state.logs.remove(id);
        }
        deleted
    }

    pub fn get(&self, id: &str) -> Option<SyncSource> {
        self.inner.read().sources.iter().find(|s| s.id == id).cloned()
    }

    pub fn list(&self) -> Vec<SyncSource> {
        self.inner.read().sources.clone()
    }

    pub fn active(&self) -> Vec<SyncSource> {
        self.inner
            .read()
            .sources
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect()
    }

    /// Newest first.
    pub fn logs(&self, source_id: &str, limit: usize) -> Vec<SyncLog> {
        self.inner
            .read()
            .logs
            .get(source_id)
            .map(|l| l.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    fn start_log(&self, source_id: &str) -> SyncLog {
        let log = SyncLog {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            started_at: Utc::now(),
            completed_at: None,
            status: SyncStatus::Syncing,
            rows_processed: 0,
            rows_created: 0,
            rows_updated: 0,
            rows_skipped: 0,
            errors: Vec::new(),
        };
        let mut state = self.inner.write();
        let logs = state.logs.entry(source_id.to_string()).or_default();
        logs.push_front(log.clone());
        logs.truncate(MAX_LOGS_PER_SOURCE);
        log
    }

    /// Store the finished log and stamp the source with its outcome.
    fn finish(&self, log: SyncLog) {
        let mut state = self.inner.write();
        if let Some(source) = state.sources.iter_mut().find(|s| s.id == log.source_id) {
            source.last_sync_at = log.completed_at;
            source.last_sync_status = Some(log.status);
            source.updated_at = Utc::now();
        }
        if let Some(slot) = state
            .logs
            .get_mut(&log.source_id)
            .and_then(|logs| logs.iter_mut().find(|l| l.id == log.id))
        {
            *slot = log;
        }
    }
}

/// Whether an active source should run now. Manual sources never come due;
/// an active source that never ran always is.
pub fn is_sync_due(source: &SyncSource, now: DateTime<Utc>) -> bool {
    if !source.is_active {
        return false;
    }
    let Some(interval) = source.sync_frequency.interval() else {
        return false;
    };
    match source.last_sync_at {
        None => true,
        Some(last) => now - last >= interval,
    }
}

/// Pulls raw rows from an external sheet.
#[async_trait]
pub trait SheetFetcher: Send + Sync {
    async fn fetch_rows(&self, source: &SyncSource) -> Result<Vec<ListingInput>>;
}

/// Placeholder until real sheet access exists: always returns no rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubSheetFetcher;

#[async_trait]
impl SheetFetcher for StubSheetFetcher {
    async fn fetch_rows(&self, source: &SyncSource) -> Result<Vec<ListingInput>> {
        tracing::debug!(target: "sync", url = %source.url, "stub fetcher returns no rows");
        Ok(Vec::new())
    }
}

/// Everything a sync run touches.
#[derive(Clone)]
pub struct SyncContext {
    pub registry: SyncRegistry,
    pub fetcher: Arc<dyn SheetFetcher>,
    pub sink: Arc<dyn ListingSink>,
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub log: SyncLog,
    pub result: IngestionResult,
}

/// Fetch one source under the context's timeout and ingest what came back.
///
/// Unknown and inactive sources fail before any log is written. Fetch
/// failures are logged as FAILED against the source and returned.
pub async fn execute_sync_for_source(ctx: &SyncContext, source_id: &str) -> Result<SyncOutcome, SyncError> {
    ensure_metrics_described();

    let source = ctx
        .registry
        .get(source_id)
        .ok_or_else(|| SyncError::NotFound(source_id.to_string()))?;
    if !source.is_active {
        return Err(SyncError::Inactive(source_id.to_string()));
    }

    counter!("sync_runs_total").increment(1);
    gauge!("sync_last_run_ts").set(Utc::now().timestamp() as f64);
    let mut log = ctx.registry.start_log(&source.id);

    let fetched = match tokio::time::timeout(ctx.fetch_timeout, ctx.fetcher.fetch_rows(&source)).await {
        Ok(Ok(rows)) => Ok(rows),
        Ok(Err(e)) => Err(SyncError::Fetch(e)),
        Err(_) => Err(SyncError::Timeout(ctx.fetch_timeout.as_secs())),
    };

    let rows = match fetched {
        Ok(rows) => rows,
        Err(e) => {
            counter!("sync_failures_total").increment(1);
            tracing::warn!(target: "sync", source = %source.name, error = %e, "sync fetch failed");
            log.status = SyncStatus::Failed;
            log.completed_at = Some(Utc::now());
            log.errors.push(e.to_string());
            ctx.registry.finish(log);
            return Err(e);
        }
    };

    if rows.is_empty() {
        log.status = SyncStatus::Success;
        log.completed_at = Some(Utc::now());
        ctx.registry.finish(log.clone());
        tracing::info!(target: "sync", source = %source.name, "sync finished, no rows");
        return Ok(SyncOutcome {
            log,
            result: IngestionResult {
                success: true,
                ..Default::default()
            },
        });
    }

    let opts = IngestionOptions {
        source_type: SourceType::GoogleSheets,
        source_id: Some(source.id.clone()),
        source_url: Some(source.url.clone()),
        skip_duplicates: true,
        auto_approve: false,
        existing_listings: Some(ctx.sink.snapshot().await),
    };
    let result = process_listing_batch(&rows, &opts);

    let stored = match ctx.sink.store(result.listings.clone()).await {
        Ok(stored) => stored,
        Err(e) => {
            counter!("sync_failures_total").increment(1);
            let err = SyncError::Store(format!("{e:#}"));
            tracing::warn!(target: "sync", source = %source.name, error = %err, "storing synced listings failed");
            log.status = SyncStatus::Failed;
            log.completed_at = Some(Utc::now());
            log.errors.push(err.to_string());
            ctx.registry.finish(log);
            return Err(err);
        }
    };

    log.rows_processed = rows.len();
    log.rows_created = stored.stored;
    log.rows_updated = result.updated;
    log.rows_skipped = result.skipped + stored.rejected_duplicates.len();
    log.errors = result.errors.iter().map(ToString::to_string).collect();
    log.status = SyncStatus::Success;
    log.completed_at = Some(Utc::now());
    ctx.registry.finish(log.clone());

    tracing::info!(
        target: "sync",
        source = %source.name,
        processed = log.rows_processed,
        created = log.rows_created,
        skipped = log.rows_skipped,
        "sync finished"
    );

    Ok(SyncOutcome { log, result })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRunSummary {
    pub source_id: String,
    pub source_name: String,
    pub success: bool,
    pub created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledSyncReport {
    pub total_sources: usize,
    pub successful_syncs: usize,
    pub failed_syncs: usize,
    pub results: Vec<SourceRunSummary>,
}

/// Run every due active source concurrently. One failing source never
/// affects the others.
pub async fn execute_scheduled_sync(ctx: &SyncContext) -> ScheduledSyncReport {
    let now = Utc::now();
    let due: Vec<SyncSource> = ctx
        .registry
        .active()
        .into_iter()
        .filter(|s| is_sync_due(s, now))
        .collect();

    let mut report = ScheduledSyncReport {
        total_sources: due.len(),
        ..Default::default()
    };

    let mut set = JoinSet::new();
    for source in due {
        let ctx = ctx.clone();
        set.spawn(async move {
            let outcome = execute_sync_for_source(&ctx, &source.id).await;
            (source, outcome)
        });
    }

    while let Some(joined) = set.join_next().await {
        let (source, outcome) = match joined {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "sync", error = %e, "sync task panicked");
                report.failed_syncs += 1;
                continue;
            }
        };
        let summary = match outcome {
            Ok(o) => SourceRunSummary {
                source_id: source.id,
                source_name: source.name,
                success: true,
                created: o.log.rows_created,
                error: None,
            },
            Err(e) => SourceRunSummary {
                source_id: source.id,
                source_name: source.name,
                success: false,
                created: 0,
                error: Some(e.to_string()),
            },
        };
        if summary.success {
            report.successful_syncs += 1;
        } else {
            report.failed_syncs += 1;
        }
        report.results.push(summary);
    }

    // completion order is arbitrary
    report.results.sort_by(|a, b| a.source_name.cmp(&b.source_name));
    report
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusReport {
    pub active_sources: usize,
    pub total_sources: usize,
    pub pending_syncs: usize,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub next_scheduled_sync: DateTime<Utc>,
}

/// Next `hour_utc:00` strictly after `now`.
pub fn next_nightly_run(now: DateTime<Utc>, hour_utc: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour_utc.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(time).and_utc();
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

pub fn sync_status(registry: &SyncRegistry, now: DateTime<Utc>, nightly_hour_utc: u32) -> SyncStatusReport {
    let sources = registry.list();
    SyncStatusReport {
        active_sources: sources.iter().filter(|s| s.is_active).count(),
        total_sources: sources.len(),
        pending_syncs: sources.iter().filter(|s| is_sync_due(s, now)).count(),
        last_sync_time: sources.iter().filter_map(|s| s.last_sync_at).max(),
        next_scheduled_sync: next_nightly_run(now, nightly_hour_utc),
    }
}
