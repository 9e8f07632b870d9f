// tests/sync_service.rs
//
// Source sync runs against scripted fetchers and the in-memory sink.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use rbs_ingest::ingest::sink::{ListingSink, MemorySink};
use rbs_ingest::ingest::sync::{
    execute_scheduled_sync, execute_sync_for_source, is_sync_due, sync_status, NewSyncSource,
    SheetFetcher, SyncContext, SyncFrequency, SyncRegistry, SyncSource, SyncSourceUpdate,
};
use rbs_ingest::ingest::types::{
    ListingInput, ListingStatus, NumberOrText, SourceType, SyncStatus,
};
use rbs_ingest::SyncError;

fn row(title: &str) -> ListingInput {
    ListingInput {
        title: Some(title.into()),
        title_he: Some(format!("{title} בעברית")),
        description: Some("Synced from the provider sheet".into()),
        description_he: Some("מסונכרן מהגיליון".into()),
        category_id: Some("cat-kids-activities".into()),
        provider_id: Some("prov-sheet".into()),
        price: Some(NumberOrText::Text("120".into())),
        ..Default::default()
    }
}

/// Behaviour keyed by source name.
struct ScriptedFetcher;

#[async_trait]
impl SheetFetcher for ScriptedFetcher {
    async fn fetch_rows(&self, source: &SyncSource) -> Result<Vec<ListingInput>> {
        match source.name.as_str() {
            "broken" => bail!("sheet returned HTTP 403"),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(120)).await;
                Ok(vec![row("Too Late")])
            }
            "empty" => Ok(Vec::new()),
            "mixed" => Ok(vec![row("Chess"), ListingInput::default(), row("Judo")]),
            _ => Ok(vec![row("Robotics"), row("Theatre")]),
        }
    }
}

fn source(name: &str) -> NewSyncSource {
    NewSyncSource {
        name: name.into(),
        url: format!("https://docs.example/sheets/{name}"),
        source_type: SourceType::GoogleSheets,
        is_active: true,
        sync_frequency: SyncFrequency::Daily,
        column_mapping: None,
    }
}

fn context(sink: Arc<MemorySink>) -> SyncContext {
    SyncContext {
        registry: SyncRegistry::new(),
        fetcher: Arc::new(ScriptedFetcher),
        sink,
        fetch_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn sync_ingests_rows_as_pending_sheet_listings() {
    let sink = Arc::new(MemorySink::new());
    let ctx = context(sink.clone());
    let src = ctx.registry.add(source("mixed"));

    let outcome = execute_sync_for_source(&ctx, &src.id).await.unwrap();
    assert_eq!(outcome.log.status, SyncStatus::Success);
    assert_eq!(outcome.log.rows_processed, 3);
    assert_eq!(outcome.log.rows_created, 2);
    assert_eq!(outcome.log.rows_skipped, 1);
    assert!(outcome.log.errors.iter().all(|e| e.starts_with("Row 2: ")));
    assert!(outcome.log.completed_at.is_some());

    assert_eq!(sink.len(), 2);
    for stored in sink.all() {
        assert_eq!(stored.draft.status, Some(ListingStatus::Pending));
        assert_eq!(stored.draft.source_type, Some(SourceType::GoogleSheets));
        assert_eq!(stored.draft.source_id.as_deref(), Some(src.id.as_str()));
        assert_eq!(stored.draft.sync_enabled, Some(true));
    }

    let after = ctx.registry.get(&src.id).unwrap();
    assert_eq!(after.last_sync_status, Some(SyncStatus::Success));
    assert!(!is_sync_due(&after, Utc::now()));
}

#[tokio::test]
async fn resync_skips_rows_already_stored() {
    let sink = Arc::new(MemorySink::new());
    let ctx = context(sink.clone());
    let src = ctx.registry.add(source("weekly-sheet"));

    execute_sync_for_source(&ctx, &src.id).await.unwrap();
    let second = execute_sync_for_source(&ctx, &src.id).await.unwrap();
    assert_eq!(second.log.rows_created, 0);
    assert_eq!(second.log.rows_skipped, 2);
    assert_eq!(sink.len(), 2);
    assert_eq!(ctx.registry.logs(&src.id, 10).len(), 2);
}

#[tokio::test]
async fn empty_fetch_is_a_successful_no_op() {
    let sink = Arc::new(MemorySink::new());
    let ctx = context(sink.clone());
    let src = ctx.registry.add(source("empty"));

    let outcome = execute_sync_for_source(&ctx, &src.id).await.unwrap();
    assert_eq!(outcome.log.status, SyncStatus::Success);
    assert_eq!(outcome.log.rows_processed, 0);
    assert!(outcome.result.success);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn unknown_and_inactive_sources_write_no_log() {
    let ctx = context(Arc::new(MemorySink::new()));
    assert!(matches!(
        execute_sync_for_source(&ctx, "nope").await,
        Err(SyncError::NotFound(_))
    ));

    let src = ctx.registry.add(source("paused"));
    ctx.registry.update(
        &src.id,
        SyncSourceUpdate {
            is_active: Some(false),
            ..Default::default()
        },
    );
    assert!(matches!(
        execute_sync_for_source(&ctx, &src.id).await,
        Err(SyncError::Inactive(_))
    ));
    assert!(ctx.registry.logs(&src.id, 10).is_empty());
}

#[tokio::test]
async fn fetch_failure_is_logged_against_the_source() {
    let ctx = context(Arc::new(MemorySink::new()));
    let src = ctx.registry.add(source("broken"));

    let err = execute_sync_for_source(&ctx, &src.id).await.unwrap_err();
    assert!(matches!(err, SyncError::Fetch(_)));
    assert!(err.to_string().contains("HTTP 403"));

    let logs = ctx.registry.logs(&src.id, 10);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, SyncStatus::Failed);
    assert_eq!(logs[0].errors.len(), 1);
    assert_eq!(
        ctx.registry.get(&src.id).unwrap().last_sync_status,
        Some(SyncStatus::Failed)
    );
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_times_out() {
    let sink = Arc::new(MemorySink::new());
    let ctx = context(sink.clone());
    let src = ctx.registry.add(source("slow"));

    let err = execute_sync_for_source(&ctx, &src.id).await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout(5)));
    assert_eq!(err.to_string(), "Fetch timed out after 5s");
    assert!(sink.is_empty());
    assert_eq!(ctx.registry.logs(&src.id, 1)[0].status, SyncStatus::Failed);
}

#[tokio::test]
async fn scheduled_run_isolates_failures_and_skips_manual_sources() {
    let sink = Arc::new(MemorySink::new());
    let ctx = context(sink.clone());
    ctx.registry.add(source("alpha"));
    ctx.registry.add(source("broken"));
    ctx.registry.add(NewSyncSource {
        sync_frequency: SyncFrequency::Manual,
        ..source("manual-only")
    });
    ctx.registry.add(NewSyncSource {
        is_active: false,
        ..source("switched-off")
    });

    let before = sync_status(&ctx.registry, Utc::now(), 0);
    assert_eq!(before.total_sources, 4);
    assert_eq!(before.active_sources, 3);
    assert_eq!(before.pending_syncs, 2);
    assert!(before.last_sync_time.is_none());

    let report = execute_scheduled_sync(&ctx).await;
    assert_eq!(report.total_sources, 2);
    assert_eq!(report.successful_syncs, 1);
    assert_eq!(report.failed_syncs, 1);
    let names: Vec<&str> = report.results.iter().map(|r| r.source_name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "broken"]);
    assert_eq!(report.results[0].created, 2);
    assert!(report.results[1].error.as_deref().unwrap().contains("HTTP 403"));
    assert_eq!(sink.snapshot().await.len(), 2);

    let after = sync_status(&ctx.registry, Utc::now(), 0);
    assert_eq!(after.pending_syncs, 0);
    assert!(after.last_sync_time.is_some());
}
