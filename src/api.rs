use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shuttle_axum::axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::analyze::{EntityExtractor, ExtractedEntity};
use crate::chat::{get_export_stats, is_valid_chat_export, parse_chat_export, ExportStats, ParseResult};
use crate::error::SyncError;
use crate::ingest::config::IngestConfig;
use crate::ingest::csv::{generate_csv_template, parse_csv, validate_csv_structure, CsvParseResult, CsvStructure};
use crate::ingest::normalize::normalize_listing;
use crate::ingest::sink::{ListingSink, MemorySink, StoreOutcome};
use crate::ingest::sync::{
    execute_sync_for_source, sync_status, StubSheetFetcher, SyncContext, SyncOutcome,
    SyncRegistry, SyncStatusReport,
};
use crate::ingest::types::{
    IngestionOptions, IngestionResult, IngestionStats, ListingDraft, ListingInput, SourceType,
};
use crate::ingest::validation::{validate_listing, ValidationResult};
use crate::ingest::{get_ingestion_stats, process_csv_import, process_listing_batch};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IngestConfig>,
    pub extractor: Arc<EntityExtractor>,
    pub sync: SyncContext,
}

impl AppState {
    /// State with the in-memory sink and the stub sheet fetcher.
    pub fn from_config(config: IngestConfig) -> Self {
        let sync = SyncContext {
            registry: SyncRegistry::from_sources(config.sync_sources.clone()),
            fetcher: Arc::new(StubSheetFetcher),
            sink: Arc::new(MemorySink::new()),
            fetch_timeout: Duration::from_secs(config.scheduler.fetch_timeout_secs.max(1)),
        };
        Self {
            extractor: Arc::new(EntityExtractor::with_known_providers(
                config.known_providers.clone(),
            )),
            config: Arc::new(config),
            sync,
        }
    }

    fn sink(&self) -> &Arc<dyn ListingSink> {
        &self.sync.sink
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/chat/parse", post(chat_parse))
        .route("/chat/validate", post(chat_validate))
        .route("/chat/extract", post(chat_extract))
        .route("/listings/validate", post(listings_validate))
        .route("/listings/normalize", post(listings_normalize))
        .route("/listings/ingest", post(listings_ingest))
        .route("/csv/parse", post(csv_parse))
        .route("/csv/validate", post(csv_validate))
        .route("/csv/import", post(csv_import))
        .route("/csv/template", get(csv_template))
        .route("/sync/status", get(sync_status_handler))
        .route("/sync/trigger/{id}", post(sync_trigger))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    errors: Vec<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            errors: vec![message.into()],
        }),
    )
}

// ---- chat ----

async fn chat_parse(body: String) -> Json<ParseResult> {
    Json(parse_chat_export(&body))
}

#[derive(Serialize)]
struct ChatValidateResp {
    valid: bool,
}

async fn chat_validate(body: String) -> Json<ChatValidateResp> {
    Json(ChatValidateResp {
        valid: is_valid_chat_export(&body),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractReq {
    text: String,
    #[serde(default)]
    import_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractResp {
    import_id: String,
    group_name: Option<String>,
    stats: ExportStats,
    entities: Vec<ExtractedEntity>,
    errors: Vec<String>,
}

async fn chat_extract(
    State(state): State<AppState>,
    Json(body): Json<ExtractReq>,
) -> Result<Json<ExtractResp>, (StatusCode, Json<ErrorBody>)> {
    let parsed = parse_chat_export(&body.text);
    if !parsed.success {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorBody {
                errors: parsed.errors,
            }),
        ));
    }
    let import_id = body
        .import_id
        .unwrap_or_else(|| format!("import-{}", Utc::now().timestamp_millis()));
    let entities = state.extractor.extract_from_export(&parsed, &import_id);
    Ok(Json(ExtractResp {
        stats: get_export_stats(&parsed),
        group_name: parsed.group_name,
        errors: parsed.errors,
        import_id,
        entities,
    }))
}

// ---- listings ----

async fn listings_validate(Json(input): Json<ListingInput>) -> Json<ValidationResult> {
    Json(validate_listing(&input))
}

async fn listings_normalize(Json(input): Json<ListingInput>) -> Json<ListingDraft> {
    Json(normalize_listing(&input))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestReq {
    listings: Vec<ListingInput>,
    #[serde(default)]
    options: Option<IngestionOptions>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestResp {
    result: IngestionResult,
    stats: IngestionStats,
    store: StoreOutcome,
}

/// Request options, falling back to configured defaults; the sink supplies
/// the duplicate snapshot unless the caller sent one.
async fn effective_options(
    state: &AppState,
    opts: Option<IngestionOptions>,
    source_type: SourceType,
) -> IngestionOptions {
    let mut opts = opts.unwrap_or_else(|| IngestionOptions {
        source_type,
        skip_duplicates: state.config.ingestion.skip_duplicates,
        auto_approve: state.config.ingestion.auto_approve,
        ..Default::default()
    });
    if opts.skip_duplicates && opts.existing_listings.is_none() {
        opts.existing_listings = Some(state.sink().snapshot().await);
    }
    opts
}

async fn store_result(
    state: &AppState,
    result: IngestionResult,
) -> Result<Json<IngestResp>, (StatusCode, Json<ErrorBody>)> {
    let store = state
        .sink()
        .store(result.listings.clone())
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))?;
    Ok(Json(IngestResp {
        stats: get_ingestion_stats(&result),
        result,
        store,
    }))
}

async fn listings_ingest(
    State(state): State<AppState>,
    Json(body): Json<IngestReq>,
) -> Result<Json<IngestResp>, (StatusCode, Json<ErrorBody>)> {
    let opts = effective_options(&state, body.options, SourceType::Manual).await;
    let result = process_listing_batch(&body.listings, &opts);
    store_result(&state, result).await
}

// ---- csv ----

async fn csv_parse(body: String) -> Json<CsvParseResult> {
    Json(parse_csv(&body))
}

async fn csv_validate(body: String) -> Json<CsvStructure> {
    Json(validate_csv_structure(&body))
}

async fn csv_import(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<IngestResp>, (StatusCode, Json<ErrorBody>)> {
    let opts = effective_options(&state, None, SourceType::CsvImport).await;
    let result = process_csv_import(&body, &opts);
    if result.created == 0 && result.skipped == 0 && !result.success {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorBody {
                errors: result.errors.into_iter().map(|e| e.message).collect(),
            }),
        ));
    }
    store_result(&state, result).await
}

async fn csv_template() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"listings-template.csv\"",
            ),
        ],
        generate_csv_template(),
    )
}

// ---- sync ----

async fn sync_status_handler(State(state): State<AppState>) -> Json<SyncStatusReport> {
    Json(sync_status(
        &state.sync.registry,
        Utc::now(),
        state.config.scheduler.nightly_hour_utc,
    ))
}

async fn sync_trigger(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SyncOutcome>, (StatusCode, Json<ErrorBody>)> {
    execute_sync_for_source(&state.sync, &id)
        .await
        .map(Json)
        .map_err(|e| {
            let status = match &e {
                SyncError::NotFound(_) => StatusCode::NOT_FOUND,
                SyncError::Inactive(_) => StatusCode::CONFLICT,
                SyncError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                SyncError::Fetch(_) | SyncError::Store(_) => StatusCode::BAD_GATEWAY,
            };
            error_response(status, e.to_string())
        })
}
