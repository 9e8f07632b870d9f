// src/ingest/mod.rs
pub mod catalog;
pub mod config;
pub mod csv;
pub mod dedup;
pub mod normalize;
pub mod scheduler;
pub mod sink;
pub mod sync;
pub mod types;
pub mod validation;

use std::time::Instant;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::ingest::csv::parse_csv;
use crate::ingest::dedup::check_for_duplicates;
use crate::ingest::normalize::normalize_listing;
use crate::ingest::types::{
    IngestionOptions, IngestionResult, IngestionStats, ListingInput, ListingStatus, RowMessage,
    SourceType,
};
use crate::ingest::validation::validate_listing;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_rows_created_total", "Listing rows accepted into a batch result.");
        describe_counter!(
            "ingest_rows_skipped_total",
            "Listing rows skipped (invalid or duplicate)."
        );
        describe_counter!(
            "ingest_validation_errors_total",
            "Validation errors reported across all rows."
        );
        describe_counter!("ingest_duplicates_total", "Rows skipped as likely duplicates.");
        describe_histogram!("ingest_batch_ms", "Batch processing time in milliseconds.");
        describe_counter!("sync_runs_total", "External source sync runs.");
        describe_counter!("sync_failures_total", "External source sync runs that failed.");
        describe_gauge!("sync_last_run_ts", "Unix ts of the last sync run.");
    });
}

fn field_message(field: &str, message: &str) -> String {
    format!("{field}: {message}")
}

/// Validate, dedupe and normalize a batch. A bad row never aborts the batch:
/// its problems are reported against its 1-based position and the next row
/// is processed.
pub fn process_listing_batch(inputs: &[ListingInput], opts: &IngestionOptions) -> IngestionResult {
    ensure_metrics_described();
    let started = Instant::now();

    let mut result = IngestionResult {
        success: true,
        ..Default::default()
    };
    let mut validation_errors = 0usize;
    let mut duplicates = 0usize;

    let existing = opts
        .existing_listings
        .as_deref()
        .filter(|_| opts.skip_duplicates);

    for (idx, input) in inputs.iter().enumerate() {
        let row = idx + 1;
        let validation = validate_listing(input);

        for w in &validation.warnings {
            result
                .warnings
                .push(RowMessage::at_row(row, field_message(&w.field, &w.message)));
        }

        if !validation.is_valid {
            validation_errors += validation.errors.len();
            for e in &validation.errors {
                result
                    .errors
                    .push(RowMessage::at_row(row, field_message(&e.field, &e.message)));
            }
            result.skipped += 1;
            result.success = false;
            tracing::debug!(target: "ingest", row, errors = validation.errors.len(), "row rejected");
            continue;
        }

        if let Some(existing) = existing {
            let dup = check_for_duplicates(input, existing);
            if dup.is_duplicate {
                result.warnings.push(RowMessage::at_row(
                    row,
                    format!(
                        "Potential duplicate: {} ({}% confidence)",
                        dup.matches.join(", "),
                        (dup.confidence * 100.0).round() as i64
                    ),
                ));
                result.skipped += 1;
                duplicates += 1;
                tracing::debug!(target: "ingest", row, confidence = dup.confidence, "duplicate skipped");
                continue;
            }
        }

        let mut draft = normalize_listing(input);
        draft.source_type = Some(opts.source_type);
        draft.source_id = opts.source_id.clone();
        draft.source_url = opts.source_url.clone();
        draft.submitted_at = Some(Utc::now());
        draft.status = Some(if opts.auto_approve {
            ListingStatus::Active
        } else {
            ListingStatus::Pending
        });
        draft.sync_enabled = Some(opts.source_type == SourceType::GoogleSheets);

        result.listings.push(draft);
        result.created += 1;
    }

    counter!("ingest_rows_created_total").increment(result.created as u64);
    counter!("ingest_rows_skipped_total").increment(result.skipped as u64);
    counter!("ingest_validation_errors_total").increment(validation_errors as u64);
    counter!("ingest_duplicates_total").increment(duplicates as u64);
    histogram!("ingest_batch_ms").record(started.elapsed().as_secs_f64() * 1000.0);

    tracing::info!(
        target: "ingest",
        source = ?opts.source_type,
        rows = inputs.len(),
        created = result.created,
        skipped = result.skipped,
        duplicates,
        "batch processed"
    );

    result
}

/// Parse CSV text and run the rows through [`process_listing_batch`].
///
/// An empty file is fatal. Lines the tokenizer rejects are reported with
/// `line` set to their physical line number and no row; every other row is
/// still imported and its messages use the parsed row order.
pub fn process_csv_import(content: &str, opts: &IngestionOptions) -> IngestionResult {
    let parsed = parse_csv(content);
    if !parsed.success {
        return IngestionResult {
            success: false,
            errors: parsed
                .errors
                .into_iter()
                .map(|message| RowMessage::at_row(0, message))
                .collect(),
            ..Default::default()
        };
    }

    let mut result = process_listing_batch(&parsed.rows, opts);
    if !parsed.errors.is_empty() {
        result.success = false;
        result.errors.extend(
            parsed
                .failed_lines
                .into_iter()
                .zip(parsed.errors)
                .map(|(line, message)| RowMessage::at_line(line, message)),
        );
    }
    result
}

pub fn get_ingestion_stats(result: &IngestionResult) -> IngestionStats {
    let total = result.created + result.skipped;
    let success_rate = if total > 0 {
        result.created as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    IngestionStats {
        total,
        success_rate,
        created: result.created,
        skipped: result.skipped,
        error_count: result.errors.len(),
        warning_count: result.warnings.len(),
    }
}
