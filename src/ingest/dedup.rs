// src/ingest/dedup.rs
use serde::Serialize;

use crate::ingest::types::{ExistingListing, ListingInput};

/// Score at which a candidate is treated as a duplicate.
pub const DUPLICATE_THRESHOLD: f64 = 0.7;
/// Existing records scoring above this are listed as matches.
pub const MATCH_REPORT_THRESHOLD: f64 = 0.5;

const EXACT_TITLE: f64 = 0.5;
const PARTIAL_TITLE: f64 = 0.3;
const SAME_PROVIDER: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    /// Highest score across all existing records.
    pub confidence: f64,
    /// Titles of existing records scoring above the report threshold.
    pub matches: Vec<String>,
}

fn title_score(candidate: &str, existing: &str) -> f64 {
    if candidate.is_empty() || existing.is_empty() {
        0.0
    } else if candidate == existing {
        EXACT_TITLE
    } else if candidate.contains(existing) || existing.contains(candidate) {
        PARTIAL_TITLE
    } else {
        0.0
    }
}

fn trimmed(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Score `candidate` against one existing record. Scores add up: English
/// title, Hebrew title and provider each contribute independently.
pub fn similarity(candidate: &ListingInput, existing: &ExistingListing) -> f64 {
    let mut score = 0.0;

    if let Some(title) = trimmed(&candidate.title) {
        score += title_score(&title.to_lowercase(), &existing.title.trim().to_lowercase());
    }
    if let (Some(he), Some(existing_he)) = (trimmed(&candidate.title_he), existing.title_he.as_deref()) {
        score += title_score(he, existing_he.trim());
    }
    if let Some(provider) = trimmed(&candidate.provider_id) {
        if provider == existing.provider_id.trim() {
            score += SAME_PROVIDER;
        }
    }
    score
}

pub fn check_for_duplicates(candidate: &ListingInput, existing: &[ExistingListing]) -> DuplicateCheck {
    let mut confidence: f64 = 0.0;
    let mut matches = Vec::new();

    for record in existing {
        let score = similarity(candidate, record);
        confidence = confidence.max(score);
        if score > MATCH_REPORT_THRESHOLD {
            matches.push(record.title.clone());
        }
    }

    DuplicateCheck {
        // summed tenths: tolerate float drift at the threshold
        is_duplicate: confidence + 1e-9 >= DUPLICATE_THRESHOLD,
        confidence,
        matches,
    }
}
