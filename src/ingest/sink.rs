// src/ingest/sink.rs
//! Where created drafts go once a batch is done.
//!
//! Batches dedupe against a snapshot taken before processing, so two batches
//! running at once can both pass the check. [`MemorySink`] closes that gap by
//! checking again while holding its write lock.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::ingest::dedup::check_for_duplicates;
use crate::ingest::types::{ExistingListing, ListingDraft, ListingInput};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOutcome {
    pub stored: usize,
    /// Titles of drafts dropped as duplicates at write time.
    pub rejected_duplicates: Vec<String>,
}

#[async_trait]
pub trait ListingSink: Send + Sync {
    /// Read-only view used for pre-batch duplicate checks.
    async fn snapshot(&self) -> Vec<ExistingListing>;
    async fn store(&self, drafts: Vec<ListingDraft>) -> Result<StoreOutcome>;
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredListing {
    pub id: Uuid,
    #[serde(flatten)]
    pub draft: ListingDraft,
}

impl StoredListing {
    fn as_existing(&self) -> ExistingListing {
        existing_view(&self.draft)
    }
}

fn existing_view(draft: &ListingDraft) -> ExistingListing {
    ExistingListing {
        title: draft
            .title
            .clone()
            .or_else(|| draft.title_he.clone())
            .unwrap_or_default(),
        title_he: draft.title_he.clone(),
        provider_id: draft.provider_id.clone().unwrap_or_default(),
    }
}

fn as_candidate(draft: &ListingDraft) -> ListingInput {
    ListingInput {
        title: draft.title.clone(),
        title_he: draft.title_he.clone(),
        provider_id: draft.provider_id.clone(),
        ..Default::default()
    }
}

/// In-process store; enough for a single instance and for tests.
#[derive(Default)]
pub struct MemorySink {
    listings: Mutex<Vec<StoredListing>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(existing: Vec<ListingDraft>) -> Self {
        let listings = existing
            .into_iter()
            .map(|draft| StoredListing {
                id: Uuid::new_v4(),
                draft,
            })
            .collect();
        Self {
            listings: Mutex::new(listings),
        }
    }

    pub fn len(&self) -> usize {
        self.listings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.lock().is_empty()
    }

    pub fn all(&self) -> Vec<StoredListing> {
        self.listings.lock().clone()
    }
}

#[async_trait]
impl ListingSink for MemorySink {
    async fn snapshot(&self) -> Vec<ExistingListing> {
        self.listings.lock().iter().map(StoredListing::as_existing).collect()
    }

    async fn store(&self, drafts: Vec<ListingDraft>) -> Result<StoreOutcome> {
        let mut outcome = StoreOutcome::default();
        let mut listings = self.listings.lock();

        for draft in drafts {
            let current: Vec<ExistingListing> =
                listings.iter().map(StoredListing::as_existing).collect();
            let check = check_for_duplicates(&as_candidate(&draft), &current);
            if check.is_duplicate {
                let view = existing_view(&draft);
                tracing::debug!(target: "ingest", confidence = check.confidence, "duplicate dropped at write time");
                outcome.rejected_duplicates.push(view.title);
                continue;
            }
            listings.push(StoredListing {
                id: Uuid::new_v4(),
                draft,
            });
            outcome.stored += 1;
        }
        Ok(outcome)
    }
}
