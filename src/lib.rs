// src/lib.rs
// Public library surface for the service binary, the offline tools and integration tests.

pub mod analyze;
pub mod api;
pub mod chat;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod sentiment;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{EntityExtractor, ExtractedEntity};
pub use crate::api::{router, AppState};
pub use crate::chat::{get_export_stats, is_valid_chat_export, parse_chat_export};
pub use crate::error::{EntityError, SyncError};
pub use crate::ingest::config::{load_config_default, IngestConfig};
pub use crate::ingest::{get_ingestion_stats, process_csv_import, process_listing_batch};
