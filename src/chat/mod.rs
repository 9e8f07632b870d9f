// src/chat/mod.rs
//! Chat export ingestion: raw WhatsApp text in, ordered messages out.

pub mod parser;
pub mod types;

pub use parser::{get_export_stats, is_valid_chat_export, parse_chat_export};
pub use types::{DateRange, ExportStats, ParseResult, ParsedMessage, SenderCount};
