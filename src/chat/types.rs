// src/chat/types.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One chat message, possibly reassembled from several physical lines.
///
/// Timestamps are kept as exported (wall-clock, no zone): chat exports carry
/// the device's local time and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMessage {
    pub timestamp: NaiveDateTime,
    /// `"System"` for sender-less notices.
    pub sender_name: String,
    pub sender_phone: Option<String>,
    pub content: String,
    pub is_system_message: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Output of a full parse pass. `messages` keeps file order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub success: bool,
    pub messages: Vec<ParsedMessage>,
    pub group_name: Option<String>,
    pub date_range: DateRange,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportStats {
    pub total_messages: usize,
    pub unique_senders: usize,
    pub system_messages: usize,
    pub date_range: DateRange,
    pub top_senders: Vec<SenderCount>,
}
