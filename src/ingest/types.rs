// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A number or a free-form string (`150`, `"₪150"`, `"6"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

impl From<f64> for NumberOrText {
    fn from(v: f64) -> Self {
        NumberOrText::Number(v)
    }
}

impl From<&str> for NumberOrText {
    fn from(v: &str) -> Self {
        NumberOrText::Text(v.to_string())
    }
}

impl NumberOrText {
    /// Numbers are always present; text only when it is non-blank.
    pub fn is_present(&self) -> bool {
        match self {
            NumberOrText::Number(_) => true,
            NumberOrText::Text(s) => !s.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoolOrText {
    Bool(bool),
    Text(String),
}

/// `"he,en"` or `["he", "en"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Splits the single-string form on `,`/`;`.
    pub fn items(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => s.split([',', ';']).map(str::to_string).collect(),
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

/// Raw, untrusted listing record (manual form, CSV row or synced sheet row).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_he: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_he: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    /// Free-form name, resolved fuzzily by the normalizer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<NumberOrText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_min: Option<NumberOrText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_max: Option<NumberOrText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor_gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<OneOrMany>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<NumberOrText>,
    /// Minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<NumberOrText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_online: Option<BoolOrText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsidies: Option<OneOrMany>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    Fixed,
    Hourly,
    PerSession,
    Monthly,
    Contact,
    Free,
}

impl PriceType {
    pub const ALL: [PriceType; 6] = [
        PriceType::Fixed,
        PriceType::Hourly,
        PriceType::PerSession,
        PriceType::Monthly,
        PriceType::Contact,
        PriceType::Free,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PriceType::Fixed => "FIXED",
            PriceType::Hourly => "HOURLY",
            PriceType::PerSession => "PER_SESSION",
            PriceType::Monthly => "MONTHLY",
            PriceType::Contact => "CONTACT",
            PriceType::Free => "FREE",
        }
    }

    /// Case-insensitive match against the canonical codes only (no aliases).
    pub fn from_code(code: &str) -> Option<Self> {
        let upper = code.trim().to_uppercase();
        Self::ALL.into_iter().find(|p| p.as_str() == upper)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    All,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::All];

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::All => "ALL",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let upper = code.trim().to_uppercase();
        Self::ALL.into_iter().find(|g| g.as_str() == upper)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    Draft,
    Pending,
    Active,
    Archived,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    #[default]
    Manual,
    CsvImport,
    GoogleSheets,
    Whatsapp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    #[default]
    Pending,
    Syncing,
    Success,
    Failed,
}

/// Normalized, partially filled listing. The external store assigns ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_he: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_he: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_type: Option<PriceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor_gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsidies: Option<Vec<String>>,

    // Source metadata, attached by the orchestrator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_enabled: Option<bool>,
}

/// Read-only snapshot row used for duplicate checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingListing {
    pub title: String,
    #[serde(default)]
    pub title_he: Option<String>,
    pub provider_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestionOptions {
    pub source_type: SourceType,
    pub source_id: Option<String>,
    pub source_url: Option<String>,
    pub skip_duplicates: bool,
    pub auto_approve: bool,
    /// `None` disables duplicate checking even when `skip_duplicates` is set.
    pub existing_listings: Option<Vec<ExistingListing>>,
}

/// One message in a batch report.
///
/// `row` is the 1-based position among parsed rows. CSV lines the tokenizer
/// rejected never become rows: they carry `row: 0` and the physical `line`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMessage {
    pub row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl RowMessage {
    pub fn at_row(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(line: usize, message: impl Into<String>) -> Self {
        Self {
            row: 0,
            line: Some(line),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RowMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "Line {}: {}", line, self.message),
            None => write!(f, "Row {}: {}", self.row, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionResult {
    pub success: bool,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<RowMessage>,
    pub warnings: Vec<RowMessage>,
    pub listings: Vec<ListingDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionStats {
    pub total: usize,
    pub success_rate: f64,
    pub created: usize,
    pub skipped: usize,
    pub error_count: usize,
    pub warning_count: usize,
}
