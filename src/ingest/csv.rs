// src/ingest/csv.rs
//! Quote-aware CSV reader mapping rows onto [`ListingInput`]s.
//!
//! One record per physical line: quoted fields may hold the delimiter and
//! `""` escapes, not newlines.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ingest::catalog::builtin_catalog;
use crate::ingest::types::{ListingInput, NumberOrText, OneOrMany};

/// Listing fields a CSV column can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CsvField {
    Title,
    TitleHe,
    Description,
    DescriptionHe,
    Category,
    Provider,
    Price,
    PriceType,
    Phone,
    Email,
    Website,
    Location,
    Neighborhood,
    AgeMin,
    AgeMax,
    Gender,
    Language,
    Duration,
    MaxParticipants,
}

/// Target field -> source header name.
pub type ColumnMapping = BTreeMap<CsvField, String>;

/// Header recognizers. Hebrew-variant fields come before their base field so
/// `titleHe` is never taken for `title`.
static HEADER_PATTERNS: Lazy<Vec<(CsvField, Vec<Regex>)>> = Lazy::new(|| {
    let table: &[(CsvField, &[&str])] = &[
        (CsvField::TitleHe, &[r"(?i)^title.?he$", r"(?i)^hebrew.?title$", r"^שם.?עברית$"]),
        (CsvField::Title, &[r"(?i)^title$", r"(?i)^name$", r"(?i)^listing.?name$", r"^שם$"]),
        (CsvField::DescriptionHe, &[r"(?i)^desc(?:ription)?.?he$", r"(?i)^hebrew.?desc"]),
        (CsvField::Description, &[r"(?i)^desc", r"(?i)^about$", r"^תיאור$"]),
        (CsvField::Category, &[r"(?i)^category$", r"(?i)^cat$", r"^קטגוריה$"]),
        (CsvField::Provider, &[r"(?i)^provider(?:.?name)?$", r"(?i)^business$", r"^ספק$", r"^עסק$"]),
        (CsvField::PriceType, &[r"(?i)^price.?type$", r"^סוג.?מחיר$"]),
        (CsvField::Price, &[r"(?i)^price$", r"(?i)^cost$", r"^מחיר$"]),
        (CsvField::Phone, &[r"(?i)^phone$", r"(?i)^tel$", r"(?i)^mobile$", r"^טלפון$"]),
        (CsvField::Email, &[r"(?i)^e-?mail$", r"(?i)^mail$", r"^דוא.?ל$"]),
        (CsvField::Website, &[r"(?i)^website$", r"(?i)^url$", r"(?i)^site$", r"^אתר$"]),
        (CsvField::Location, &[r"(?i)^location$", r"(?i)^address$", r"^כתובת$", r"^מיקום$"]),
        (CsvField::Neighborhood, &[r"(?i)^neighbou?rhood$", r"(?i)^area$", r"^שכונה$"]),
        (CsvField::AgeMin, &[r"(?i)^age.?min$", r"(?i)^min.?age$", r"^גיל.?מינימום$"]),
        (CsvField::AgeMax, &[r"(?i)^age.?max$", r"(?i)^max.?age$", r"^גיל.?מקסימום$"]),
        (CsvField::Gender, &[r"(?i)^gender$", r"(?i)^for$", r"^מגדר$"]),
        (CsvField::Language, &[r"(?i)^languages?$", r"(?i)^lang$", r"^שפה$"]),
        (CsvField::Duration, &[r"(?i)^duration$", r"(?i)^length$", r"^משך$"]),
        (
            CsvField::MaxParticipants,
            &[r"(?i)^max.?participants$", r"(?i)^capacity$", r"^מקסימום.?משתתפים$"],
        ),
    ];
    table
        .iter()
        .map(|(field, patterns)| {
            let compiled = patterns
                .iter()
                .map(|p| Regex::new(p).expect("valid header pattern"))
                .collect();
            (*field, compiled)
        })
        .collect()
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CsvParseOptions {
    pub delimiter: char,
    pub has_headers: bool,
    /// Explicit mapping; auto-detected from the header row when absent.
    pub column_mapping: Option<ColumnMapping>,
    pub skip_empty_rows: bool,
}

impl Default for CsvParseOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_headers: true,
            column_mapping: None,
            skip_empty_rows: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvParseResult {
    /// False only for structurally unusable input (empty file).
    pub success: bool,
    pub headers: Vec<String>,
    pub rows: Vec<ListingInput>,
    /// Per-row problems (`"Row N: ..."`, N = physical line); other rows still parse.
    pub errors: Vec<String>,
    /// Physical line numbers behind `errors`, in the same order.
    pub failed_lines: Vec<usize>,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvStructure {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub row_count: usize,
    pub column_count: usize,
}

/// Split one line into trimmed fields.
pub fn parse_csv_line(line: &str, delimiter: char) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => current.push(c),
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == delimiter {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current.trim().to_string());
    Ok(fields)
}

/// Map headers to fields. For each header the first matching field wins; a
/// field already claimed by an earlier header keeps that header.
pub fn auto_detect_column_mapping(headers: &[String]) -> ColumnMapping {
    let mut mapping = ColumnMapping::new();
    for header in headers {
        let h = header.trim();
        let Some((field, _)) = HEADER_PATTERNS
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(h)))
        else {
            continue;
        };
        mapping.entry(*field).or_insert_with(|| header.clone());
    }
    mapping
}

fn assign(row: &mut ListingInput, field: CsvField, value: String) {
    match field {
        CsvField::Title => row.title = Some(value),
        CsvField::TitleHe => row.title_he = Some(value),
        CsvField::Description => row.description = Some(value),
        CsvField::DescriptionHe => row.description_he = Some(value),
        CsvField::Category => {
            if builtin_catalog().has_category(&value) {
                row.category_id = Some(value);
            } else {
                row.category_name = Some(value);
            }
        }
        CsvField::Provider => row.provider_name = Some(value),
        CsvField::Price => row.price = Some(NumberOrText::Text(value)),
        CsvField::PriceType => row.price_type = Some(value),
        CsvField::Phone => row.phone = Some(value),
        CsvField::Email => row.email = Some(value),
        CsvField::Website => row.website = Some(value),
        CsvField::Location => row.location = Some(value),
        CsvField::Neighborhood => row.neighborhood = Some(value),
        CsvField::AgeMin => row.age_min = Some(NumberOrText::Text(value)),
        CsvField::AgeMax => row.age_max = Some(NumberOrText::Text(value)),
        CsvField::Gender => row.gender = Some(value),
        CsvField::Language => row.language = Some(OneOrMany::One(value)),
        CsvField::Duration => row.duration = Some(NumberOrText::Text(value)),
        CsvField::MaxParticipants => row.max_participants = Some(NumberOrText::Text(value)),
    }
}

/// Resolve a header-name mapping to column indices (case-insensitive).
fn resolve_columns(headers: &[String], mapping: &ColumnMapping) -> Vec<(CsvField, usize)> {
    mapping
        .iter()
        .filter_map(|(field, column)| {
            let column = column.trim().to_lowercase();
            headers
                .iter()
                .position(|h| h.trim().to_lowercase() == column)
                .map(|idx| (*field, idx))
        })
        .collect()
}

fn map_row(values: &[String], columns: &[(CsvField, usize)]) -> ListingInput {
    let mut row = ListingInput::default();
    for (field, idx) in columns {
        if let Some(value) = values.get(*idx).map(|v| v.trim()).filter(|v| !v.is_empty()) {
            assign(&mut row, *field, value.to_string());
        }
    }
    row
}

pub fn parse_csv(content: &str) -> CsvParseResult {
    parse_csv_with(content, &CsvParseOptions::default())
}

pub fn parse_csv_with(content: &str, opts: &CsvParseOptions) -> CsvParseResult {
    // (1-based physical line number, text)
    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !opts.skip_empty_rows || !l.trim().is_empty())
        .collect();

    if lines.is_empty() {
        return CsvParseResult {
            success: false,
            errors: vec!["CSV file is empty".to_string()],
            ..Default::default()
        };
    }

    let mut errors = Vec::new();
    let mut failed_lines = Vec::new();
    let mut data = &lines[..];
    let mut headers = Vec::new();
    if opts.has_headers {
        let (line_no, header_line) = lines[0];
        match parse_csv_line(header_line, opts.delimiter) {
            Ok(h) => headers = h,
            Err(e) => {
                errors.push(format!("Row {line_no}: {e}"));
                failed_lines.push(line_no);
            }
        }
        data = &lines[1..];
    }

    let mapping = opts
        .column_mapping
        .clone()
        .unwrap_or_else(|| auto_detect_column_mapping(&headers));
    let columns = resolve_columns(&headers, &mapping);

    let mut rows = Vec::with_capacity(data.len());
    for (line_no, line) in data {
        match parse_csv_line(line, opts.delimiter) {
            Ok(values) => rows.push(map_row(&values, &columns)),
            Err(e) => {
                errors.push(format!("Row {line_no}: {e}"));
                failed_lines.push(*line_no);
            }
        }
    }

    tracing::debug!(
        target: "ingest",
        rows = rows.len(),
        mapped_columns = columns.len(),
        errors = errors.len(),
        "csv parsed"
    );

    CsvParseResult {
        success: true,
        row_count: rows.len(),
        headers,
        rows,
        errors,
        failed_lines,
    }
}

/// Structural pre-check: non-empty, at least two columns, every row as wide
/// as the header. Counts are reported even when the check fails.
pub fn validate_csv_structure(content: &str) -> CsvStructure {
    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();

    let Some(((_, header), rest)) = lines.split_first() else {
        return CsvStructure {
            is_valid: false,
            errors: vec!["File is empty".to_string()],
            row_count: 0,
            column_count: 0,
        };
    };

    let mut errors = Vec::new();
    let column_count = match parse_csv_line(header, ',') {
        Ok(h) => h.len(),
        Err(e) => {
            errors.push(format!("Header: {e}"));
            0
        }
    };
    if column_count < 2 {
        errors.push("CSV should have at least 2 columns".to_string());
    }

    for (line_no, line) in rest {
        match parse_csv_line(line, ',') {
            Ok(v) if v.len() != column_count => errors.push(format!(
                "Row {line_no} has {} columns, expected {column_count}",
                v.len()
            )),
            Ok(_) => {}
            Err(e) => errors.push(format!("Row {line_no}: {e}")),
        }
    }

    CsvStructure {
        is_valid: errors.is_empty(),
        errors,
        row_count: rest.len(),
        column_count,
    }
}

pub const TEMPLATE_HEADERS: &[&str] = &[
    "title",
    "titleHe",
    "description",
    "descriptionHe",
    "category",
    "provider",
    "price",
    "priceType",
    "phone",
    "email",
    "location",
    "neighborhood",
    "ageMin",
    "ageMax",
    "gender",
    "language",
    "duration",
    "maxParticipants",
];

const TEMPLATE_SAMPLE: &[&str] = &[
    "Kids Soccer Classes",
    "חוג כדורגל לילדים",
    "Professional soccer training for kids",
    "אימוני כדורגל מקצועיים לילדים",
    "Sports",
    "RBS Kids Sports",
    "200",
    "MONTHLY",
    "052-123-4567",
    "info@example.com",
    "Sports Center, Main Street",
    "רמת בית שמש א",
    "6",
    "12",
    "ALL",
    "he,en",
    "60",
    "20",
];

/// Header row plus one fully populated, quoted sample row.
pub fn generate_csv_template() -> String {
    let sample = TEMPLATE_SAMPLE
        .iter()
        .map(|v| format!("\"{}\"", v.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",");
    format!("{}\n{}", TEMPLATE_HEADERS.join(","), sample)
}
