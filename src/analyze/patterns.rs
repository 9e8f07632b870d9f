// src/analyze/patterns.rs
//! Hebrew/English pattern library for chat extraction.
//!
//! Everything here is either a lookup table or a small matcher over one.
//! Tables are plain `&[...]` slices so new aliases/keywords can be added
//! without touching the matchers; order inside a table is the tie-break
//! wherever "first match wins".
//!
//! Regexes must stay compatible with the `regex` crate (no lookarounds);
//! digit boundaries are therefore checked by hand in [`digit_bounded`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::ingest::types::PriceType;
use crate::sentiment::is_negated_at;

/// Bumped whenever a table below changes meaningfully.
pub const TABLE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Ordered category -> keywords table. First category with a hit wins.
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "sports",
        &[
            "כדורגל", "כדורסל", "שחייה", "ריצה", "אופניים", "ג'ימבורי", "התעמלות", "soccer",
            "basketball", "swimming", "running", "biking", "gymnastics", "ספורט", "אימון",
            "כושר", "sport", "training", "fitness",
        ],
    ),
    (
        "music",
        &[
            "פסנתר", "גיטרה", "כינור", "חליל", "תופים", "זמרה", "מוזיקה", "piano", "guitar",
            "violin", "flute", "drums", "singing", "music",
        ],
    ),
    (
        "dance",
        &["ריקוד", "מחול", "בלט", "היפ הופ", "סלסה", "dance", "ballet", "hip hop", "salsa"],
    ),
    (
        "art",
        &[
            "ציור", "אמנות", "יצירה", "קרמיקה", "פיסול", "art", "painting", "drawing",
            "ceramics", "sculpture",
        ],
    ),
    (
        "tutoring",
        &[
            "מתמטיקה", "אנגלית", "פיזיקה", "כימיה", "שיעורים פרטיים", "עזרה בשיעורים", "math",
            "english", "physics", "chemistry", "tutoring", "homework help",
        ],
    ),
    (
        "therapy",
        &[
            "טיפול", "פסיכולוג", "קלינאי", "ריפוי בעיסוק", "פיזיותרפיה", "therapy",
            "psychologist", "occupational", "physiotherapy",
        ],
    ),
];

pub const POSITIVE_KEYWORDS: &[&str] = &[
    "מעולה", "מומלץ", "אהבנו", "מקצועי", "אדיב", "יעיל", "מצוין", "נהדר", "טוב מאוד", "ממליץ",
    "ממליצה", "excellent", "great", "amazing", "professional", "wonderful", "fantastic", "love",
    "recommend",
];

pub const NEGATIVE_KEYWORDS: &[&str] = &[
    "גרוע", "נורא", "איכזב", "לא מקצועי", "יקר מדי", "בעייתי", "לא ממליץ", "terrible", "awful",
    "disappointed", "unprofessional", "overpriced", "avoid",
];

pub const STRONG_RECOMMEND_PHRASES: &[&str] = &[
    "ממליץ בחום",
    "מאוד ממליץ",
    "ממליצה בחום",
    "מאוד ממליצה",
    "highly recommend",
    "strongly recommend",
];

pub const RECOMMEND_KEYWORDS: &[&str] = &[
    "ממליץ", "ממליצה", "recommend", "מומלץ", "מומלצת", "אהבנו", "מעולה", "מקצועי", "מקצועית",
    "עבד מצוין", "עבדה מצוין",
];

pub const NOT_RECOMMEND_PHRASES: &[&str] = &[
    "לא ממליץ",
    "לא ממליצה",
    "לא לפנות",
    "להימנע מ",
    "don't recommend",
    "avoid",
    "wouldn't recommend",
    "גרוע",
    "איכזב",
    "בעייתי",
];

pub const HIGH_URGENCY_KEYWORDS: &[&str] = &["דחוף", "בדחיפות", "urgent", "asap", "היום", "today"];
pub const MEDIUM_URGENCY_KEYWORDS: &[&str] = &["בהקדם", "השבוע", "soon", "this week"];

// ---------------------------------------------------------------------------
// Compiled patterns
// ---------------------------------------------------------------------------

fn re(src: &str) -> Regex {
    // All sources below are literals covered by the unit tests.
    Regex::new(src).unwrap_or_else(|e| panic!("invalid built-in pattern {src:?}: {e}"))
}

static PHONE_MOBILE: Lazy<Regex> =
    Lazy::new(|| re(r"(?:\+972|972|0)?[- ]?5[0-9][- ]?\d{3}[- ]?\d{4}"));
static PHONE_LANDLINE: Lazy<Regex> =
    Lazy::new(|| re(r"(?:\+972|972|0)[- ]?[2-489][- ]?\d{3}[- ]?\d{4}"));
static PHONE_WITH_PREFIX: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)(?:טלפון|טל[׳']?|phone|tel|נייד)[:\s]*([0-9\-+() ]{9,15})"));

static EMAIL: Lazy<Regex> = Lazy::new(|| re(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"));
static WEBSITE: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)\b(?:https?://[^\s]+|www\.[^\s]+|[a-z0-9][a-z0-9-]*(?:\.[a-z0-9-]+)*\.(?:com|org|net|il|io|info|biz|co)(?:/[^\s]*)?)")
});

const CURRENCY: &str = r#"(?:₪|ש[״"]ח|שקל(?:ים)?|NIS)"#;

static PRICE_PER_UNIT: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r"(?i)(\d[\d,]*(?:\.\d{{2}})?)\s*{CURRENCY}\s*(?:ל|per|/)\s*(שעה|חודש|שיעור|פעם|hour|month|session|lesson|class)"
    ))
});
static PRICE_CURRENCY_BEFORE: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i){CURRENCY}\s*(\d[\d,]*(?:\.\d{{2}})?)")));
static PRICE_CURRENCY_AFTER: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i)(\d[\d,]*(?:\.\d{{2}})?)\s*{CURRENCY}")));

/// Service-request phrase templates, tried in order. Group 1 is the request body.
static SERVICE_REQUEST_TEMPLATES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "looking_for",
            re(r"(?i)(?:מחפשות|מחפשים|מחפשת|מחפש|looking for|\bneeds?)\s+(.{10,150})"),
        ),
        (
            "anyone_know",
            re(r"(?i)(?:מישהו מכיר|מישהי מכירה|anyone knows?|does anyone)\s+(.{10,150})"),
        ),
        (
            "recommendation_for",
            re(r"(?i)(?:המלצה ל|המלצות ל|recommend(?:ation)?s? for)\s*(.{10,150})"),
        ),
        (
            "does_anyone_have",
            re(r"(?i)(?:יש למישהו|יש למישהי|does anyone have)\s+(.{10,150})"),
        ),
        ("need", re(r"(?:אני צריך|צריכים|צריכה|צריך)\s+(.{10,150})")),
    ]
});

static HEBREW_BUSINESS: Lazy<Regex> =
    Lazy::new(|| re(r"(?:חוג|סטודיו|מכון|קליניקה|מרפאה|חנות) +[א-ת][א-ת ]{1,29}"));
static ENGLISH_BUSINESS: Lazy<Regex> =
    Lazy::new(|| re(r"\b[A-Z][a-zA-Z]+(?: +[A-Z][a-zA-Z]+){1,3}\b"));

static AGE_RANGE: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)(?:גילאי|גיל|בני|בנות|ages?)\s*(\d{1,2})(?:\s*(?:-|–|עד|to)\s*(\d{1,2}))?")
});

static SYSTEM_MESSAGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^.+צורף/ה לקבוצה$",
        r"^.+הצטרף/ה לקבוצה",
        r"^.+הוסיף/ה את .+$",
        r"^.+עזב/ה$",
        r"^.+הוסר/ה$",
        r"^.+שינה/תה את שם הקבוצה",
        r"^.+שינה/תה את תמונת הקבוצה$",
        r"(?i)^.+ added .+$",
        r"(?i)^.+ left$",
        r"(?i)^.+ removed .+$",
        r"(?i)^.+ joined using this group's invite link$",
        r"(?i)^.+ changed the subject",
        r"(?i)^.+ changed this group's icon$",
        r"(?i)^Messages and calls are end-to-end encrypted",
        r"^הודעות ושיחות מוצפנות",
        r"^<מדיה לא נכללה>",
        r"(?i)^<Media omitted>",
        r"(?i)^This message was deleted$",
        r"^הודעה זו נמחקה$",
    ]
    .iter()
    .map(|s| re(s))
    .collect()
});

// ---------------------------------------------------------------------------
// Matchers
// ---------------------------------------------------------------------------

/// Join/leave/encryption/media notices, Hebrew and English.
pub fn is_system_message(content: &str) -> bool {
    let content = content.trim();
    SYSTEM_MESSAGE_PATTERNS.iter().any(|p| p.is_match(content))
}

/// Normalize an Israeli phone number.
///
/// Keeps digits and `+`, folds `+972`/`972` into a leading `0`, restores a
/// dropped leading zero on 9-digit mobiles, then formats 10-digit numbers as
/// `0XX-XXX-XXXX` and 9-digit landlines as `0X-XXX-XXXX`. Anything else is
/// returned cleaned but unformatted. Idempotent.
pub fn normalize_phone(phone: &str) -> String {
    let mut cleaned: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if let Some(rest) = cleaned.strip_prefix("+972") {
        cleaned = format!("0{rest}");
    } else if let Some(rest) = cleaned.strip_prefix("972") {
        cleaned = format!("0{rest}");
    }

    if !cleaned.starts_with('0') && cleaned.len() == 9 && cleaned.starts_with('5') {
        cleaned = format!("0{cleaned}");
    }

    if cleaned.starts_with('0') && cleaned.chars().all(|c| c.is_ascii_digit()) {
        match cleaned.len() {
            10 => return format!("{}-{}-{}", &cleaned[..3], &cleaned[3..6], &cleaned[6..]),
            9 => return format!("{}-{}-{}", &cleaned[..2], &cleaned[2..5], &cleaned[5..]),
            _ => {}
        }
    }
    cleaned
}

/// True when the match is not glued to other digits on either side.
fn digit_bounded(text: &str, span: &Range<usize>) -> bool {
    let before = text[..span.start].chars().next_back();
    let after = text[span.end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Extract distinct, normalized phone numbers (first-seen order).
///
/// Mobile numbers are matched first; landline hits that overlap a mobile hit
/// are ignored so `052-...` never also yields a bogus `02-...`.
pub fn extract_phone_numbers(text: &str) -> Vec<String> {
    let mut spans: Vec<Range<usize>> = Vec::new();
    let mut raw: Vec<&str> = Vec::new();

    for m in PHONE_MOBILE.find_iter(text) {
        let span = m.range();
        if digit_bounded(text, &span) {
            spans.push(span);
            raw.push(m.as_str());
        }
    }
    for m in PHONE_LANDLINE.find_iter(text) {
        let span = m.range();
        if digit_bounded(text, &span) && !spans.iter().any(|s| overlaps(s, &span)) {
            spans.push(span);
            raw.push(m.as_str());
        }
    }
    for caps in PHONE_WITH_PREFIX.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            raw.push(m.as_str());
        }
    }

    let mut out: Vec<String> = Vec::new();
    for r in raw {
        let phone = normalize_phone(r);
        // Only keep numbers that normalized into a recognizable Israeli shape.
        if phone.contains('-') && !out.contains(&phone) {
            out.push(phone);
        }
    }
    out
}

pub fn extract_emails(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in EMAIL.find_iter(text) {
        let email = m.as_str().trim_end_matches('.').to_string();
        if !out.contains(&email) {
            out.push(email);
        }
    }
    out
}

/// Websites, excluding the domain part of e-mail addresses.
pub fn extract_websites(text: &str) -> Vec<String> {
    let email_spans: Vec<Range<usize>> = EMAIL.find_iter(text).map(|m| m.range()).collect();
    let mut out: Vec<String> = Vec::new();
    for m in WEBSITE.find_iter(text) {
        if email_spans.iter().any(|s| overlaps(s, &m.range())) {
            continue;
        }
        let site = m
            .as_str()
            .trim_end_matches(['.', ',', '!', '?', ')', ';', ':'])
            .to_string();
        if !site.is_empty() && !out.contains(&site) {
            out.push(site);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMention {
    pub amount: f64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub price_type: Option<PriceType>,
}

fn plausible_amount(raw: &str) -> Option<f64> {
    let amount: f64 = raw.replace(',', "").parse().ok()?;
    (amount > 0.0 && amount < 100_000.0).then_some(amount)
}

fn unit_to_price_type(unit: &str) -> PriceType {
    let unit = unit.to_lowercase();
    if unit.contains("שעה") || unit.contains("hour") {
        PriceType::Hourly
    } else if unit.contains("חודש") || unit.contains("month") {
        PriceType::Monthly
    } else if unit.contains("שיעור")
        || unit.contains("lesson")
        || unit.contains("session")
        || unit.contains("class")
    {
        PriceType::PerSession
    } else {
        PriceType::Fixed
    }
}

/// Extract shekel amounts.
///
/// Per-unit forms are matched first and claim their number; plain
/// `₪`-prefixed/suffixed hits on an already-claimed number are skipped, so
/// `200 ש"ח לחודש` yields a single monthly price. Amounts outside
/// `(0, 100000)` are dropped as implausible.
pub fn extract_prices(text: &str) -> Vec<PriceMention> {
    let mut claimed: Vec<Range<usize>> = Vec::new();
    let mut out = Vec::new();

    for caps in PRICE_PER_UNIT.captures_iter(text) {
        let (Some(num), Some(unit)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        claimed.push(num.range());
        if let Some(amount) = plausible_amount(num.as_str()) {
            out.push(PriceMention {
                amount,
                price_type: Some(unit_to_price_type(unit.as_str())),
            });
        }
    }

    for pattern in [&*PRICE_CURRENCY_BEFORE, &*PRICE_CURRENCY_AFTER] {
        for caps in pattern.captures_iter(text) {
            let Some(num) = caps.get(1) else { continue };
            let span = num.range();
            if claimed.iter().any(|c| overlaps(c, &span)) {
                continue;
            }
            claimed.push(span);
            if let Some(amount) = plausible_amount(num.as_str()) {
                out.push(PriceMention {
                    amount,
                    price_type: None,
                });
            }
        }
    }
    out
}

/// A service request: which template fired and the captured request body.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequestMatch {
    pub template: &'static str,
    pub description: String,
}

pub fn detect_service_request(text: &str) -> Option<ServiceRequestMatch> {
    SERVICE_REQUEST_TEMPLATES.iter().find_map(|(name, pattern)| {
        let caps = pattern.captures(text)?;
        let body = caps.get(1)?.as_str().trim();
        (body.chars().count() >= 10).then(|| ServiceRequestMatch {
            template: *name,
            description: body.to_string(),
        })
    })
}

/// Which recommendation tier fired first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationTier {
    Strong,
    Positive,
    Negative,
}

fn occurrences<'a>(haystack: &'a str, needle: &'a str) -> impl Iterator<Item = Range<usize>> + 'a {
    haystack
        .match_indices(needle)
        .map(move |(i, _)| i..i + needle.len())
}

/// Three-tier recommendation detection.
///
/// Strong phrases outrank plain positive keywords, which outrank negative
/// phrases. A positive hit that sits inside a negative phrase or right after
/// a negator (`לא ממליץ`, `don't recommend`) is not a positive hit.
pub fn detect_recommendation(text: &str) -> Option<RecommendationTier> {
    let lower = text.to_lowercase();

    let negative_spans: Vec<Range<usize>> = NOT_RECOMMEND_PHRASES
        .iter()
        .flat_map(|p| occurrences(&lower, p).collect::<Vec<_>>())
        .collect();

    let positive_hit = |phrases: &[&str]| {
        phrases.iter().any(|p| {
            occurrences(&lower, p).any(|span| {
                !negative_spans.iter().any(|n| overlaps(n, &span)) && !is_negated_at(&lower, span.start)
            })
        })
    };

    if positive_hit(STRONG_RECOMMEND_PHRASES) {
        return Some(RecommendationTier::Strong);
    }
    if positive_hit(RECOMMEND_KEYWORDS) {
        return Some(RecommendationTier::Positive);
    }
    let negated_positive = RECOMMEND_KEYWORDS
        .iter()
        .any(|p| occurrences(&lower, p).any(|span| is_negated_at(&lower, span.start)));
    if !negative_spans.is_empty() || negated_positive {
        return Some(RecommendationTier::Negative);
    }
    None
}

/// First category whose keyword list hits (case-insensitive substring).
pub fn detect_category(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(&k.to_lowercase())))
        .map(|(category, _)| *category)
}

/// Business-like names. Hebrew prefixed names first, then English
/// capitalized multi-word names. At most three words follow a Hebrew prefix.
pub fn extract_business_names(text: &str) -> Vec<(String, bool)> {
    let mut out: Vec<(String, bool)> = Vec::new();
    for m in HEBREW_BUSINESS.find_iter(text) {
        let name = m
            .as_str()
            .split_whitespace()
            .take(4)
            .collect::<Vec<_>>()
            .join(" ");
        if !out.iter().any(|(n, _)| *n == name) {
            out.push((name, true));
        }
    }
    for m in ENGLISH_BUSINESS.find_iter(text) {
        let name = m.as_str().to_string();
        if !out.iter().any(|(n, _)| *n == name) {
            out.push((name, false));
        }
    }
    out
}

/// `"5-7"`, `"6"`, from `גיל 5-7`, `ages 5 to 7`, `בני 6`.
pub fn extract_age_range(text: &str) -> Option<String> {
    let caps = AGE_RANGE.captures(text)?;
    let min = caps.get(1)?.as_str();
    Some(match caps.get(2) {
        Some(max) => format!("{min}-{}", max.as_str()),
        None => min.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

pub fn detect_urgency(text: &str) -> Urgency {
    let lower = text.to_lowercase();
    if HIGH_URGENCY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Urgency::High
    } else if MEDIUM_URGENCY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}
