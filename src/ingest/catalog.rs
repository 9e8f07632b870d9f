// src/ingest/catalog.rs
//! Reference data the pipeline resolves against: categories, RBS
//! neighborhoods, languages, health-fund subsidies and the alias tables
//! mapping free-form input onto them.
//!
//! Alias keys are lower-case; lookups lower-case and trim the input first.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub name_he: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// (id, name, nameHe, parent)
const BUILTIN_CATEGORIES: &[(&str, &str, &str, Option<&str>)] = &[
    ("cat-emergency", "Emergency", "חירום", None),
    ("cat-zmanim", "Zmanim", "זמנים", None),
    ("cat-services", "Services", "שירותים", None),
    ("cat-whatsup", "WhatsUp RBS", "מה קורה ברמב״ש", None),
    ("cat-deals", "Sales & Deals", "מבצעים", None),
    ("cat-news", "News & Updates", "חדשות ועדכונים", None),
    ("cat-kids", "Kids & Teens", "ילדים ונוער", None),
    ("cat-kids-sports", "Sports", "ספורט", Some("cat-kids")),
    ("cat-kids-dance", "Dance & Movement", "ריקוד ותנועה", Some("cat-kids")),
    ("cat-kids-art", "Art & Creativity", "אמנות ויצירה", Some("cat-kids")),
    ("cat-kids-music", "Music", "מוזיקה", Some("cat-kids")),
    ("cat-kids-tutoring", "Tutoring", "שיעורים פרטיים", Some("cat-kids")),
    ("cat-kids-camps", "Camps", "קייטנות", Some("cat-kids")),
    ("cat-kids-activities", "Activities", "פעילויות", Some("cat-kids")),
    ("cat-seniors", "Seniors", "גיל הזהב", None),
    ("cat-community", "Community", "קהילה", None),
    ("cat-courses", "Courses & Learning", "קורסים ולימודים", None),
    ("cat-beauty", "Beauty", "יופי וטיפוח", None),
    ("cat-home", "Home Improvement", "שיפוצים ותיקונים", None),
    ("cat-simcha", "Simcha Directory", "ספריית שמחות", None),
    ("cat-health", "Health & Wellness", "בריאות ואיכות חיים", None),
    ("cat-realestate", "Real Estate", "נדל״ן", None),
    ("cat-stores", "Stores & Businesses", "חנויות ועסקים", None),
    ("cat-homebiz", "Home Based Businesses", "עסקים מהבית", None),
    ("cat-buysell", "Buy/Sell/Swap", "קנייה/מכירה/החלפה", None),
    ("cat-gemachs", "Gemachs", "גמ״חים", None),
];

/// Last-resort keyword -> category id table for free-form category names.
pub const CATEGORY_NAME_KEYWORDS: &[(&str, &[&str])] = &[
    ("cat-kids-sports", &["sport", "soccer", "basketball", "swim", "כדורגל", "ספורט", "שחייה"]),
    ("cat-kids-music", &["music", "piano", "guitar", "מוזיקה", "פסנתר", "גיטרה"]),
    ("cat-kids-dance", &["dance", "ballet", "jazz", "ריקוד", "בלט"]),
    ("cat-kids-art", &["art", "paint", "draw", "craft", "אומנות", "ציור", "יצירה"]),
    ("cat-kids-tutoring", &["tutor", "math", "english", "homework", "שיעורים", "מתמטיקה"]),
    ("cat-health", &["therapy", "counsel", "psychology", "טיפול", "פסיכולוג"]),
    ("cat-health", &["yoga", "pilates", "gym", "fitness", "יוגה", "כושר"]),
];

pub const RBS_NEIGHBORHOODS: &[&str] = &[
    "רמת בית שמש א",
    "רמת בית שמש ב",
    "רמת בית שמש ג",
    "רמת בית שמש ד",
    "רמת בית שמש ה",
    "בית שמש הותיקה",
    "שעלבים",
];

pub const NEIGHBORHOOD_ALIASES: &[(&str, &str)] = &[
    ("rbs a", "רמת בית שמש א"),
    ("rbs aleph", "רמת בית שמש א"),
    ("ramat beit shemesh a", "רמת בית שמש א"),
    ("ramat beit shemesh aleph", "רמת בית שמש א"),
    ("רמב\"ש א", "רמת בית שמש א"),
    ("רמב״ש א", "רמת בית שמש א"),
    ("רמב'ש א", "רמת בית שמש א"),
    ("rbs b", "רמת בית שמש ב"),
    ("rbs bet", "רמת בית שמש ב"),
    ("ramat beit shemesh b", "רמת בית שמש ב"),
    ("ramat beit shemesh bet", "רמת בית שמש ב"),
    ("רמב\"ש ב", "רמת בית שמש ב"),
    ("רמב״ש ב", "רמת בית שמש ב"),
    ("rbs g", "רמת בית שמש ג"),
    ("rbs gimmel", "רמת בית שמש ג"),
    ("rbs gimel", "רמת בית שמש ג"),
    ("ramat beit shemesh g", "רמת בית שמש ג"),
    ("רמב\"ש ג", "רמת בית שמש ג"),
    ("רמב״ש ג", "רמת בית שמש ג"),
    ("rbs d", "רמת בית שמש ד"),
    ("rbs dalet", "רמת בית שמש ד"),
    ("ramat beit shemesh d", "רמת בית שמש ד"),
    ("רמב\"ש ד", "רמת בית שמש ד"),
    ("רמב״ש ד", "רמת בית שמש ד"),
    ("rbs h", "רמת בית שמש ה"),
    ("rbs hey", "רמת בית שמש ה"),
    ("ramat beit shemesh h", "רמת בית שמש ה"),
    ("רמב\"ש ה", "רמת בית שמש ה"),
    ("רמב״ש ה", "רמת בית שמש ה"),
    ("old beit shemesh", "בית שמש הותיקה"),
    ("old bs", "בית שמש הותיקה"),
    ("beit shemesh vatika", "בית שמש הותיקה"),
    ("shaalvim", "שעלבים"),
    ("sha'alvim", "שעלבים"),
];

pub const PRICE_TYPE_ALIASES: &[(&str, &str)] = &[
    ("fixed", "FIXED"),
    ("one-time", "FIXED"),
    ("single", "FIXED"),
    ("חד פעמי", "FIXED"),
    ("hourly", "HOURLY"),
    ("per hour", "HOURLY"),
    ("לשעה", "HOURLY"),
    ("session", "PER_SESSION"),
    ("per session", "PER_SESSION"),
    ("per class", "PER_SESSION"),
    ("לשיעור", "PER_SESSION"),
    ("monthly", "MONTHLY"),
    ("per month", "MONTHLY"),
    ("חודשי", "MONTHLY"),
    ("לחודש", "MONTHLY"),
    ("contact", "CONTACT"),
    ("call", "CONTACT"),
    ("inquire", "CONTACT"),
    ("ליצירת קשר", "CONTACT"),
    ("free", "FREE"),
    ("חינם", "FREE"),
    ("ללא תשלום", "FREE"),
];

pub const GENDER_ALIASES: &[(&str, &str)] = &[
    ("male", "MALE"),
    ("boys", "MALE"),
    ("men", "MALE"),
    ("בנים", "MALE"),
    ("גברים", "MALE"),
    ("female", "FEMALE"),
    ("girls", "FEMALE"),
    ("women", "FEMALE"),
    ("בנות", "FEMALE"),
    ("נשים", "FEMALE"),
    ("all", "ALL"),
    ("both", "ALL"),
    ("mixed", "ALL"),
    ("everyone", "ALL"),
    ("מעורב", "ALL"),
    ("לכולם", "ALL"),
];

pub const SUPPORTED_LANGUAGES: &[&str] = &["he", "en", "fr", "ru", "es"];

pub const LANGUAGE_ALIASES: &[(&str, &str)] = &[
    ("hebrew", "he"),
    ("עברית", "he"),
    ("english", "en"),
    ("אנגלית", "en"),
    ("french", "fr"),
    ("צרפתית", "fr"),
    ("russian", "ru"),
    ("רוסית", "ru"),
    ("spanish", "es"),
    ("ספרדית", "es"),
];

pub const SUBSIDIES: &[&str] = &["מאוחדת", "כללית", "מכבי", "לאומית"];

pub const SUBSIDY_ALIASES: &[(&str, &str)] = &[
    ("meuhedet", "מאוחדת"),
    ("meuchedet", "מאוחדת"),
    ("clalit", "כללית"),
    ("maccabi", "מכבי"),
    ("macabi", "מכבי"),
    ("leumit", "לאומית"),
];

/// Case-insensitive alias lookup; `key` is trimmed and lower-cased.
pub fn lookup_alias(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    let key = key.trim().to_lowercase();
    table.iter().find(|(alias, _)| *alias == key).map(|(_, v)| *v)
}

/// Known categories. The built-in set is the community directory tree,
/// flattened parent-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
}

static BUILTIN: Lazy<Catalog> = Lazy::new(Catalog::builtin);

/// Shared built-in catalog for the convenience entry points.
pub fn builtin_catalog() -> &'static Catalog {
    &BUILTIN
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    pub fn builtin() -> Self {
        let categories = BUILTIN_CATEGORIES
            .iter()
            .map(|(id, name, name_he, parent)| Category {
                id: (*id).to_string(),
                name: (*name).to_string(),
                name_he: (*name_he).to_string(),
                parent_id: parent.map(str::to_string),
            })
            .collect();
        Self { categories }
    }

    pub fn has_category(&self, id: &str) -> bool {
        self.categories.iter().any(|c| c.id == id)
    }

    /// Resolve a free-form category name to an id: exact name/nameHe, then
    /// containment either way, then the keyword table.
    pub fn match_category(&self, name: &str) -> Option<String> {
        let raw = name.trim();
        if raw.is_empty() {
            return None;
        }
        let lower = raw.to_lowercase();

        if let Some(c) = self
            .categories
            .iter()
            .find(|c| c.name.to_lowercase() == lower || c.name_he == raw)
        {
            return Some(c.id.clone());
        }

        if let Some(c) = self.categories.iter().find(|c| {
            let cname = c.name.to_lowercase();
            cname.contains(&lower) || lower.contains(&cname) || c.name_he.contains(raw)
        }) {
            return Some(c.id.clone());
        }

        CATEGORY_NAME_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
            .map(|(id, _)| (*id).to_string())
            .filter(|id| self.has_category(id))
    }
}

/// Canonical neighborhood for free-form input: alias table first, then the
/// canonical list exactly, then containment either way.
pub fn normalize_neighborhood(raw: &str) -> Option<&'static str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(n) = lookup_alias(NEIGHBORHOOD_ALIASES, trimmed) {
        return Some(n);
    }
    if let Some(n) = RBS_NEIGHBORHOODS.iter().find(|n| **n == trimmed) {
        return Some(*n);
    }
    RBS_NEIGHBORHOODS
        .iter()
        .find(|n| n.contains(trimmed) || trimmed.contains(**n))
        .copied()
}

/// Single-letter Hebrew prefixes (in/to/from/the/and/that) glued to a word.
const HEBREW_PREFIXES: &[char] = &['ב', 'ל', 'מ', 'ה', 'ו', 'ש'];

fn word_bounded_find(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, m)| {
        let mut before = haystack[..i].chars().rev();
        let start_ok = match before.next() {
            None => true,
            Some(c) if !c.is_alphanumeric() => true,
            Some(c) if HEBREW_PREFIXES.contains(&c) => {
                !before.next().is_some_and(char::is_alphanumeric)
            }
            Some(_) => false,
        };
        let after = haystack[i + m.len()..].chars().next();
        start_ok && !after.is_some_and(char::is_alphanumeric)
    })
}

/// First neighborhood mentioned anywhere in free text (canonical names,
/// then aliases), matched on word boundaries. A one-letter Hebrew prefix
/// (`ברמת בית שמש א`) still counts as a boundary.
pub fn find_neighborhood_in_text(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    if let Some(n) = RBS_NEIGHBORHOODS.iter().find(|n| word_bounded_find(&lower, n)) {
        return Some(*n);
    }
    NEIGHBORHOOD_ALIASES
        .iter()
        .find(|(alias, _)| word_bounded_find(&lower, alias))
        .map(|(_, n)| *n)
}
