// src/ingest/normalize.rs
//! Best-effort canonicalization of a (validated) listing input.
//!
//! Nothing here fails: values that cannot be understood are left unset or
//! fall back to a fixed default (`CONTACT` price type, `ALL` gender).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::catalog::{
    builtin_catalog, lookup_alias, Catalog, GENDER_ALIASES, LANGUAGE_ALIASES, PRICE_TYPE_ALIASES,
    SUBSIDIES, SUBSIDY_ALIASES, SUPPORTED_LANGUAGES,
};
use crate::ingest::types::{
    BoolOrText, Gender, ListingDraft, ListingInput, NumberOrText, OneOrMany, PriceType,
};

pub use crate::analyze::patterns::normalize_phone;
pub use crate::ingest::catalog::normalize_neighborhood;

static CURRENCY_PRICE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"₪\s*(\d+(?:,\d{3})*(?:\.\d{1,2})?)",
        r"(\d+(?:,\d{3})*(?:\.\d{1,2})?)\s*₪",
        r#"(?i)(\d+(?:,\d{3})*(?:\.\d{1,2})?)\s*(?:nis|shekel|שקל|ש"ח|ש״ח)"#,
    ]
    .iter()
    .map(|s| Regex::new(s).expect("valid price pattern"))
    .collect()
});

static PLAIN_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?\d+(?:,\d{3})*(?:\.\d+)?$").expect("valid plain number pattern")
});

const TRUTHY: &[&str] = &["true", "yes", "1", "כן"];

/// Amount from free text: currency-marked forms (`₪150`, `150₪`, `150 NIS`,
/// `150 ש"ח`) first, then a bare number (`150`, `1,200.50`, `-5`).
pub fn extract_price(text: &str) -> Option<f64> {
    for pattern in CURRENCY_PRICE_PATTERNS.iter() {
        if let Some(m) = pattern.captures(text).and_then(|c| c.get(1)) {
            return m.as_str().replace(',', "").parse().ok();
        }
    }
    let trimmed = text.trim();
    if PLAIN_NUMBER.is_match(trimmed) {
        return trimmed.replace(',', "").parse().ok();
    }
    None
}

/// Price as a number; `None` when absent-looking or unparseable.
pub fn coerce_price(value: &NumberOrText) -> Option<f64> {
    match value {
        NumberOrText::Number(n) => n.is_finite().then_some(*n),
        NumberOrText::Text(s) => extract_price(s),
    }
}

/// Leading-integer parse (`"6"`, `"6 years"`, `" -2"`). Numbers must be whole.
pub fn coerce_int(value: &NumberOrText) -> Option<i64> {
    match value {
        NumberOrText::Number(n) => {
            (n.is_finite() && n.fract() == 0.0).then_some(*n as i64)
        }
        NumberOrText::Text(s) => {
            let s = s.trim();
            let (sign, digits) = match s.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, s.strip_prefix('+').unwrap_or(s)),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            digits[..end].parse::<i64>().ok().map(|v| sign * v)
        }
    }
}

pub fn coerce_bool(value: &BoolOrText) -> bool {
    match value {
        BoolOrText::Bool(b) => *b,
        BoolOrText::Text(s) => TRUTHY.contains(&s.trim().to_lowercase().as_str()),
    }
}

pub fn normalize_price_type(raw: &str) -> PriceType {
    lookup_alias(PRICE_TYPE_ALIASES, raw)
        .and_then(PriceType::from_code)
        .or_else(|| PriceType::from_code(raw))
        .unwrap_or(PriceType::Contact)
}

pub fn normalize_gender(raw: &str) -> Gender {
    lookup_alias(GENDER_ALIASES, raw)
        .and_then(Gender::from_code)
        .or_else(|| Gender::from_code(raw))
        .unwrap_or(Gender::All)
}

/// Language codes, aliases resolved; unsupported entries are dropped.
pub fn normalize_languages(languages: &OneOrMany) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in languages.items() {
        let lower = item.trim().to_lowercase();
        let code = lookup_alias(LANGUAGE_ALIASES, &lower)
            .map(str::to_string)
            .unwrap_or(lower);
        if SUPPORTED_LANGUAGES.contains(&code.as_str()) && !out.contains(&code) {
            out.push(code);
        }
    }
    out
}

/// Health-fund names, aliases resolved; unknown entries are dropped.
pub fn normalize_subsidies(subsidies: &OneOrMany) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in subsidies.items() {
        let trimmed = item.trim();
        let name = lookup_alias(SUBSIDY_ALIASES, trimmed).unwrap_or(trimmed);
        if SUBSIDIES.contains(&name) && !out.iter().any(|s| s == name) {
            out.push(name.to_string());
        }
    }
    out
}

fn text(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn normalize_listing(input: &ListingInput) -> ListingDraft {
    normalize_listing_with(input, builtin_catalog())
}

/// Canonicalize every field independently. Source metadata is left for the
/// orchestrator.
pub fn normalize_listing_with(input: &ListingInput, catalog: &Catalog) -> ListingDraft {
    let category_id = match text(&input.category_id) {
        Some(id) => Some(id),
        None => text(&input.category_name).and_then(|name| catalog.match_category(&name)),
    };

    ListingDraft {
        title: text(&input.title),
        title_he: text(&input.title_he),
        description: text(&input.description),
        description_he: text(&input.description_he),
        location: text(&input.location),
        category_id,
        provider_id: text(&input.provider_id),
        provider_name: text(&input.provider_name),
        price: input.price.as_ref().and_then(coerce_price),
        price_type: text(&input.price_type).map(|p| normalize_price_type(&p)),
        phone: text(&input.phone).map(|p| normalize_phone(&p)),
        email: text(&input.email),
        website: text(&input.website),
        neighborhood: text(&input.neighborhood)
            .and_then(|n| normalize_neighborhood(&n))
            .map(str::to_string),
        age_min: input.age_min.as_ref().and_then(coerce_int),
        age_max: input.age_max.as_ref().and_then(coerce_int),
        gender: text(&input.gender).map(|g| normalize_gender(&g)),
        instructor_gender: text(&input.instructor_gender).map(|g| normalize_gender(&g)),
        language: input.language.as_ref().map(normalize_languages),
        max_participants: input.max_participants.as_ref().and_then(coerce_int),
        duration: input.duration.as_ref().and_then(coerce_int),
        is_online: input.is_online.as_ref().map(coerce_bool),
        subsidies: input.subsidies.as_ref().map(normalize_subsidies),
        ..ListingDraft::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_text_forms() {
        assert_eq!(extract_price("₪150"), Some(150.0));
        assert_eq!(extract_price("150₪ לשיעור"), Some(150.0));
        assert_eq!(extract_price("1,200 NIS"), Some(1200.0));
        assert_eq!(extract_price(r#"80 ש"ח"#), Some(80.0));
        assert_eq!(extract_price(" 99.5 "), Some(99.5));
        assert_eq!(extract_price("-20"), Some(-20.0));
        assert_eq!(extract_price("call us"), None);
    }

    #[test]
    fn int_coercion_is_prefix_based() {
        assert_eq!(coerce_int(&"6 years".into()), Some(6));
        assert_eq!(coerce_int(&"abc".into()), None);
        assert_eq!(coerce_int(&NumberOrText::Number(7.0)), Some(7));
        assert_eq!(coerce_int(&NumberOrText::Number(7.5)), None);
        assert_eq!(coerce_int(&"-3".into()), Some(-3));
    }

    #[test]
    fn aliases_then_codes_then_defaults() {
        assert_eq!(normalize_price_type("לחודש"), PriceType::Monthly);
        assert_eq!(normalize_price_type("per_session"), PriceType::PerSession);
        assert_eq!(normalize_price_type("whatever"), PriceType::Contact);
        assert_eq!(normalize_gender("Girls"), Gender::Female);
        assert_eq!(normalize_gender("MALE"), Gender::Male);
        assert_eq!(normalize_gender("?"), Gender::All);
    }

    #[test]
    fn languages_and_subsidies_drop_unknowns() {
        let langs = normalize_languages(&OneOrMany::One("Hebrew; english, de,he".into()));
        assert_eq!(langs, vec!["he", "en"]);
        let subs = normalize_subsidies(&OneOrMany::Many(vec![
            "Clalit".into(),
            "מכבי".into(),
            "Harel".into(),
        ]));
        assert_eq!(subs, vec!["כללית", "מכבי"]);
    }

    #[test]
    fn booleans() {
        assert!(coerce_bool(&BoolOrText::Text("כן".into())));
        assert!(coerce_bool(&BoolOrText::Text("YES".into())));
        assert!(!coerce_bool(&BoolOrText::Text("no".into())));
        assert!(coerce_bool(&BoolOrText::Bool(true)));
    }
}
