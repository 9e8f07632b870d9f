// src/ingest/validation.rs
//! Listing validation. Every rule runs on every call, so one pass reports
//! every problem; errors block ingestion, warnings never do.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ingest::catalog::{builtin_catalog, normalize_neighborhood, Catalog};
use crate::ingest::normalize::{coerce_int, coerce_price};
use crate::ingest::types::{Gender, ListingInput, NumberOrText, PriceType};

/// Prices above this are flagged, never rejected.
pub const HIGH_PRICE_THRESHOLD: f64 = 100_000.0;

static ISRAELI_PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\+972|972|0)(?:5[0-9]|[2-4]|[7-9])[0-9]{7}$").expect("valid phone pattern")
});
static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));
static WEBSITE_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:www\.)?[\w-]+\.[\w.-]+/?\S*$").expect("valid url pattern")
});

/// Stable machine codes for UI mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    RequiredTitle,
    RequiredDescription,
    RequiredCategory,
    RequiredProvider,
    InvalidCategory,
    InvalidPrice,
    NegativePrice,
    HighPrice,
    InvalidPriceType,
    InvalidPhoneFormat,
    InvalidEmail,
    InvalidWebsite,
    UnknownNeighborhood,
    InvalidAgeMin,
    InvalidAgeMax,
    InvalidAgeRange,
    InvalidGender,
    InvalidInstructorGender,
    InvalidMaxParticipants,
    InvalidDuration,
    MissingHebrewTitle,
    MissingEnglishTitle,
    MissingHebrewDescription,
    MissingEnglishDescription,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub code: ValidationCode,
}

impl ValidationIssue {
    fn new(field: &str, message: impl Into<String>, code: ValidationCode) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn present_number(field: &Option<NumberOrText>) -> Option<&NumberOrText> {
    field.as_ref().filter(|v| v.is_present())
}

fn codes_list<T: Copy>(all: &[T], name: fn(T) -> &'static str) -> String {
    all.iter().map(|v| name(*v)).collect::<Vec<_>>().join(", ")
}

pub fn validate_listing(input: &ListingInput) -> ValidationResult {
    validate_listing_with(input, builtin_catalog())
}

/// Validate against an explicit category catalog.
pub fn validate_listing_with(input: &ListingInput, catalog: &Catalog) -> ValidationResult {
    use ValidationCode::*;

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let title = present(&input.title);
    let title_he = present(&input.title_he);
    let description = present(&input.description);
    let description_he = present(&input.description_he);

    // Required
    if title.is_none() && title_he.is_none() {
        errors.push(ValidationIssue::new(
            "title",
            "Title is required (English or Hebrew)",
            RequiredTitle,
        ));
    }
    if description.is_none() && description_he.is_none() {
        errors.push(ValidationIssue::new(
            "description",
            "Description is required (English or Hebrew)",
            RequiredDescription,
        ));
    }
    if present(&input.category_id).is_none() && present(&input.category_name).is_none() {
        errors.push(ValidationIssue::new("category", "Category is required", RequiredCategory));
    }
    if present(&input.provider_id).is_none() && present(&input.provider_name).is_none() {
        errors.push(ValidationIssue::new("provider", "Provider is required", RequiredProvider));
    }

    if let Some(id) = present(&input.category_id) {
        if !catalog.has_category(id) {
            errors.push(ValidationIssue::new(
                "categoryId",
                format!("Category with ID \"{id}\" not found"),
                InvalidCategory,
            ));
        }
    }

    // Price
    if let Some(raw) = present_number(&input.price) {
        match coerce_price(raw) {
            None => errors.push(ValidationIssue::new(
                "price",
                "Price must be a valid number",
                InvalidPrice,
            )),
            Some(p) if p < 0.0 => errors.push(ValidationIssue::new(
                "price",
                "Price cannot be negative",
                NegativePrice,
            )),
            Some(p) if p > HIGH_PRICE_THRESHOLD => warnings.push(ValidationIssue::new(
                "price",
                "Price seems unusually high. Please verify.",
                HighPrice,
            )),
            Some(_) => {}
        }
    }

    if let Some(pt) = present(&input.price_type) {
        if PriceType::from_code(pt).is_none() {
            errors.push(ValidationIssue::new(
                "priceType",
                format!(
                    "Invalid price type. Must be one of: {}",
                    codes_list(&PriceType::ALL, PriceType::as_str)
                ),
                InvalidPriceType,
            ));
        }
    }

    // Contact
    if let Some(phone) = present(&input.phone) {
        let cleaned: String = phone
            .chars()
            .filter(|c| !(c.is_whitespace() || matches!(c, '-' | '(' | ')')))
            .collect();
        if !ISRAELI_PHONE.is_match(&cleaned) {
            warnings.push(ValidationIssue::new(
                "phone",
                "Phone number may not be in valid Israeli format",
                InvalidPhoneFormat,
            ));
        }
    }
    if let Some(email) = present(&input.email) {
        if !EMAIL_SHAPE.is_match(email) {
            errors.push(ValidationIssue::new("email", "Invalid email format", InvalidEmail));
        }
    }
    if let Some(site) = present(&input.website) {
        if !WEBSITE_SHAPE.is_match(site) {
            warnings.push(ValidationIssue::new(
                "website",
                "Website URL may not be valid",
                InvalidWebsite,
            ));
        }
    }

    if let Some(n) = present(&input.neighborhood) {
        if normalize_neighborhood(n).is_none() {
            warnings.push(ValidationIssue::new(
                "neighborhood",
                format!("Neighborhood \"{n}\" may not be recognized"),
                UnknownNeighborhood,
            ));
        }
    }

    // Ages
    let age_min = present_number(&input.age_min).map(coerce_int);
    let age_max = present_number(&input.age_max).map(coerce_int);
    if matches!(age_min, Some(None)) || matches!(age_min, Some(Some(a)) if a < 0) {
        errors.push(ValidationIssue::new(
            "ageMin",
            "Minimum age must be a valid positive number",
            InvalidAgeMin,
        ));
    }
    if matches!(age_max, Some(None)) || matches!(age_max, Some(Some(a)) if a < 0) {
        errors.push(ValidationIssue::new(
            "ageMax",
            "Maximum age must be a valid positive number",
            InvalidAgeMax,
        ));
    }
    if let (Some(Some(min)), Some(Some(max))) = (age_min, age_max) {
        if min > max {
            errors.push(ValidationIssue::new(
                "ageRange",
                "Minimum age cannot be greater than maximum age",
                InvalidAgeRange,
            ));
        }
    }

    // Genders
    let genders = codes_list(&Gender::ALL, Gender::as_str);
    if let Some(g) = present(&input.gender) {
        if Gender::from_code(g).is_none() {
            errors.push(ValidationIssue::new(
                "gender",
                format!("Invalid gender. Must be one of: {genders}"),
                InvalidGender,
            ));
        }
    }
    if let Some(g) = present(&input.instructor_gender) {
        if Gender::from_code(g).is_none() {
            errors.push(ValidationIssue::new(
                "instructorGender",
                format!("Invalid instructor gender. Must be one of: {genders}"),
                InvalidInstructorGender,
            ));
        }
    }

    if let Some(raw) = present_number(&input.max_participants) {
        if !coerce_int(raw).is_some_and(|v| v >= 1) {
            errors.push(ValidationIssue::new(
                "maxParticipants",
                "Max participants must be at least 1",
                InvalidMaxParticipants,
            ));
        }
    }
    if let Some(raw) = present_number(&input.duration) {
        if !coerce_int(raw).is_some_and(|v| v >= 1) {
            errors.push(ValidationIssue::new(
                "duration",
                "Duration must be at least 1 minute",
                InvalidDuration,
            ));
        }
    }

    // Bilingual completeness
    match (title, title_he) {
        (Some(_), None) => warnings.push(ValidationIssue::new(
            "titleHe",
            "Hebrew title is missing - recommended for better local visibility",
            MissingHebrewTitle,
        )),
        (None, Some(_)) => warnings.push(ValidationIssue::new(
            "title",
            "English title is missing - recommended for broader reach",
            MissingEnglishTitle,
        )),
        _ => {}
    }
    match (description, description_he) {
        (Some(_), None) => warnings.push(ValidationIssue::new(
            "descriptionHe",
            "Hebrew description is missing - recommended for better local visibility",
            MissingHebrewDescription,
        )),
        (None, Some(_)) => warnings.push(ValidationIssue::new(
            "description",
            "English description is missing - recommended for broader reach",
            MissingEnglishDescription,
        )),
        _ => {}
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidEntry {
    pub index: usize,
    pub input: ListingInput,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidEntry {
    pub index: usize,
    pub input: ListingInput,
    pub result: ValidationResult,
}

/// Partition of a batch into valid and invalid inputs (0-based indices).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchValidation {
    pub valid: Vec<ValidEntry>,
    pub invalid: Vec<InvalidEntry>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

pub fn validate_listing_batch(inputs: &[ListingInput]) -> BatchValidation {
    let mut out = BatchValidation::default();
    for (index, input) in inputs.iter().enumerate() {
        let result = validate_listing(input);
        out.total_errors += result.errors.len();
        out.total_warnings += result.warnings.len();
        if result.is_valid {
            out.valid.push(ValidEntry {
                index,
                input: input.clone(),
            });
        } else {
            out.invalid.push(InvalidEntry {
                index,
                input: input.clone(),
                result,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> ListingInput {
        ListingInput {
            title: Some("Kids Soccer".into()),
            title_he: Some("כדורגל לילדים".into()),
            description: Some("Weekly training".into()),
            description_he: Some("אימון שבועי".into()),
            category_id: Some("cat-kids-sports".into()),
            provider_name: Some("RBS Kids Sports".into()),
            ..Default::default()
        }
    }

    fn codes(issues: &[ValidationIssue]) -> Vec<ValidationCode> {
        issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn minimal_listing_is_clean() {
        let r = validate_listing(&minimal());
        assert!(r.is_valid);
        assert!(r.errors.is_empty());
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn empty_input_reports_all_required_fields() {
        let r = validate_listing(&ListingInput::default());
        assert_eq!(
            codes(&r.errors),
            vec![
                ValidationCode::RequiredTitle,
                ValidationCode::RequiredDescription,
                ValidationCode::RequiredCategory,
                ValidationCode::RequiredProvider
            ]
        );
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let mut input = minimal();
        input.title = Some("   ".into());
        input.title_he = None;
        let r = validate_listing(&input);
        assert_eq!(codes(&r.errors), vec![ValidationCode::RequiredTitle]);
    }

    #[test]
    fn price_rules() {
        let mut input = minimal();
        input.price = Some("abc".into());
        assert_eq!(codes(&validate_listing(&input).errors), vec![ValidationCode::InvalidPrice]);

        input.price = Some(NumberOrText::Number(-5.0));
        assert_eq!(codes(&validate_listing(&input).errors), vec![ValidationCode::NegativePrice]);

        input.price = Some("₪250,000".into());
        let r = validate_listing(&input);
        assert!(r.is_valid);
        assert_eq!(codes(&r.warnings), vec![ValidationCode::HighPrice]);
    }

    #[test]
    fn phone_and_website_only_warn_but_email_errors() {
        let mut input = minimal();
        input.phone = Some("+1 555 0100".into());
        input.website = Some("not a url".into());
        input.email = Some("nope".into());
        let r = validate_listing(&input);
        assert_eq!(codes(&r.errors), vec![ValidationCode::InvalidEmail]);
        assert_eq!(
            codes(&r.warnings),
            vec![ValidationCode::InvalidPhoneFormat, ValidationCode::InvalidWebsite]
        );
    }

    #[test]
    fn israeli_phone_formats_pass() {
        for phone in ["052-123-4567", "+972 52 123 4567", "02-999-1234", "(03) 123-4567"] {
            let mut input = minimal();
            input.phone = Some(phone.into());
            assert!(validate_listing(&input).warnings.is_empty(), "{phone}");
        }
    }

    #[test]
    fn age_rules() {
        let mut input = minimal();
        input.age_min = Some("12".into());
        input.age_max = Some(NumberOrText::Number(6.0));
        assert_eq!(codes(&validate_listing(&input).errors), vec![ValidationCode::InvalidAgeRange]);

        input.age_min = Some("-1".into());
        input.age_max = Some("x".into());
        assert_eq!(
            codes(&validate_listing(&input).errors),
            vec![ValidationCode::InvalidAgeMin, ValidationCode::InvalidAgeMax]
        );
    }

    #[test]
    fn neighborhood_aliases_are_recognized() {
        let mut input = minimal();
        input.neighborhood = Some("RBS A".into());
        assert!(validate_listing(&input).warnings.is_empty());
        input.neighborhood = Some("Tel Aviv".into());
        assert_eq!(
            codes(&validate_listing(&input).warnings),
            vec![ValidationCode::UnknownNeighborhood]
        );
    }

    #[test]
    fn enum_fields_and_counts() {
        let mut input = minimal();
        input.price_type = Some("weekly".into());
        input.gender = Some("boys".into());
        input.instructor_gender = Some("female".into());
        input.max_participants = Some("0".into());
        input.duration = Some("45".into());
        assert_eq!(
            codes(&validate_listing(&input).errors),
            vec![
                ValidationCode::InvalidPriceType,
                ValidationCode::InvalidGender,
                ValidationCode::InvalidMaxParticipants
            ]
        );
    }

    #[test]
    fn batch_partition() {
        let inputs = vec![minimal(), ListingInput::default(), minimal()];
        let b = validate_listing_batch(&inputs);
        assert_eq!(b.valid.iter().map(|v| v.index).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(b.invalid.len(), 1);
        assert_eq!(b.invalid[0].index, 1);
        assert_eq!(b.total_errors, 4);
    }
}
