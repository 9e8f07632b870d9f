// src/analyze/entities.rs
//! Review-queue entities pulled out of chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analyze::patterns::Urgency;
use crate::error::EntityError;
use crate::ingest::types::PriceType;
use crate::sentiment::Sentiment;

/// Per-rule confidence. These are calibration constants, not scores: the
/// same rule on the same text always yields the same value.
pub mod confidence {
    pub const KNOWN_PROVIDER: f64 = 0.92;
    pub const HEBREW_BUSINESS: f64 = 0.70;
    pub const ENGLISH_NAME: f64 = 0.60;
    pub const PHONE: f64 = 0.95;
    pub const EMAIL: f64 = 0.99;
    pub const WEBSITE: f64 = 0.90;
    pub const PRICE_PER_UNIT: f64 = 0.85;
    pub const PRICE_PLAIN: f64 = 0.75;
    pub const SERVICE_REQUEST: f64 = 0.80;
    pub const STRONG_RECOMMENDATION: f64 = 0.90;
    pub const RECOMMENDATION: f64 = 0.75;
    pub const NEGATIVE_RECOMMENDATION: f64 = 0.80;
}

pub const DEFAULT_CURRENCY: &str = "ILS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    ProviderMention,
    ContactInfo,
    Pricing,
    ServiceRequest,
    Recommendation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MentionType {
    Direct,
    Indirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    Recommend,
    NotRecommend,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMentionData {
    pub business_name: String,
    pub context: String,
    pub mention_type: MentionType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfoData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub associated_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_type: Option<PriceType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequestData {
    pub service_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    pub urgency: Urgency,
    pub is_lead: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    pub recommendation_type: RecommendationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Payload keyed by a `type` discriminator equal to the owning entity's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityData {
    ProviderMention(ProviderMentionData),
    ContactInfo(ContactInfoData),
    Pricing(PricingData),
    ServiceRequest(ServiceRequestData),
    Recommendation(RecommendationData),
}

impl EntityData {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityData::ProviderMention(_) => EntityType::ProviderMention,
            EntityData::ContactInfo(_) => EntityType::ContactInfo,
            EntityData::Pricing(_) => EntityType::Pricing,
            EntityData::ServiceRequest(_) => EntityType::ServiceRequest,
            EntityData::Recommendation(_) => EntityType::Recommendation,
        }
    }
}

/// One extraction before it is bound to an import and message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCandidate {
    pub entity_type: EntityType,
    pub raw_text: String,
    pub extracted_data: EntityData,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

impl EntityCandidate {
    /// Candidate whose type is taken from the payload.
    pub fn from_data(data: EntityData, raw_text: impl Into<String>, confidence: f64) -> Self {
        Self {
            entity_type: data.entity_type(),
            raw_text: raw_text.into(),
            extracted_data: data,
            confidence,
            sentiment: None,
        }
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawEntity")]
pub struct ExtractedEntity {
    pub id: String,
    pub import_id: String,
    pub message_id: String,
    entity_type: EntityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider_id: Option<String>,
    pub raw_text: String,
    extracted_data: EntityData,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    approval_status: ApprovalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reviewed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntity {
    id: String,
    import_id: String,
    message_id: String,
    entity_type: EntityType,
    #[serde(default)]
    provider_id: Option<String>,
    raw_text: String,
    extracted_data: EntityData,
    confidence: f64,
    #[serde(default)]
    sentiment: Option<Sentiment>,
    #[serde(default)]
    approval_status: ApprovalStatus,
    #[serde(default)]
    reviewed_by: Option<String>,
    #[serde(default)]
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn check_type(expected: EntityType, data: &EntityData) -> Result<(), EntityError> {
    let found = data.entity_type();
    if found == expected {
        Ok(())
    } else {
        Err(EntityError::TypeMismatch { expected, found })
    }
}

impl TryFrom<RawEntity> for ExtractedEntity {
    type Error = EntityError;

    fn try_from(raw: RawEntity) -> Result<Self, Self::Error> {
        check_type(raw.entity_type, &raw.extracted_data)?;
        Ok(Self {
            id: raw.id,
            import_id: raw.import_id,
            message_id: raw.message_id,
            entity_type: raw.entity_type,
            provider_id: raw.provider_id,
            raw_text: raw.raw_text,
            extracted_data: raw.extracted_data,
            confidence: raw.confidence,
            sentiment: raw.sentiment,
            approval_status: raw.approval_status,
            reviewed_by: raw.reviewed_by,
            reviewed_at: raw.reviewed_at,
            created_at: raw.created_at,
        })
    }
}

impl ExtractedEntity {
    /// New PENDING entity. Fails when the payload discriminator does not
    /// match the candidate's declared type.
    pub fn new(
        import_id: impl Into<String>,
        message_id: impl Into<String>,
        candidate: EntityCandidate,
    ) -> Result<Self, EntityError> {
        check_type(candidate.entity_type, &candidate.extracted_data)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            import_id: import_id.into(),
            message_id: message_id.into(),
            entity_type: candidate.entity_type,
            provider_id: None,
            raw_text: candidate.raw_text,
            extracted_data: candidate.extracted_data,
            confidence: candidate.confidence.clamp(0.0, 1.0),
            sentiment: candidate.sentiment,
            approval_status: ApprovalStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        })
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn data(&self) -> &EntityData {
        &self.extracted_data
    }

    pub fn approval_status(&self) -> ApprovalStatus {
        self.approval_status
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.provider_id.as_deref()
    }

    pub fn reviewed_by(&self) -> Option<&str> {
        self.reviewed_by.as_deref()
    }

    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.reviewed_at
    }

    fn review(&mut self, reviewer: &str, to: ApprovalStatus) -> Result<(), EntityError> {
        if self.approval_status != ApprovalStatus::Pending {
            return Err(EntityError::InvalidTransition(self.approval_status));
        }
        self.approval_status = to;
        self.reviewed_by = Some(reviewer.to_string());
        self.reviewed_at = Some(Utc::now());
        Ok(())
    }

    /// Approve, optionally linking the entity to a provider record.
    pub fn approve(&mut self, reviewer: &str, provider_id: Option<String>) -> Result<(), EntityError> {
        self.review(reviewer, ApprovalStatus::Approved)?;
        if provider_id.is_some() {
            self.provider_id = provider_id;
        }
        Ok(())
    }

    pub fn reject(&mut self, reviewer: &str) -> Result<(), EntityError> {
        self.review(reviewer, ApprovalStatus::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing() -> EntityData {
        EntityData::Pricing(PricingData {
            amount: Some(200.0),
            currency: DEFAULT_CURRENCY.into(),
            service_description: None,
            price_type: Some(PriceType::Monthly),
        })
    }

    #[test]
    fn mismatched_discriminator_is_rejected() {
        let mut c = EntityCandidate::from_data(pricing(), "200 ש\"ח לחודש", confidence::PRICE_PER_UNIT);
        c.entity_type = EntityType::ContactInfo;
        let err = ExtractedEntity::new("imp", "imp-msg-0", c).unwrap_err();
        assert_eq!(
            err,
            EntityError::TypeMismatch {
                expected: EntityType::ContactInfo,
                found: EntityType::Pricing
            }
        );
    }

    #[test]
    fn deserialize_checks_discriminator() {
        let c = EntityCandidate::from_data(pricing(), "x", 0.75);
        let e = ExtractedEntity::new("imp", "m", c).unwrap();
        let mut json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["extractedData"]["type"], "PRICING");
        assert_eq!(json["approvalStatus"], "PENDING");

        let back: ExtractedEntity = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, e);

        json["entityType"] = "RECOMMENDATION".into();
        assert!(serde_json::from_value::<ExtractedEntity>(json).is_err());
    }

    #[test]
    fn only_pending_entities_transition() {
        let c = EntityCandidate::from_data(pricing(), "x", 0.75);
        let mut e = ExtractedEntity::new("imp", "m", c).unwrap();
        e.approve("admin", Some("prov-7".into())).unwrap();
        assert_eq!(e.approval_status(), ApprovalStatus::Approved);
        assert_eq!(e.provider_id(), Some("prov-7"));
        assert_eq!(e.reviewed_by(), Some("admin"));
        assert!(e.reviewed_at().is_some());

        assert_eq!(
            e.reject("other"),
            Err(EntityError::InvalidTransition(ApprovalStatus::Approved))
        );
        assert_eq!(e.reviewed_by(), Some("admin"));
    }
}
