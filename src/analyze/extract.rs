// src/analyze/extract.rs
//! Turns parsed chat messages into PENDING review-queue entities.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::analyze::entities::{
    confidence, ContactInfoData, EntityCandidate, EntityData, ExtractedEntity, MentionType,
    PricingData, ProviderMentionData, RecommendationData, RecommendationType, ServiceRequestData,
    DEFAULT_CURRENCY,
};
use crate::analyze::patterns::{
    detect_category, detect_recommendation, detect_service_request, detect_urgency,
    extract_age_range, extract_business_names, extract_emails, extract_phone_numbers,
    extract_prices, extract_websites, RecommendationTier,
};
use crate::chat::types::{ParseResult, ParsedMessage};
use crate::ingest::catalog::find_neighborhood_in_text;
use crate::sentiment::{Sentiment, SentimentAnalyzer};

/// Characters of message text kept as mention context / recommendation reason.
const CONTEXT_CHARS: usize = 200;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "chat_entities_extracted_total",
            "Entities extracted from chat messages."
        );
    });
}

/// Short, non-reversible tag for a piece of text, safe to log.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= CONTEXT_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(CONTEXT_CHARS).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityExtractor {
    known_providers: Vec<String>,
    sentiment: SentimentAnalyzer,
}

impl EntityExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor that also reports direct mentions of these provider names.
    pub fn with_known_providers(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            known_providers: names
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
            sentiment: SentimentAnalyzer::new(),
        }
    }

    pub fn known_providers(&self) -> &[String] {
        &self.known_providers
    }

    /// Pure classification of one message body. Output order is fixed:
    /// provider mentions, contact info, prices, service request,
    /// recommendation.
    pub fn extract_candidates(&self, text: &str) -> Vec<EntityCandidate> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        let lower = text.to_lowercase();
        let sentiment = self.sentiment.analyze(text);
        let context = excerpt(text);
        let mut out = Vec::new();

        // Provider mentions: configured names first, then name-shaped spans.
        let mut names: Vec<String> = Vec::new();
        for provider in &self.known_providers {
            if lower.contains(&provider.to_lowercase()) {
                names.push(provider.clone());
                out.push(
                    EntityCandidate::from_data(
                        EntityData::ProviderMention(ProviderMentionData {
                            business_name: provider.clone(),
                            context: context.clone(),
                            mention_type: MentionType::Direct,
                        }),
                        provider.clone(),
                        confidence::KNOWN_PROVIDER,
                    )
                    .with_sentiment(sentiment),
                );
            }
        }
        for (name, hebrew) in extract_business_names(text) {
            let already = names
                .iter()
                .any(|n| n.to_lowercase().contains(&name.to_lowercase()) || name.to_lowercase().contains(&n.to_lowercase()));
            if already {
                continue;
            }
            let score = if hebrew {
                confidence::HEBREW_BUSINESS
            } else {
                confidence::ENGLISH_NAME
            };
            names.push(name.clone());
            out.push(
                EntityCandidate::from_data(
                    EntityData::ProviderMention(ProviderMentionData {
                        business_name: name.clone(),
                        context: context.clone(),
                        mention_type: MentionType::Indirect,
                    }),
                    name,
                    score,
                )
                .with_sentiment(sentiment),
            );
        }
        let primary_name = names.first().cloned();

        // Contact info, one entity per item.
        for phone in extract_phone_numbers(text) {
            out.push(EntityCandidate::from_data(
                EntityData::ContactInfo(ContactInfoData {
                    phone: Some(phone.clone()),
                    associated_name: primary_name.clone(),
                    ..Default::default()
                }),
                phone,
                confidence::PHONE,
            ));
        }
        for email in extract_emails(text) {
            out.push(EntityCandidate::from_data(
                EntityData::ContactInfo(ContactInfoData {
                    email: Some(email.clone()),
                    associated_name: primary_name.clone(),
                    ..Default::default()
                }),
                email,
                confidence::EMAIL,
            ));
        }
        for site in extract_websites(text) {
            out.push(EntityCandidate::from_data(
                EntityData::ContactInfo(ContactInfoData {
                    website: Some(site.clone()),
                    associated_name: primary_name.clone(),
                    ..Default::default()
                }),
                site,
                confidence::WEBSITE,
            ));
        }

        let category = detect_category(text);

        for price in extract_prices(text) {
            let score = if price.price_type.is_some() {
                confidence::PRICE_PER_UNIT
            } else {
                confidence::PRICE_PLAIN
            };
            out.push(EntityCandidate::from_data(
                EntityData::Pricing(PricingData {
                    amount: Some(price.amount),
                    currency: DEFAULT_CURRENCY.to_string(),
                    service_description: category.map(str::to_string),
                    price_type: price.price_type,
                }),
                context.clone(),
                score,
            ));
        }

        if let Some(request) = detect_service_request(text) {
            out.push(EntityCandidate::from_data(
                EntityData::ServiceRequest(ServiceRequestData {
                    service_type: category.unwrap_or("general").to_string(),
                    description: request.description,
                    age_range: extract_age_range(text),
                    neighborhood: find_neighborhood_in_text(text).map(str::to_string),
                    urgency: detect_urgency(text),
                    is_lead: true,
                }),
                context.clone(),
                confidence::SERVICE_REQUEST,
            ));
        }

        if let Some(tier) = detect_recommendation(text) {
            let (kind, score, tone) = match tier {
                RecommendationTier::Strong => (
                    RecommendationType::Recommend,
                    confidence::STRONG_RECOMMENDATION,
                    Sentiment::Positive,
                ),
                RecommendationTier::Positive => (
                    RecommendationType::Recommend,
                    confidence::RECOMMENDATION,
                    Sentiment::Positive,
                ),
                RecommendationTier::Negative => (
                    RecommendationType::NotRecommend,
                    confidence::NEGATIVE_RECOMMENDATION,
                    Sentiment::Negative,
                ),
            };
            out.push(
                EntityCandidate::from_data(
                    EntityData::Recommendation(RecommendationData {
                        business_name: primary_name,
                        recommendation_type: kind,
                        reason: Some(context.clone()),
                    }),
                    context,
                    score,
                )
                .with_sentiment(tone),
            );
        }

        out
    }

    /// Entities for one message. System messages yield nothing.
    pub fn extract_entities(
        &self,
        message: &ParsedMessage,
        import_id: &str,
        message_id: &str,
    ) -> Vec<ExtractedEntity> {
        ensure_metrics_described();
        if message.is_system_message {
            return Vec::new();
        }

        let entities: Vec<ExtractedEntity> = self
            .extract_candidates(&message.content)
            .into_iter()
            .filter_map(|c| match ExtractedEntity::new(import_id, message_id, c) {
                Ok(e) => Some(e),
                Err(err) => {
                    tracing::warn!(target: "extract", error = %err, "dropping inconsistent candidate");
                    None
                }
            })
            .collect();

        if !entities.is_empty() {
            counter!("chat_entities_extracted_total").increment(entities.len() as u64);
            tracing::debug!(
                target: "extract",
                message = %anon_hash(&message.content),
                count = entities.len(),
                "entities extracted"
            );
        }
        entities
    }

    /// Entities for a whole export; message ids are `{import_id}-msg-{index}`.
    pub fn extract_from_export(&self, result: &ParseResult, import_id: &str) -> Vec<ExtractedEntity> {
        let entities: Vec<ExtractedEntity> = result
            .messages
            .iter()
            .enumerate()
            .flat_map(|(i, m)| self.extract_entities(m, import_id, &format!("{import_id}-msg-{i}")))
            .collect();
        tracing::info!(
            target: "extract",
            import = import_id,
            messages = result.messages.len(),
            entities = entities.len(),
            "export analyzed"
        );
        entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::entities::{ApprovalStatus, EntityType};
    use crate::analyze::patterns::Urgency;
    use crate::ingest::types::PriceType;

    fn types(c: &[EntityCandidate]) -> Vec<EntityType> {
        c.iter().map(|c| c.entity_type).collect()
    }

    #[test]
    fn hebrew_recommendation() {
        let ex = EntityExtractor::new();
        let c = ex.extract_candidates("ממליצה בחום! הבן שלי עשה אצלם קורס");
        let rec = c
            .iter()
            .find_map(|c| match &c.extracted_data {
                EntityData::Recommendation(r) => Some((r, c)),
                _ => None,
            })
            .expect("recommendation");
        assert_eq!(rec.0.recommendation_type, RecommendationType::Recommend);
        assert_eq!(rec.1.sentiment, Some(Sentiment::Positive));
        assert_eq!(rec.1.confidence, confidence::STRONG_RECOMMENDATION);
    }

    #[test]
    fn negated_recommendation_is_not_recommend() {
        let c = EntityExtractor::new().extract_candidates("לא ממליץ על המקום הזה");
        let rec = c.iter().find(|c| c.entity_type == EntityType::Recommendation).unwrap();
        match &rec.extracted_data {
            EntityData::Recommendation(r) => {
                assert_eq!(r.recommendation_type, RecommendationType::NotRecommend)
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(rec.sentiment, Some(Sentiment::Negative));
    }

    #[test]
    fn contact_and_price_entities() {
        let c = EntityExtractor::new()
            .extract_candidates("שיעורי פסנתר 200 ש\"ח לחודש, טלפון 052-123-4567");
        let t = types(&c);
        assert!(t.contains(&EntityType::ContactInfo));
        assert!(t.contains(&EntityType::Pricing));
        let price = c
            .iter()
            .find_map(|c| match &c.extracted_data {
                EntityData::Pricing(p) => Some(p),
                _ => None,
            })
            .unwrap();
        assert_eq!(price.amount, Some(200.0));
        assert_eq!(price.price_type, Some(PriceType::Monthly));
        assert_eq!(price.currency, "ILS");
    }

    #[test]
    fn service_request_is_a_lead() {
        let c = EntityExtractor::new()
            .extract_candidates("מחפשת חוג כדורגל לבן שלי גיל 7-9 ברמת בית שמש א, דחוף");
        let req = c
            .iter()
            .find_map(|c| match &c.extracted_data {
                EntityData::ServiceRequest(r) => Some(r),
                _ => None,
            })
            .expect("service request");
        assert!(req.is_lead);
        assert_eq!(req.service_type, "sports");
        assert_eq!(req.age_range.as_deref(), Some("7-9"));
        assert_eq!(req.neighborhood.as_deref(), Some("רמת בית שמש א"));
        assert_eq!(req.urgency, Urgency::High);
    }

    #[test]
    fn known_provider_is_a_direct_mention() {
        let ex = EntityExtractor::with_known_providers(vec!["Dance Studio RBS".to_string()]);
        let c = ex.extract_candidates("We loved dance studio rbs this year");
        let m = &c[0];
        assert_eq!(m.confidence, confidence::KNOWN_PROVIDER);
        match &m.extracted_data {
            EntityData::ProviderMention(p) => assert_eq!(p.mention_type, MentionType::Direct),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn system_messages_yield_nothing_and_ids_follow_index() {
        let ex = EntityExtractor::new();
        let msg = |content: &str, system: bool| ParsedMessage {
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            sender_name: "Dana".into(),
            sender_phone: None,
            content: content.into(),
            is_system_message: system,
        };
        assert!(ex
            .extract_entities(&msg("052-123-4567", true), "imp", "m")
            .is_empty());

        let result = ParseResult {
            success: true,
            messages: vec![msg("hi", false), msg("call 052-123-4567", false)],
            group_name: None,
            date_range: crate::chat::types::DateRange {
                start: msg("", false).timestamp,
                end: msg("", false).timestamp,
            },
            errors: vec![],
        };
        let entities = ex.extract_from_export(&result, "imp1");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].message_id, "imp1-msg-1");
        assert_eq!(entities[0].approval_status(), ApprovalStatus::Pending);
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        assert_eq!(anon_hash("abc").len(), 12);
        assert_eq!(anon_hash("abc"), anon_hash("abc"));
        assert_ne!(anon_hash("abc"), anon_hash("abd"));
    }
}
