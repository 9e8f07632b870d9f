// src/analyze/mod.rs
//! Chat text analysis: pattern tables, entity model and the extractor.

pub mod entities;
pub mod extract;
pub mod patterns;

pub use crate::analyze::entities::{
    ApprovalStatus, EntityCandidate, EntityData, EntityType, ExtractedEntity,
};
pub use crate::analyze::extract::EntityExtractor;
