// src/error.rs
//! Typed errors for the few operations that can genuinely fail.
//!
//! Content problems (bad dates, invalid fields, broken CSV rows) are never
//! errors here: they are reported inside the result structs of each stage.

use thiserror::Error;

use crate::analyze::entities::{ApprovalStatus, EntityType};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntityError {
    #[error("entity data of type {found:?} cannot be stored on a {expected:?} entity")]
    TypeMismatch {
        expected: EntityType,
        found: EntityType,
    },

    #[error("entity already reviewed ({0:?}); only PENDING entities can transition")]
    InvalidTransition(ApprovalStatus),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Sync source not found: {0}")]
    NotFound(String),

    #[error("Sync source is inactive: {0}")]
    Inactive(String),

    #[error("Fetch timed out after {0}s")]
    Timeout(u64),

    #[error("Fetch failed: {0:#}")]
    Fetch(#[from] anyhow::Error),

    #[error("Storing listings failed: {0}")]
    Store(String),
}
