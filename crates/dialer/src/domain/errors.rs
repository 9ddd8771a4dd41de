//! Domain Errors
//!
//! Error types for domain operations.

use thiserror::Error;
use uuid::Uuid;

use super::value_objects::CallStatus;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {entity_type} {id} is {status}")]
    InvalidState {
        entity_type: String,
        id: String,
        status: CallStatus,
    },

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl DomainError {
    pub fn not_found<T: AsRef<str>>(entity_type: T, id: Uuid) -> Self {
        Self::NotFound {
            entity_type: entity_type.as_ref().to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_state<T: AsRef<str>>(entity_type: T, id: Uuid, status: CallStatus) -> Self {
        Self::InvalidState {
            entity_type: entity_type.as_ref().to_string(),
            id: id.to_string(),
            status,
        }
    }
}
