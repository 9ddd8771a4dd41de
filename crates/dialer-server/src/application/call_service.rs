//! Call Application Service (Use Case)
//!
//! Orchestrates domain operations for the public call API.

use std::sync::Arc;
use uuid::Uuid;

use dialer::{
    validate_destination, validate_metadata, validate_script_id, Call, CallPatch, CallRepository,
    CallStatus, DomainError, Page, PageRequest, StatusCounts,
};

/// Application service for Call operations
pub struct CallService<R: CallRepository + ?Sized> {
    repo: Arc<R>,
}

impl<R: CallRepository + ?Sized> CallService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Queue a new call
    pub async fn create(
        &self,
        destination: String,
        script_id: String,
        metadata: Option<serde_json::Value>,
    ) -> Result<Call, DomainError> {
        validate_destination(&destination)?;
        validate_script_id(&script_id)?;
        if let Some(metadata) = &metadata {
            validate_metadata(metadata)?;
        }

        if let Some(active) = self.repo.find_active_by_destination(&destination).await? {
            return Err(DomainError::Conflict(format!(
                "destination {} already has an active call {} ({})",
                destination, active.id, active.status
            )));
        }

        // The store's uniqueness constraint still decides concurrent creates
        let call = self
            .repo
            .insert(&Call::new(destination, script_id, metadata))
            .await?;

        tracing::info!("Queued call: {} ({})", call.destination, call.id);

        Ok(call)
    }

    /// Get a Call by ID
    pub async fn get(&self, id: Uuid) -> Result<Call, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Call", id))
    }

    /// Edit the payload of a call that has not been dialed yet
    pub async fn update(
        &self,
        id: Uuid,
        script_id: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<Call, DomainError> {
        if let Some(script_id) = &script_id {
            validate_script_id(script_id)?;
        }
        if let Some(metadata) = &metadata {
            validate_metadata(metadata)?;
        }

        let patch = CallPatch::payload(script_id, metadata);
        if patch.is_empty() {
            return Err(DomainError::Validation(
                "nothing to update: provide scriptId and/or metadata".to_string(),
            ));
        }

        if let Some(updated) = self
            .repo
            .update_if_status(id, CallStatus::Pending, &patch)
            .await?
        {
            tracing::info!("Updated call: {}", id);
            return Ok(updated);
        }

        match self.repo.find_by_id(id).await? {
            None => Err(DomainError::not_found("Call", id)),
            Some(current) => Err(DomainError::invalid_state("Call", id, current.status)),
        }
    }

    /// Page through calls, newest first
    pub async fn list(
        &self,
        status: Option<CallStatus>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Page<Call>, DomainError> {
        let request = PageRequest::new(page, limit)?;
        let (items, total) = self
            .repo
            .list(status, request.offset(), request.limit)
            .await?;
        Ok(Page::new(items, total, request))
    }

    /// Call counts per status
    pub async fn metrics(&self) -> Result<StatusCounts, DomainError> {
        self.repo.count_by_status().await
    }
}
