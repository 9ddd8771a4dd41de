//! Call - Outbound Phone Call Record
//!
//! Pure domain entity without infrastructure dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::value_objects::CallStatus;

pub const MAX_SCRIPT_ID_LEN: usize = 128;

/// `last_error` of a call returned to PENDING after its dispatch was lost
pub const ABANDONED_DISPATCH: &str = "Dispatch abandoned before provider acceptance";

/// Call - A request to place one phone call through the provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Call {
    pub id: Uuid,
    /// E.164 phone number, immutable after creation
    pub destination: String,
    pub script_id: String,
    /// Opaque client data
    pub metadata: serde_json::Value,
    pub status: CallStatus,
    /// Failed dispatch attempts so far
    pub attempts: i32,
    pub last_error: Option<String>,
    /// Provider correlation id, set once the provider accepts the call
    pub external_call_id: Option<String>,
    /// Not claimable before this instant (retry backoff)
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub duration_sec: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Call {
    /// Create a new pending call with generated ID and timestamps
    pub fn new(destination: String, script_id: String, metadata: Option<serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            destination,
            script_id,
            metadata: metadata.unwrap_or(serde_json::json!({})),
            status: CallStatus::Pending,
            attempts: 0,
            last_error: None,
            external_call_id: None,
            next_attempt_at: None,
            duration_sec: None,
            created_at: now,
            started_at: None,
            ended_at: None,
            updated_at: now,
        }
    }

    /// Whether a dispatcher may claim this call at `now`
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == CallStatus::Pending && self.next_attempt_at.map_or(true, |at| at <= now)
    }
}

/// Partial update of a call record
///
/// `None` leaves a column untouched. Columns that can be cleared use a
/// nested `Option` (`Some(None)` writes NULL).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallPatch {
    pub status: Option<CallStatus>,
    pub script_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub attempts: Option<i32>,
    pub last_error: Option<String>,
    pub external_call_id: Option<String>,
    pub next_attempt_at: Option<Option<DateTime<Utc>>>,
    pub duration_sec: Option<i32>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl CallPatch {
    /// Call accepted by the provider
    pub fn accepted(external_call_id: String) -> Self {
        Self {
            external_call_id: Some(external_call_id),
            ..Default::default()
        }
    }

    /// Back to the queue, eligible again at `next_attempt_at`
    pub fn reschedule(attempts: i32, error: String, next_attempt_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(CallStatus::Pending),
            attempts: Some(attempts),
            last_error: Some(error),
            started_at: Some(None),
            next_attempt_at: Some(Some(next_attempt_at)),
            ..Default::default()
        }
    }

    /// Terminal dispatch failure
    pub fn failed(attempts: i32, error: String, ended_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(CallStatus::Failed),
            attempts: Some(attempts),
            last_error: Some(error),
            ended_at: Some(ended_at),
            ..Default::default()
        }
    }

    /// Terminal transition reported by the provider
    pub fn finished(
        status: CallStatus,
        error: Option<String>,
        ended_at: DateTime<Utc>,
        duration_sec: Option<i32>,
    ) -> Self {
        Self {
            status: Some(status),
            last_error: error,
            ended_at: Some(ended_at),
            duration_sec,
            ..Default::default()
        }
    }

    /// Client-editable fields
    pub fn payload(script_id: Option<String>, metadata: Option<serde_json::Value>) -> Self {
        Self {
            script_id,
            metadata,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to an in-memory record
    pub fn apply_to(&self, call: &mut Call, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            call.status = status;
        }
        if let Some(script_id) = &self.script_id {
            call.script_id = script_id.clone();
        }
        if let Some(metadata) = &self.metadata {
            call.metadata = metadata.clone();
        }
        if let Some(attempts) = self.attempts {
            call.attempts = attempts;
        }
        if let Some(error) = &self.last_error {
            call.last_error = Some(error.clone());
        }
        if let Some(external_call_id) = &self.external_call_id {
            call.external_call_id = Some(external_call_id.clone());
        }
        if let Some(next_attempt_at) = self.next_attempt_at {
            call.next_attempt_at = next_attempt_at;
        }
        if let Some(duration_sec) = self.duration_sec {
            call.duration_sec = Some(duration_sec);
        }
        if let Some(started_at) = self.started_at {
            call.started_at = started_at;
        }
        if let Some(ended_at) = self.ended_at {
            call.ended_at = Some(ended_at);
        }
        call.updated_at = now;
    }
}

/// Validate an E.164 phone number (`+` then 2-15 digits, no leading zero)
pub fn validate_destination(destination: &str) -> Result<(), DomainError> {
    let digits = destination.strip_prefix('+').ok_or_else(|| {
        DomainError::Validation(format!(
            "destination must be in E.164 format (e.g. +14155550123), got '{destination}'"
        ))
    })?;

    let valid = (2..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0');

    if valid {
        Ok(())
    } else {
        Err(DomainError::Validation(format!(
            "destination must be in E.164 format (e.g. +14155550123), got '{destination}'"
        )))
    }
}

pub fn validate_script_id(script_id: &str) -> Result<(), DomainError> {
    if script_id.trim().is_empty() {
        return Err(DomainError::Validation("scriptId must not be empty".into()));
    }
    if script_id.len() > MAX_SCRIPT_ID_LEN {
        return Err(DomainError::Validation(format!(
            "scriptId must be at most {MAX_SCRIPT_ID_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_metadata(metadata: &serde_json::Value) -> Result<(), DomainError> {
    if metadata.is_object() {
        Ok(())
    } else {
        Err(DomainError::Validation(
            "metadata must be a JSON object".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_call_is_pending_and_claimable() {
        let call = Call::new("+14155550123".into(), "welcome".into(), None);
        assert_eq!(call.status, CallStatus::Pending);
        assert_eq!(call.attempts, 0);
        assert_eq!(call.metadata, serde_json::json!({}));
        assert!(call.is_claimable(Utc::now()));
    }

    #[test]
    fn test_backoff_blocks_claim_until_eligible() {
        let now = Utc::now();
        let mut call = Call::new("+14155550123".into(), "welcome".into(), None);
        call.next_attempt_at = Some(now + Duration::seconds(4));

        assert!(!call.is_claimable(now));
        assert!(!call.is_claimable(now + Duration::seconds(3)));
        assert!(call.is_claimable(now + Duration::seconds(4)));
    }

    #[test]
    fn test_reschedule_patch_clears_started_at() {
        let now = Utc::now();
        let mut call = Call::new("+14155550123".into(), "welcome".into(), None);
        call.status = CallStatus::InProgress;
        call.started_at = Some(now);

        CallPatch::reschedule(1, "timeout".into(), now + Duration::seconds(2))
            .apply_to(&mut call, now);

        assert_eq!(call.status, CallStatus::Pending);
        assert_eq!(call.started_at, None);
        assert_eq!(call.attempts, 1);
        assert_eq!(call.last_error.as_deref(), Some("timeout"));
        assert_eq!(call.next_attempt_at, Some(now + Duration::seconds(2)));
    }

    #[test]
    fn test_empty_patch() {
        assert!(CallPatch::default().is_empty());
        assert!(CallPatch::payload(None, None).is_empty());
        assert!(!CallPatch::payload(Some("x".into()), None).is_empty());
    }

    #[test]
    fn test_validate_destination() {
        assert!(validate_destination("+14155550123").is_ok());
        assert!(validate_destination("+447911123456").is_ok());

        for bad in ["14155550123", "+0123456", "+1", "+1415555012345678", "+1-415-555", ""] {
            assert!(validate_destination(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_validate_script_id_and_metadata() {
        assert!(validate_script_id("onboarding-v2").is_ok());
        assert!(validate_script_id("  ").is_err());
        assert!(validate_script_id(&"x".repeat(MAX_SCRIPT_ID_LEN + 1)).is_err());

        assert!(validate_metadata(&serde_json::json!({"customer": 42})).is_ok());
        assert!(validate_metadata(&serde_json::json!([1, 2])).is_err());
    }
}
