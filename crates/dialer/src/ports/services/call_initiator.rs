//! Call Initiator Port
//!
//! Abstract interface for the third-party service that places phone calls.
//! The provider answers asynchronously: acceptance only means the call was
//! queued on its side, the final outcome arrives later through the
//! completion callback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::services::DispatchFailure;

/// Outbound request body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitiateCallRequest {
    pub destination: String,
    pub script_id: String,
    /// Where the provider posts the completion signal
    pub completion_callback_url: String,
}

/// Provider acceptance (HTTP 202 body)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedCall {
    pub external_correlation_id: String,
    pub status: String,
}

/// Call initiation interface
///
/// # Example
///
/// ```rust,ignore
/// use dialer::ports::CallInitiator;
///
/// struct HttpCallInitiator { /* reqwest client */ }
///
/// #[async_trait]
/// impl CallInitiator for HttpCallInitiator {
///     async fn initiate(&self, request: &InitiateCallRequest)
///         -> Result<InitiatedCall, DispatchFailure>
///     {
///         // POST to the provider, classify the response
///     }
/// }
/// ```
#[async_trait]
pub trait CallInitiator: Send + Sync {
    /// Ask the provider to place a call
    ///
    /// Returns the provider's acceptance, or a classified failure.
    async fn initiate(&self, request: &InitiateCallRequest)
        -> Result<InitiatedCall, DispatchFailure>;
}
