//! OpenAPI Documentation
//!
//! Centralized API documentation using utoipa.

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::models::{
    // Call models
    CallListResponse,
    CallResponse,
    // Callback models
    CompletionAck,
    CompletionSignalRequest,
    CreateCallRequest,
    // Metrics models
    MetricsResponse,
    UpdateCallRequest,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Call endpoints
        super::call::create_call,
        super::call::list_calls,
        super::call::get_call,
        super::call::update_call,
        // Metrics endpoints
        super::metrics::get_metrics,
        // Callback endpoints
        super::completion::receive_completion,
    ),
    info(
        title = "Dialer API",
        version = "0.1.0",
        description = "Outbound call dispatch engine\n\nQueues call requests, dials them through the call provider under a global concurrency cap, and records provider outcomes.",
        license(name = "MIT"),
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Call", description = "Call - Queue, inspect and edit outbound calls"),
        (name = "Metrics", description = "Metrics - Call counts per status"),
        (name = "Callback", description = "Callback - Completion signals from the call provider"),
    ),
    components(
        schemas(
            // Call
            CreateCallRequest,
            UpdateCallRequest,
            CallResponse,
            CallListResponse,
            // Metrics
            MetricsResponse,
            // Callback
            CompletionSignalRequest,
            CompletionAck,
        )
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}
