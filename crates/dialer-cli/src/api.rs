//! Dialer API Client

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// API Client for Dialer
pub struct DialerClient {
    client: Client,
    base_url: String,
    api_key: String,
}

// ============================================
// API Response Types
// ============================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResponse {
    pub id: Uuid,
    pub destination: String,
    pub script_id: String,
    pub metadata: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub external_correlation_id: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub duration_sec: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallListResponse {
    pub items: Vec<CallResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub failed: i64,
    pub expired: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallRequest {
    pub destination: String,
    pub script_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl DialerClient {
    /// Create a new API client
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send an authenticated request and decode the JSON response
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to connect to Dialer API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("API error ({}): {}", status, body);
        }

        resp.json().await.context("Failed to parse response")
    }

    /// Test connection with health check
    pub async fn health(&self) -> Result<bool> {
        let resp = self.client.get(self.url("/health")).send().await?;
        Ok(resp.status().is_success())
    }

    /// Check that the API key is accepted
    pub async fn verify_key(&self) -> Result<()> {
        self.metrics().await.map(|_| ())
    }

    /// Queue a call
    pub async fn create_call(&self, request: &CreateCallRequest) -> Result<CallResponse> {
        self.send(self.client.post(self.url("/calls")).json(request))
            .await
    }

    /// Get a call
    pub async fn get_call(&self, id: &str) -> Result<CallResponse> {
        self.send(self.client.get(self.url(&format!("/calls/{id}"))))
            .await
    }

    /// List calls
    pub async fn list_calls(
        &self,
        status: Option<&str>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<CallListResponse> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        self.send(self.client.get(self.url("/calls")).query(&query))
            .await
    }

    /// Edit a pending call
    pub async fn update_call(&self, id: &str, request: &UpdateCallRequest) -> Result<CallResponse> {
        self.send(
            self.client
                .patch(self.url(&format!("/calls/{id}")))
                .json(request),
        )
        .await
    }

    /// Counts per status
    pub async fn metrics(&self) -> Result<MetricsResponse> {
        self.send(self.client.get(self.url("/metrics"))).await
    }
}
