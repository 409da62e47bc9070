//! API client for communicating with the hostelpass backend REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests against the authoritative leave-record store.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{Actor, Role, SessionData};
use crate::config::Config;
use crate::models::{Decision, LeaveRequest, NewLeaveRequest};
use crate::store::LeaveStore;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL for the backend API, overridable through `Config`.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    name: String,
    role: Role,
}

/// API client for the hostelpass backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against the given base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: None,
        })
    }

    /// Create a client from configuration, falling back to the default URL
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config
            .api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Self::new(base_url)
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    /// Authenticate with the backend and return session data.
    /// Credential issuance lives entirely server-side; the core only keeps
    /// the opaque token and the actor it names.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<SessionData> {
        let url = format!("{}/auth/login", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .context("Failed to send authentication request")?;

        let response = Self::check_response(response).await?;

        let auth: AuthResponse = response
            .json()
            .await
            .context("Failed to parse auth response")?;

        debug!(role = %auth.user.role, "Authenticated");

        Ok(SessionData {
            token: auth.token,
            actor: Actor {
                id: auth.user.id,
                name: auth.user.name,
                role: auth.user.role,
            },
            created_at: Utc::now(),
        })
    }

    fn apply_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            // Rate limited - signal to retry
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a request, retrying on 429 with exponential backoff.
    /// `build` creates a fresh request for each attempt.
    async fn execute(
        &self,
        url: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<reqwest::Response> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .apply_auth(build())
                .send()
                .await
                .with_context(|| format!("Failed to send request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.execute(url, || self.client.get(url)).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T> {
        let response = self.execute(url, || self.client.post(url).json(body)).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T> {
        let response = self.execute(url, || self.client.put(url).json(body)).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }
}

/// Parse a leave list that may arrive bare or wrapped.
/// Express-style backends commonly wrap collections as `{ data: [...] }`.
fn parse_leave_list(text: &str) -> Result<Vec<LeaveRequest>> {
    if let Ok(leaves) = serde_json::from_str::<Vec<LeaveRequest>>(text) {
        return Ok(leaves);
    }

    #[derive(Deserialize)]
    struct LeavesWrapper {
        #[serde(default)]
        data: Vec<LeaveRequest>,
        #[serde(default)]
        leaves: Vec<LeaveRequest>,
    }

    if let Ok(wrapper) = serde_json::from_str::<LeavesWrapper>(text) {
        if !wrapper.data.is_empty() {
            return Ok(wrapper.data);
        }
        if !wrapper.leaves.is_empty() {
            return Ok(wrapper.leaves);
        }
    }

    // Back off to a char boundary so multi-byte bodies cannot panic
    let mut cut = text.len().min(200);
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    Err(anyhow::anyhow!(
        "Failed to parse leave list. Response starts with: {}",
        &text[..cut]
    ))
}

#[async_trait]
impl LeaveStore for ApiClient {
    /// POST /leave - the server assigns the id and stamps the timestamps.
    async fn create(&self, _actor: &Actor, data: &NewLeaveRequest) -> Result<LeaveRequest> {
        let url = format!("{}/leave", self.base_url);
        self.post(&url, data).await
    }

    /// GET /leave - records visible to the current actor.
    /// The server is responsible for any role-based filtering.
    async fn fetch_all(&self) -> Result<Vec<LeaveRequest>> {
        let url = format!("{}/leave", self.base_url);
        let response = self.execute(&url, || self.client.get(&url)).await?;
        let text = response.text().await.context("Failed to read leave list body")?;
        debug!("Leave list response received");
        parse_leave_list(&text)
    }

    /// PUT /leave/{id} - the server derives the actor from the token and
    /// returns the authoritative updated record.
    async fn update(&self, _actor: &Actor, id: &str, decision: Decision) -> Result<LeaveRequest> {
        let url = format!("{}/leave/{}", self.base_url, id);
        self.put(&url, &serde_json::json!({ "status": decision })).await
    }
}
