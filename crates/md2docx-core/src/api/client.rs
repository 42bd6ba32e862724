//! API client for the conversion backend.
//!
//! This module provides the `ApiClient` struct for starting the login flow
//! and for the bearer-authenticated document calls: listing, converting and
//! downloading the converted archive.

use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{ConversionResult, GoogleDoc};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Conversions run server-side against Google Drive and can be slow.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const LOGIN_PATH: &str = "/auth/google";
const DOCS_PATH: &str = "/api/docs";
const CONVERT_PATH: &str = "/api/convert";
const DOWNLOAD_PATH: &str = "/api/download-zip";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "authUrl")]
    auth_url: String,
}

/// API client for the conversion backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ask the backend for the provider's authorization URL
    pub async fn initiate_login(&self) -> Result<String, ApiError> {
        let response: LoginResponse = self.get(&self.url(LOGIN_PATH)).await?;
        if response.auth_url.is_empty() {
            return Err(ApiError::InvalidResponse("empty authUrl".to_string()));
        }
        Ok(response.auth_url)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidResponse("token is not a valid header".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, backing off on 429 until it succeeds or retries run out.
    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn() -> Result<reqwest::RequestBuilder, ApiError>,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build()?.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self
            .send_with_retry(url, || Ok(self.client.get(url).headers(self.auth_headers()?)))
            .await?;
        Self::parse_json(response, url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T, ApiError> {
        let response = self
            .send_with_retry(url, || {
                Ok(self.client.post(url).headers(self.auth_headers()?).json(body))
            })
            .await?;
        Self::parse_json(response, url).await
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    // ===== Document Methods =====

    /// List the markdown documents in the user's Drive
    pub async fn list_documents(&self) -> Result<Vec<GoogleDoc>, ApiError> {
        let docs: Vec<GoogleDoc> = self.get(&self.url(DOCS_PATH)).await?;
        debug!(count = docs.len(), "Documents listed");
        Ok(docs)
    }

    /// Convert every listed document to .docx on the server
    pub async fn convert_documents(&self) -> Result<ConversionResult, ApiError> {
        let result: ConversionResult = self
            .post(&self.url(CONVERT_PATH), &serde_json::json!({}))
            .await?;
        debug!(
            total = result.total_files,
            converted = result.converted_count(),
            "Conversion finished"
        );
        Ok(result)
    }

    /// Download the ZIP of converted files
    pub async fn download_archive(&self) -> Result<Vec<u8>, ApiError> {
        let url = self.url(DOWNLOAD_PATH);
        let response = self
            .send_with_retry(&url, || Ok(self.client.get(&url).headers(self.auth_headers()?)))
            .await?;
        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), "Archive downloaded");
        Ok(bytes.to_vec())
    }
}

// ============================================================================
// Tests
// ============================================================================
