//! HTTP utilities for REST API calls

use crate::error::BackendError;
use reqwest::Client;
use serde_json::Value;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and drops control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for resource API calls
#[derive(Clone)]
pub struct RestHttpClient {
    client: Client,
    token: Option<String>,
}

impl RestHttpClient {
    /// Create a new HTTP client, authenticating with `token` when given
    pub fn new(token: Option<String>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(concat!("cloudres/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, token })
    }

    /// Make a GET request, returning the parsed JSON body
    ///
    /// Non-success statuses become a [`BackendError`] whose kind names the
    /// status class (`HTTPNotFound` for 404).
    pub async fn get(&self, url: &Url) -> Result<Value, BackendError> {
        tracing::debug!("GET {}", url);

        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::connection(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::connection(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            // Only the sanitized body is logged, never returned to the user
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(BackendError::from_status(
                status.as_u16(),
                format!("API request failed: {}", status),
            ));
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| {
            BackendError::new("InvalidResponse", format!("Failed to parse response JSON: {}", e))
        })
    }
}
