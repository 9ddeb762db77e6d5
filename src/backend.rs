//! Client for the remote verification service.
//!
//! Two single-shot calls: fetch a user's current level and submit a flag.
//! Retry policy, if any, belongs to the caller.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Errors from the verification service.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Service unreachable, or it answered with a non-2xx status.
    #[error("verification service unreachable: {message}")]
    Connectivity { message: String },

    /// 2xx response whose body could not be decoded.
    #[error("verification service returned an unexpected response: {message}")]
    UnexpectedPayload { message: String },
}

impl BackendError {
    /// Creates a `Connectivity` error.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
        }
    }

    /// Creates an `UnexpectedPayload` error.
    pub fn unexpected_payload(message: impl Into<String>) -> Self {
        Self::UnexpectedPayload {
            message: message.into(),
        }
    }
}

/// Outcome of a flag submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SubmissionResult {
    /// Whether the service accepted the flag.
    pub correct: bool,
    /// The level granted on success; absent when the flag was wrong.
    #[serde(rename = "newLevel")]
    pub new_level: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LevelResponse {
    level: u32,
}

/// Verification service operations.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch the user's current level.
    async fn get_level(&self, user_id: &str) -> Result<u32, BackendError>;

    /// Submit a flag for verification.
    async fn submit_flag(&self, flag: &str, user_id: &str) -> Result<SubmissionResult, BackendError>;
}

/// HTTP client for the verification service.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Creates a client against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn get_level(&self, user_id: &str) -> Result<u32, BackendError> {
        let url = format!("{}/getLevel", self.base_url);
        debug!(%url, user_id, "fetching current level");

        let response = self
            .client
            .get(&url)
            .query(&[("userId", user_id)])
            .send()
            .await
            .map_err(|e| BackendError::connectivity(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::connectivity(format!(
                "getLevel returned {status}"
            )));
        }

        let body: LevelResponse = response
            .json()
            .await
            .map_err(|e| BackendError::unexpected_payload(e.to_string()))?;

        Ok(body.level)
    }

    async fn submit_flag(
        &self,
        flag: &str,
        user_id: &str,
    ) -> Result<SubmissionResult, BackendError> {
        let url = format!("{}/checkFlag", self.base_url);
        debug!(%url, user_id, "submitting flag");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "flag": flag, "userId": user_id }))
            .send()
            .await
            .map_err(|e| BackendError::connectivity(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::connectivity(format!(
                "checkFlag returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::unexpected_payload(e.to_string()))
    }
}
