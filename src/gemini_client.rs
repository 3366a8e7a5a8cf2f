use crate::errors::AppError;
use crate::rate_limiter::RateLimiter;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Retry schedule for quota-limited calls: linear backoff of
/// `(attempt + 1) * base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(30),
        }
    }
}

/// A file stored through the Files API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    pub uri: String,
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
}

/// One element of a prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    File { mime_type: String, file_uri: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn file(file: &UploadedFile) -> Self {
        Part::File {
            mime_type: file.mime_type.clone(),
            file_uri: file.uri.clone(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Part::Text(text) => json!({ "text": text }),
            Part::File { mime_type, file_uri } => json!({
                "file_data": { "mime_type": mime_type, "file_uri": file_uri }
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

enum CallError {
    /// 429 or quota exhaustion: worth retrying.
    Quota(String),
    Fatal(AppError),
}

/// Client for the Gemini generative-language API.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
    limiter: Arc<RateLimiter>,
}

impl GeminiClient {
    /// Creates a new `GeminiClient`.
    ///
    /// The rate limiter is shared: every client built from the same limiter
    /// respects the same call spacing.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        retry: RetryPolicy,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Gemini client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            retry,
            limiter,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Uploads a file with the resumable Files API protocol.
    ///
    /// # Arguments
    ///
    /// * `bytes` - File content.
    /// * `display_name` - Name shown in the Files API listing.
    /// * `mime_type` - Content type, e.g. `application/pdf`.
    pub async fn upload_file(
        &self,
        bytes: Vec<u8>,
        display_name: &str,
        mime_type: &str,
    ) -> Result<UploadedFile, AppError> {
        let url = format!("{}/upload/v1beta/files", self.base_url);
        tracing::info!("Uploading '{}' to Gemini Files API ({} bytes)", display_name, bytes.len());

        let start = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Upload start failed: {}", e)))?;

        if !start.status().is_success() {
            let status = start.status();
            let error_text = start
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Gemini upload start returned {}: {}",
                status, error_text
            )));
        }

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::ExternalApiError("Upload start response missing upload URL".to_string())
            })?;

        let response = self
            .client
            .post(&upload_url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Gemini upload returned {}: {}",
                status, error_text
            )));
        }

        let uploaded: UploadResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse upload response: {}", e))
        })?;

        tracing::info!("✓ File uploaded: {} ({})", uploaded.file.name, uploaded.file.uri);
        Ok(uploaded.file)
    }

    /// Deletes a previously uploaded file.
    pub async fn delete_file(&self, name: &str) -> Result<(), AppError> {
        let url = format!("{}/v1beta/{}", self.base_url, name);
        tracing::info!("Deleting uploaded file {}", name);

        let response = self
            .client
            .delete(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Delete request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Gemini delete returned {}: {}",
                status, error_text
            )));
        }

        Ok(())
    }

    /// Generates content from a multi-part prompt and returns the model's text.
    ///
    /// Waits for the shared rate limiter first. Quota errors are retried per
    /// the client's [`RetryPolicy`]; any other failure is returned immediately.
    pub async fn generate_content(&self, parts: &[Part]) -> Result<String, AppError> {
        self.limiter.acquire().await;

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": parts.iter().map(Part::to_json).collect::<Vec<_>>(),
            }]
        });

        let mut attempt = 0;
        loop {
            match self.send_generate(&body).await {
                Ok(text) => {
                    tracing::info!("Content generation complete ({} chars)", text.len());
                    return Ok(text);
                }
                Err(CallError::Quota(msg)) if attempt + 1 < self.retry.max_attempts => {
                    let wait = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "⚠️ Quota exhausted (attempt {}/{}). Waiting {}s...",
                        attempt + 1,
                        self.retry.max_attempts,
                        wait.as_secs()
                    );
                    tracing::debug!("Quota error: {}", msg);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(CallError::Quota(msg)) => return Err(AppError::ExternalApiError(msg)),
                Err(CallError::Fatal(e)) => return Err(e),
            }
        }
    }

    async fn send_generate(&self, body: &Value) -> Result<String, CallError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                CallError::Fatal(AppError::ExternalApiError(format!(
                    "Gemini request failed: {}",
                    e
                )))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let msg = format!("Gemini returned {}: {}", status, error_text);
            if is_quota_error(status, &error_text) {
                return Err(CallError::Quota(msg));
            }
            return Err(CallError::Fatal(AppError::ExternalApiError(msg)));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            CallError::Fatal(AppError::ExternalApiError(format!(
                "Failed to parse Gemini response: {}",
                e
            )))
        })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(CallError::Fatal(AppError::ExternalApiError(
                "Gemini response contained no text".to_string(),
            )));
        }

        Ok(text.to_string())
    }
}

fn is_quota_error(status: StatusCode, body: &str) -> bool {
    let lowered = body.to_lowercase();
    status == StatusCode::TOO_MANY_REQUESTS
        || lowered.contains("quota")
        || lowered.contains("resource_exhausted")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GeminiClient::new(
            "https://example.com/".to_string(),
            "key".to_string(),
            "gemini-2.5-pro".to_string(),
            RetryPolicy::default(),
            Arc::new(RateLimiter::new(Duration::ZERO)),
        );
        assert!(client.is_ok());
        assert_eq!(client.unwrap().model(), "gemini-2.5-pro");
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(30));
        assert_eq!(policy.delay_for(1), Duration::from_secs(60));
        assert_eq!(policy.delay_for(2), Duration::from_secs(90));
    }

    #[test]
    fn test_quota_detection() {
        assert!(is_quota_error(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_quota_error(
            StatusCode::FORBIDDEN,
            r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#
        ));
        assert!(is_quota_error(StatusCode::BAD_REQUEST, "Quota exceeded for metric"));
        assert!(!is_quota_error(StatusCode::BAD_REQUEST, "invalid argument"));
    }

    #[test]
    fn test_part_json() {
        assert_eq!(Part::text("hi").to_json(), json!({ "text": "hi" }));

        let file = UploadedFile {
            name: "files/1".into(),
            uri: "https://files/1".into(),
            mime_type: "application/pdf".into(),
        };
        assert_eq!(
            Part::file(&file).to_json(),
            json!({ "file_data": { "mime_type": "application/pdf", "file_uri": "https://files/1" } })
        );
    }
}
