//! Remote language-model classifier client (Gemini `generateContent`)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ClassifierConfig;
use crate::error::{Result, TriageError};

/// Sends a prompt to the remote classifier and returns the raw response body
#[async_trait]
pub trait ClassifierClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Fails with `ConfigError` when no API key is configured
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let timeout = config.timeout();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TriageError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl ClassifierClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest::from_prompt(prompt);

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| TriageError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(TriageError::from_status(
                status.as_u16(),
                format!("classifier returned HTTP {}", status.as_u16()),
                retry_after,
            ));
        }

        response
            .text()
            .await
            .map_err(|e| TriageError::from_reqwest(e, self.timeout))
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_prompt(prompt: &'a str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
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
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Text of the first part of the first candidate
pub fn extract_candidate_text(body: &str) -> Result<String> {
    let envelope: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| TriageError::ParseError(format!("classifier envelope is not JSON: {}", e)))?;

    envelope
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or_else(|| {
            TriageError::ParseError("classifier envelope has no candidate text".to_string())
        })
}
