//! Classification pipeline: remote classifier first, keyword rules on any failure

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::classifier::classify_by_rules;
use crate::config::ClassifierConfig;
use crate::error::{Result, TriageError};
use crate::gemini::{extract_candidate_text, ClassifierClient, GeminiClient};
use crate::models::{ClassificationRequest, ClassificationResult, EmailCategory, EmailStatus};

pub struct ClassificationPipeline {
    client: Option<Arc<dyn ClassifierClient>>,
    timeout: Duration,
    strict_labels: bool,
}

impl ClassificationPipeline {
    pub fn new(client: Arc<dyn ClassifierClient>, timeout: Duration) -> Self {
        Self {
            client: Some(client),
            timeout,
            strict_labels: false,
        }
    }

    /// Pipeline without a remote classifier; every request uses the rules
    pub fn rules_only() -> Self {
        Self {
            client: None,
            timeout: Duration::ZERO,
            strict_labels: false,
        }
    }

    /// Build from configuration, using the rule engine alone when no API key is set
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let pipeline = match GeminiClient::new(config) {
            Ok(client) => Self::new(Arc::new(client), config.timeout()),
            Err(e) => {
                warn!("Remote classifier disabled: {}", e);
                Self::rules_only()
            }
        };
        pipeline.with_strict_labels(config.strict_labels)
    }

    /// Reject remote answers outside the fixed category/status sets
    pub fn with_strict_labels(mut self, strict: bool) -> Self {
        self.strict_labels = strict;
        self
    }

    pub fn has_remote(&self) -> bool {
        self.client.is_some()
    }

    /// Classify one message. Never fails: any remote problem degrades to the rules.
    pub async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        let Some(client) = self.client.as_ref() else {
            return classify_by_rules(&request.combined_text());
        };

        match self.classify_remote(client.as_ref(), request).await {
            Ok(result) => {
                debug!(category = %result.category, status = %result.status, "Remote classification");
                result
            }
            Err(e) => {
                if e.is_external_failure() {
                    warn!(kind = e.kind(), "Remote classifier unavailable, using keyword rules: {}", e);
                } else {
                    warn!(kind = e.kind(), "Remote classifier answer unusable, using keyword rules: {}", e);
                }
                classify_by_rules(&request.combined_text())
            }
        }
    }

    async fn classify_remote(
        &self,
        client: &dyn ClassifierClient,
        request: &ClassificationRequest,
    ) -> Result<ClassificationResult> {
        let prompt = build_prompt(request);

        let body = tokio::time::timeout(self.timeout, client.complete(&prompt))
            .await
            .map_err(|_| TriageError::Timeout(self.timeout))??;

        let text = extract_candidate_text(&body)?;
        let result = parse_classification(&text)?;

        if self.strict_labels && !result.is_within_known_sets() {
            return Err(TriageError::ParseError(format!(
                "classifier answered outside the known sets: {} / {} / {}",
                result.category, result.status, result.confidence
            )));
        }

        Ok(result)
    }
}

/// Prompt asking for a single JSON object with category, status and confidence
pub fn build_prompt(request: &ClassificationRequest) -> String {
    let categories = EmailCategory::ALL
        .iter()
        .map(|c| format!("- {}", c.as_str()))
        .collect::<Vec<_>>()
        .join("\n");
    let statuses = EmailStatus::ALL
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Classify this email into one of these categories:\n\
         {categories}\n\
         \n\
         Also determine its status, one of: {statuses}.\n\
         Respond with a single JSON object and nothing else, containing exactly the keys \
         \"category\", \"status\" and \"confidence\" (a number between 0 and 1), for example:\n\
         {{\"category\": \"Events\", \"status\": \"upcoming\", \"confidence\": 0.95}}\n\
         \n\
         Subject: {subject}\n\
         Body: {body}\n",
        categories = categories,
        statuses = statuses,
        subject = request.subject,
        body = request.body,
    )
}

#[derive(Debug, Deserialize)]
struct RemoteClassification {
    category: String,
    status: String,
    confidence: f64,
}

/// Parse the classifier's text payload as `{category, status, confidence}`
pub fn parse_classification(text: &str) -> Result<ClassificationResult> {
    let parsed: RemoteClassification = serde_json::from_str(text.trim())
        .map_err(|e| TriageError::ParseError(format!("classifier payload rejected: {}", e)))?;

    Ok(ClassificationResult {
        category: parsed.category,
        status: parsed.status,
        confidence: parsed.confidence,
    })
}
