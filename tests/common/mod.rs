//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use google_gmail1::api::{Message, MessagePart, MessagePartHeader};
use mockall::mock;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;
use zenbox_triage::auth::{InteractiveAuthorizer, TokenRefresher};
use zenbox_triage::client::MailProvider;
use zenbox_triage::error::Result;
use zenbox_triage::gemini::ClassifierClient;
use zenbox_triage::models::{Credential, TokenGrant};

pub const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

pub fn scopes() -> Vec<String> {
    vec![READONLY_SCOPE.to_string()]
}

/// Credential that stays valid for another hour
pub fn valid_credential(token: &str) -> Credential {
    Credential::new(token)
        .with_refresh_token("1//refresh-valid")
        .with_expiry(Utc::now() + Duration::hours(1))
        .with_scopes([READONLY_SCOPE])
}

/// Credential that expired ten minutes ago
pub fn expired_credential(refresh_token: Option<&str>) -> Credential {
    let mut credential = Credential::new("ya29.expired")
        .with_expiry(Utc::now() - Duration::minutes(10))
        .with_scopes([READONLY_SCOPE]);
    credential.refresh_token = refresh_token.map(str::to_string);
    credential
}

pub fn grant(access_token: &str, expires_in: i64) -> TokenGrant {
    TokenGrant {
        access_token: access_token.to_string(),
        expires_in: Some(expires_in),
        refresh_token: None,
        scope: None,
    }
}

/// Gemini response envelope wrapping `text` as the first candidate part
pub fn gemini_envelope(text: &str) -> String {
    json!({
        "candidates": [{
            "content": {
                "parts": [{"text": text}],
                "role": "model"
            },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

/// Gmail message with the given headers and snippet
pub fn gmail_message(id: &str, headers: &[(&str, &str)], snippet: Option<&str>) -> Message {
    Message {
        id: Some(id.to_string()),
        thread_id: Some(format!("thread_{}", id)),
        snippet: snippet.map(str::to_string),
        payload: Some(MessagePart {
            headers: Some(
                headers
                    .iter()
                    .map(|(name, value)| MessagePartHeader {
                        name: Some(name.to_string()),
                        value: Some(value.to_string()),
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Refresher that counts calls and takes a while to answer
pub struct SlowRefresher {
    pub calls: AtomicUsize,
    pub delay: StdDuration,
}

impl SlowRefresher {
    pub fn new(delay: StdDuration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for SlowRefresher {
    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(grant("ya29.refreshed", 3600))
    }
}

/// Authorizer that counts calls and takes a while to answer
pub struct SlowAuthorizer {
    pub calls: AtomicUsize,
    pub delay: StdDuration,
}

impl SlowAuthorizer {
    pub fn new(delay: StdDuration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InteractiveAuthorizer for SlowAuthorizer {
    async fn authorize(&self, _scopes: &[String]) -> Result<Credential> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(valid_credential("ya29.authorized"))
    }
}

/// Classifier client that never answers within any sensible deadline
pub struct StalledClassifier;

#[async_trait]
impl ClassifierClient for StalledClassifier {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(StdDuration::from_secs(30)).await;
        Ok(gemini_envelope(
            r#"{"category": "Events", "status": "upcoming", "confidence": 0.9}"#,
        ))
    }
}

mock! {
    pub MailProvider {}

    #[async_trait::async_trait]
    impl MailProvider for MailProvider {
        async fn list_message_ids(&self, credential: &Credential, max_results: u32) -> Result<Vec<String>>;
        async fn get_message(&self, credential: &Credential, id: &str) -> Result<Message>;
    }
}

mock! {
    pub ClassifierClient {}

    #[async_trait::async_trait]
    impl ClassifierClient for ClassifierClient {
        async fn complete(&self, prompt: &str) -> Result<String>;
    }
}

mock! {
    pub TokenRefresher {}

    #[async_trait::async_trait]
    impl TokenRefresher for TokenRefresher {
        async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant>;
    }
}

mock! {
    pub InteractiveAuthorizer {}

    #[async_trait::async_trait]
    impl InteractiveAuthorizer for InteractiveAuthorizer {
        async fn authorize(&self, scopes: &[String]) -> Result<Credential>;
    }
}
