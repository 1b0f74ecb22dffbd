//! Gmail API adapter behind the `MailProvider` trait

use async_trait::async_trait;
use google_gmail1::api::Message;
use google_gmail1::{hyper_rustls, hyper_util, Gmail};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, TriageError};
use crate::models::Credential;

/// Connector used by the production hub
pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Type alias for the Gmail hub to simplify type signatures
pub type GmailHub = Gmail<HttpsConnector>;

/// Headers requested with each message; everything else is skipped by the API
pub const METADATA_HEADERS: &[&str] = &["Subject", "From"];

/// List-then-get message access, authorized by a caller-supplied credential
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Ids of the newest messages, at most `max_results`
    async fn list_message_ids(&self, credential: &Credential, max_results: u32) -> Result<Vec<String>>;

    /// Message metadata (headers and snippet) for one id
    async fn get_message(&self, credential: &Credential, id: &str) -> Result<Message>;
}

/// Production provider talking to `gmail.googleapis.com`
///
/// The hub is rebuilt per call around the credential's access token, so a
/// refreshed token is always what goes on the wire.
pub struct GmailMailProvider {
    client: google_gmail1::common::Client<HttpsConnector>,
    request_timeout: Duration,
}

impl GmailMailProvider {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        // Use HTTP/1 for compatibility (works better with google-gmail1)
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| TriageError::ConfigError(format!("Failed to load TLS roots: {}", e)))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
            .build(connector);

        Ok(Self {
            client,
            request_timeout,
        })
    }

    fn hub(&self, credential: &Credential) -> GmailHub {
        Gmail::new(self.client.clone(), credential.access_token.clone())
    }
}

/// Bound a provider call so a stalled connection cannot hang the caller
async fn with_timeout<T, F>(timeout: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, google_gmail1::Error>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(TriageError::from),
        Err(_) => {
            warn!("Gmail API {} call timed out after {:?}", operation, timeout);
            Err(TriageError::Timeout(timeout))
        }
    }
}

#[async_trait]
impl MailProvider for GmailMailProvider {
    async fn list_message_ids(&self, credential: &Credential, max_results: u32) -> Result<Vec<String>> {
        let hub = self.hub(credential);
        let call = hub.users().messages_list("me").max_results(max_results).doit();

        let (_, response) = with_timeout(self.request_timeout, "messages.list", call).await?;

        let ids = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|msg_ref| {
                msg_ref.id.ok_or_else(|| {
                    TriageError::InvalidMessageFormat("Message reference without id".to_string())
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Listed {} message ids", ids.len());
        Ok(ids)
    }

    async fn get_message(&self, credential: &Credential, id: &str) -> Result<Message> {
        let hub = self.hub(credential);
        let mut call = hub.users().messages_get("me", id).format("metadata");
        for header in METADATA_HEADERS {
            call = call.add_metadata_headers(header);
        }

        let (_, message) = with_timeout(self.request_timeout, "messages.get", call.doit()).await?;
        Ok(message)
    }
}
