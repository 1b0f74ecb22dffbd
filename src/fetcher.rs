//! Mail fetching: list, get, and project messages into `EmailSummary`

use futures::stream::{self, StreamExt, TryStreamExt};
use google_gmail1::api::{Message, MessagePartHeader};
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::MailProvider;
use crate::credentials::CredentialManager;
use crate::error::{Result, TriageError};
use crate::models::EmailSummary;

pub struct MailFetcher {
    credentials: Arc<CredentialManager>,
    provider: Arc<dyn MailProvider>,
    max_concurrent: usize,
}

impl MailFetcher {
    pub fn new(
        credentials: Arc<CredentialManager>,
        provider: Arc<dyn MailProvider>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            credentials,
            provider,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Newest `max_results` messages as summaries, in provider list order
    ///
    /// Credential failures keep their own error kind; anything the provider
    /// raises is wrapped in `TriageError::MailProvider`.
    pub async fn list_emails(&self, max_results: u32) -> Result<Vec<EmailSummary>> {
        if max_results == 0 {
            return Err(TriageError::BadRequest(
                "max_results must be at least 1".to_string(),
            ));
        }

        let credential = self.credentials.obtain_valid_credential().await?;

        let mut ids = self
            .provider
            .list_message_ids(&credential, max_results)
            .await
            .map_err(TriageError::mail_provider)?;
        ids.truncate(max_results as usize);
        debug!("Fetching {} messages", ids.len());

        let credential = &credential;
        let provider = &self.provider;
        let summaries: Vec<EmailSummary> = stream::iter(ids)
            .map(|id| async move {
                let message = provider.get_message(credential, &id).await?;
                summarize_message(&message)
            })
            .buffered(self.max_concurrent)
            .try_collect()
            .await
            .map_err(TriageError::mail_provider)?;

        info!("Fetched {} email summaries", summaries.len());
        Ok(summaries)
    }
}

/// Project `Subject`, `From` and the snippet; absent values become empty strings
///
/// Header names are matched case-sensitively and the first occurrence wins.
pub fn summarize_message(message: &Message) -> Result<EmailSummary> {
    let payload = message.payload.as_ref().ok_or_else(|| {
        TriageError::InvalidMessageFormat(format!(
            "Message {} has no payload",
            message.id.as_deref().unwrap_or("<unknown>")
        ))
    })?;

    let headers = payload.headers.as_deref().unwrap_or_default();

    Ok(EmailSummary {
        subject: header_value(headers, "Subject"),
        sender: header_value(headers, "From"),
        snippet: message.snippet.clone().unwrap_or_default(),
    })
}

fn header_value(headers: &[MessagePartHeader], name: &str) -> String {
    headers
        .iter()
        .find(|h| h.name.as_deref() == Some(name))
        .and_then(|h| h.value.clone())
        .unwrap_or_default()
}
