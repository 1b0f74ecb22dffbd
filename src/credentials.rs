//! Credential lifecycle: load, validate, refresh or re-authorize, persist
//!
//! The check-then-refresh-or-authorize-then-persist sequence runs under one
//! async lock per store location, so concurrent callers that all observe an
//! expired token trigger a single refresh (or a single consent flow) and the
//! rest pick up the freshly persisted credential.

use chrono::Utc;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::auth::{InteractiveAuthorizer, TokenRefresher};
use crate::error::{Result, TriageError};
use crate::models::Credential;
use crate::token_store::CredentialStore;

static LOCATION_LOCKS: Lazy<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Shared lock guarding one persisted credential location
fn location_lock(location: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = LOCATION_LOCKS.lock().unwrap_or_else(|p| p.into_inner());
    Arc::clone(
        locks
            .entry(location.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
    )
}

pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    authorizer: Option<Arc<dyn InteractiveAuthorizer>>,
    scopes: Vec<String>,
}

impl CredentialManager {
    /// `authorizer` is `None` when no interactive flow is configured; the
    /// manager then only works from a stored (or refreshable) credential.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        authorizer: Option<Arc<dyn InteractiveAuthorizer>>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            store,
            refresher,
            authorizer,
            scopes,
        }
    }

    /// Return a currently valid credential, refreshing or re-authorizing if needed
    ///
    /// Each successful refresh or authorization is persisted exactly once.
    pub async fn obtain_valid_credential(&self) -> Result<Credential> {
        let location = self.store.location();
        let lock = location_lock(&location);
        let _guard = lock.lock().await;

        let stored = match self.store.load().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(location = %location, "Ignoring unreadable stored credential: {}", e);
                None
            }
        };

        let mut refresh_failure = None;

        if let Some(mut credential) = stored {
            if credential.is_valid() {
                debug!(location = %location, "Stored credential is still valid");
                return Ok(credential);
            }

            if credential.can_refresh() {
                let refresh_token = credential.refresh_token.clone().unwrap_or_default();
                match self.refresher.refresh(&refresh_token).await {
                    Ok(grant) => {
                        credential.apply_grant(grant, Utc::now());
                        self.store.save(&credential).await?;
                        info!(location = %location, expiry = ?credential.expiry, "Refreshed access token");
                        return Ok(credential);
                    }
                    Err(e) => {
                        warn!(location = %location, "Token refresh failed, re-authorization required: {}", e);
                        refresh_failure = Some(e);
                    }
                }
            }
        }

        let Some(authorizer) = self.authorizer.as_ref() else {
            return Err(match refresh_failure {
                Some(TriageError::RefreshError(message)) => TriageError::RefreshError(message),
                Some(other) => TriageError::RefreshError(other.to_string()),
                None => TriageError::ConfigError(
                    "No usable stored credential and no interactive authorization configured"
                        .to_string(),
                ),
            });
        };

        self.authorize_and_persist(authorizer.as_ref(), &location).await
    }

    /// Run the consent flow unconditionally and overwrite the stored credential
    pub async fn reauthorize(&self) -> Result<Credential> {
        let location = self.store.location();
        let lock = location_lock(&location);
        let _guard = lock.lock().await;

        let authorizer = self.authorizer.as_ref().ok_or_else(|| {
            TriageError::ConfigError("Interactive authorization is not configured".to_string())
        })?;
        self.authorize_and_persist(authorizer.as_ref(), &location).await
    }

    async fn authorize_and_persist(
        &self,
        authorizer: &dyn InteractiveAuthorizer,
        location: &str,
    ) -> Result<Credential> {
        let credential = authorizer.authorize(&self.scopes).await?;
        self.store.save(&credential).await?;
        info!(location = %location, "Stored newly authorized credential");
        Ok(credential)
    }
}
