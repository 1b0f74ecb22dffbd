//! OAuth2 collaborators: refresh-token exchange and the interactive consent flow

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use yup_oauth2::storage::{TokenInfo, TokenStorage, TokenStorageError};
use yup_oauth2::ApplicationSecret;

use crate::config::OAuthConfig;
use crate::error::{Result, TriageError};
use crate::models::{Credential, TokenGrant};

/// Read-only scope, enough to list and read messages
pub const READONLY_SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.readonly"];

/// Metadata-only scope (headers only, no body content)
pub const METADATA_SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.metadata"];

const REFRESH_TIMEOUT: Duration = Duration::from_secs(20);

/// Exchanges a refresh token for a new access token without user interaction
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant>;
}

/// Mints a brand-new credential through a user-facing consent flow
#[async_trait]
pub trait InteractiveAuthorizer: Send + Sync {
    async fn authorize(&self, scopes: &[String]) -> Result<Credential>;
}

/// Refresh grant against the provider's token endpoint
///
/// Client id and secret come from configuration when both are set, otherwise
/// from the installed-app client secret file.
pub struct OAuthRefresher {
    http: reqwest::Client,
    token_uri: String,
    inline_client: Option<(String, String)>,
    credentials_file: PathBuf,
}

impl OAuthRefresher {
    pub fn new(config: &OAuthConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REFRESH_TIMEOUT)
            .build()
            .map_err(|e| TriageError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token_uri: config.token_uri.clone(),
            inline_client: config
                .inline_client()
                .map(|(id, secret)| (id.to_string(), secret.to_string())),
            credentials_file: config.credentials_file.clone(),
        })
    }

    async fn client_pair(&self) -> Result<(String, String)> {
        if let Some(pair) = &self.inline_client {
            return Ok(pair.clone());
        }

        let secret = read_client_secret(&self.credentials_file)
            .await
            .map_err(|e| TriageError::RefreshError(format!("No OAuth client available: {}", e)))?;
        Ok((secret.client_id, secret.client_secret))
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        let (client_id, client_secret) = self.client_pair().await?;

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| TriageError::RefreshError(format!("Token endpoint unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TriageError::RefreshError(format!("Failed to read token response: {}", e)))?;

        if !status.is_success() {
            return Err(TriageError::RefreshError(format!(
                "Token endpoint returned HTTP {}: {}",
                status.as_u16(),
                oauth_error_summary(&body)
            )));
        }

        let grant: TokenGrant = serde_json::from_str(&body)
            .map_err(|e| TriageError::RefreshError(format!("Malformed token response: {}", e)))?;
        if grant.access_token.is_empty() {
            return Err(TriageError::RefreshError(
                "Token response carried an empty access token".to_string(),
            ));
        }
        if let Some(expires_in) = grant.expires_in {
            if expires_in < 0 || grant.expiry_from(Utc::now()).is_none() {
                return Err(TriageError::RefreshError(format!(
                    "Token response carried an invalid expires_in: {}",
                    expires_in
                )));
            }
        }

        tracing::debug!(expires_in = ?grant.expires_in, "Refresh grant accepted");
        Ok(grant)
    }
}

/// `error` / `error_description` from an OAuth error body, without echoing tokens
fn oauth_error_summary(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct OAuthErrorBody {
        error: Option<String>,
        error_description: Option<String>,
    }

    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(OAuthErrorBody {
            error: Some(error),
            error_description,
        }) => match error_description {
            Some(description) => format!("{} ({})", error, description),
            None => error,
        },
        _ => "unrecognized error body".to_string(),
    }
}

/// Installed-app consent flow with a local redirect listener
///
/// Opens the consent URL for the user and waits for the redirect on
/// `http://localhost:<redirect_port>`.
pub struct InstalledFlowAuthorizer {
    credentials_file: PathBuf,
    redirect_port: u16,
}

impl InstalledFlowAuthorizer {
    pub fn new(config: &OAuthConfig) -> Self {
        Self {
            credentials_file: config.credentials_file.clone(),
            redirect_port: config.redirect_port,
        }
    }
}

#[async_trait]
impl InteractiveAuthorizer for InstalledFlowAuthorizer {
    async fn authorize(&self, scopes: &[String]) -> Result<Credential> {
        let secret = read_client_secret(&self.credentials_file).await?;

        let captured = CapturedToken::default();
        let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            yup_oauth2::InstalledFlowReturnMethod::HTTPPortRedirect(self.redirect_port),
        )
        .with_storage(Box::new(captured.clone()))
        .build()
        .await
        .map_err(|e| TriageError::AuthError(format!("Failed to build authenticator: {}", e)))?;

        tracing::info!(
            "Starting interactive authorization, waiting for redirect on port {}",
            self.redirect_port
        );

        let scope_refs: Vec<&str> = scopes.iter().map(String::as_str).collect();
        let token = auth
            .token(&scope_refs)
            .await
            .map_err(|e| TriageError::AuthError(format!("Failed to obtain token: {}", e)))?;

        let mut credential = match captured.take() {
            Some(info) => credential_from_token_info(info)?,
            None => {
                // Storage not consulted; fall back to what the access token exposes
                let access_token = token
                    .token()
                    .ok_or_else(|| TriageError::AuthError("Consent flow returned no access token".to_string()))?;
                let mut credential = Credential::new(access_token);
                credential.expiry = token
                    .expiration_time()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.unix_timestamp(), 0));
                credential
            }
        };
        credential.scopes = scopes.iter().cloned().collect();

        tracing::info!("Interactive authorization completed");
        Ok(credential)
    }
}

/// Read the installed-app client secret JSON
pub async fn read_client_secret(path: &Path) -> Result<ApplicationSecret> {
    if !path.exists() {
        return Err(TriageError::ConfigError(format!(
            "{} not found. Download the OAuth client secret and run `zenbox auth` to create a token.",
            path.display()
        )));
    }

    yup_oauth2::read_application_secret(path)
        .await
        .map_err(|e| TriageError::ConfigError(format!("Failed to read client secret {}: {}", path.display(), e)))
}

fn credential_from_token_info(info: TokenInfo) -> Result<Credential> {
    let access_token = info
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| TriageError::AuthError("Consent flow returned no access token".to_string()))?;

    let mut credential = Credential::new(access_token);
    credential.refresh_token = info.refresh_token;
    credential.expiry = info
        .expires_at
        .and_then(|t| DateTime::<Utc>::from_timestamp(t.unix_timestamp(), 0));
    Ok(credential)
}

/// Token storage that only remembers the last token handed to it
///
/// yup-oauth2 keeps refresh tokens private to its own storage; this lets the
/// consent flow's full result reach our credential store.
#[derive(Clone, Default)]
struct CapturedToken {
    slot: Arc<Mutex<Option<TokenInfo>>>,
}

impl CapturedToken {
    fn take(&self) -> Option<TokenInfo> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner()).take()
    }
}

#[async_trait]
impl TokenStorage for CapturedToken {
    async fn set(
        &self,
        _scopes: &[&str],
        token: TokenInfo,
    ) -> std::result::Result<(), TokenStorageError> {
        *self.slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(token);
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        // Never hand a cached token back; each authorize() is a fresh consent
        None
    }
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
/// to prevent unauthorized access to OAuth2 tokens
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows uses ACLs, file permissions are left as created
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oauth_config(server_uri: &str) -> OAuthConfig {
        OAuthConfig {
            client_id: "test-client-id".to_string(),
            client_secret: "test-secret".to_string(),
            token_uri: format!("{}/token", server_uri),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_refresh_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
                "scope": "https://www.googleapis.com/auth/gmail.readonly",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let refresher = OAuthRefresher::new(&oauth_config(&server.uri())).unwrap();
        let grant = refresher.refresh("1//refresh").await.unwrap();

        assert_eq!(grant.access_token, "ya29.fresh");
        assert_eq!(grant.expires_in, Some(3599));
        assert!(grant.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_refresh_rejected_is_refresh_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let refresher = OAuthRefresher::new(&oauth_config(&server.uri())).unwrap();
        let err = refresher.refresh("revoked").await.unwrap_err();

        match err {
            TriageError::RefreshError(message) => {
                assert!(message.contains("HTTP 400"));
                assert!(message.contains("invalid_grant"));
            }
            other => panic!("expected RefreshError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_with_unrepresentable_lifetime_is_refresh_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.fresh",
                "expires_in": i64::MAX,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let refresher = OAuthRefresher::new(&oauth_config(&server.uri())).unwrap();
        let err = refresher.refresh("1//refresh").await.unwrap_err();

        match err {
            TriageError::RefreshError(message) => assert!(message.contains("expires_in")),
            other => panic!("expected RefreshError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_without_client_material() {
        let temp_dir = TempDir::new().unwrap();
        let config = OAuthConfig {
            credentials_file: temp_dir.path().join("missing.json"),
            ..Default::default()
        };

        let refresher = OAuthRefresher::new(&config).unwrap();
        assert!(matches!(
            refresher.refresh("any").await,
            Err(TriageError::RefreshError(_))
        ));
    }

    #[tokio::test]
    async fn test_half_configured_client_falls_back_to_secret_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let config = OAuthConfig {
            client_id: "only-the-id".to_string(),
            credentials_file: temp_dir.path().join("missing.json"),
            ..oauth_config(&server.uri())
        };
        let config = OAuthConfig {
            client_secret: String::new(),
            ..config
        };

        let refresher = OAuthRefresher::new(&config).unwrap();
        match refresher.refresh("1//refresh").await {
            Err(TriageError::RefreshError(message)) => {
                assert!(message.contains("No OAuth client available"))
            }
            other => panic!("expected RefreshError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_client_secret() {
        let credentials_json = r#"{
            "installed": {
                "client_id": "test-client-id",
                "project_id": "test-project",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_secret": "test-secret",
                "redirect_uris": ["http://localhost:8080"]
            }
        }"#;

        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), credentials_json)
            .await
            .unwrap();

        let secret = read_client_secret(temp_file.path()).await.unwrap();
        assert_eq!(secret.client_id, "test-client-id");
        assert_eq!(secret.client_secret, "test-secret");
    }

    #[tokio::test]
    async fn test_missing_client_secret_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let authorizer = InstalledFlowAuthorizer::new(&OAuthConfig {
            credentials_file: temp_dir.path().join("credentials.json"),
            ..Default::default()
        });

        let result = authorizer.authorize(&["scope".to_string()]).await;
        assert!(matches!(result, Err(TriageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_captured_token_never_served_back() {
        let captured = CapturedToken::default();
        let info = TokenInfo {
            access_token: Some("abc".to_string()),
            refresh_token: Some("def".to_string()),
            expires_at: None,
            id_token: None,
        };
        captured.set(&["scope"], info).await.unwrap();

        assert!(captured.get(&["scope"]).await.is_none());
        let credential = credential_from_token_info(captured.take().unwrap()).unwrap();
        assert_eq!(credential.access_token, "abc");
        assert_eq!(credential.refresh_token.as_deref(), Some("def"));
        assert!(captured.take().is_none());
    }

    #[test]
    fn test_oauth_error_summary() {
        assert_eq!(
            oauth_error_summary(r#"{"error":"invalid_client"}"#),
            "invalid_client"
        );
        assert_eq!(oauth_error_summary("<html>"), "unrecognized error body");
    }

    #[tokio::test]
    async fn test_secure_token_file() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "test content")
            .await
            .unwrap();

        secure_token_file(temp_file.path()).await.unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = tokio::fs::metadata(temp_file.path()).await.unwrap();
            assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
        }
    }

    #[test]
    fn test_scopes_constants() {
        assert_eq!(READONLY_SCOPES.len(), 1);
        assert!(READONLY_SCOPES.contains(&"https://www.googleapis.com/auth/gmail.readonly"));
        assert_eq!(METADATA_SCOPES.len(), 1);
    }
}
