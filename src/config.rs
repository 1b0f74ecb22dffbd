use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::READONLY_SCOPES;
use crate::error::{Result, TriageError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Language-model API key; empty means the rule engine answers every request
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_classifier_base_url")]
    pub base_url: String,
    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,
    /// Reject remote results outside the fixed category/status sets
    #[serde(default)]
    pub strict_labels: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_classifier_base_url(),
            timeout_secs: default_classifier_timeout_secs(),
            strict_labels: false,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full `generateContent` URL for the configured model
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    /// Client secret JSON downloaded from the cloud console (installed app)
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            scopes: default_scopes(),
            token_file: default_token_file(),
            credentials_file: default_credentials_file(),
            token_uri: default_token_uri(),
            redirect_port: default_redirect_port(),
        }
    }
}

impl OAuthConfig {
    /// Client id and secret set directly in configuration, if both are present
    pub fn inline_client(&self) -> Option<(&str, &str)> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            None
        } else {
            Some((self.client_id.as_str(), self.client_secret.as_str()))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_max_results")]
    pub default_max_results: u32,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
            max_concurrent_requests: default_max_concurrent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl MailConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_classifier_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_classifier_timeout_secs() -> u64 {
    20
}

fn default_scopes() -> Vec<String> {
    READONLY_SCOPES.iter().map(|s| s.to_string()).collect()
}

fn default_token_file() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_redirect_port() -> u16 {
    8080
}

fn default_max_results() -> u32 {
    10
}

fn default_max_concurrent() -> usize {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Gmail rejects list requests above this page size
const MAX_LIST_RESULTS: u32 = 500;

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TriageError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load the file, then apply process environment overrides, then validate
    pub async fn load_with_env(path: &Path) -> Result<Self> {
        let mut config = Self::load(path).await?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override settings from environment-style variables
    ///
    /// Recognized keys: `GEMINI_API_KEY`, `GEMINI_MODEL`, `GOOGLE_CLIENT_ID`,
    /// `GOOGLE_CLIENT_SECRET`, `GMAIL_SCOPES` (space or comma separated),
    /// `TOKEN_FILE`, `CREDENTIALS_FILE`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("GEMINI_API_KEY") {
            self.classifier.api_key = key;
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.classifier.model = model;
        }
        if let Some(id) = get("GOOGLE_CLIENT_ID") {
            self.oauth.client_id = id;
        }
        if let Some(secret) = get("GOOGLE_CLIENT_SECRET") {
            self.oauth.client_secret = secret;
        }
        if let Some(scopes) = get("GMAIL_SCOPES") {
            self.oauth.scopes = scopes
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(path) = get("TOKEN_FILE") {
            self.oauth.token_file = PathBuf::from(path);
        }
        if let Some(path) = get("CREDENTIALS_FILE") {
            self.oauth.credentials_file = PathBuf::from(path);
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    TriageError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TriageError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.classifier.timeout_secs == 0 {
            return Err(TriageError::ConfigError(
                "classifier.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.classifier.model.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "classifier.model cannot be empty".to_string(),
            ));
        }
        if !self.classifier.base_url.starts_with("http://")
            && !self.classifier.base_url.starts_with("https://")
        {
            return Err(TriageError::ConfigError(format!(
                "classifier.base_url must be an http(s) URL, got '{}'",
                self.classifier.base_url
            )));
        }

        if self.oauth.scopes.is_empty() {
            return Err(TriageError::ConfigError(
                "oauth.scopes must name at least one scope".to_string(),
            ));
        }
        if self.oauth.token_file.as_os_str().is_empty() {
            return Err(TriageError::ConfigError(
                "oauth.token_file cannot be empty".to_string(),
            ));
        }

        if self.mail.default_max_results == 0 || self.mail.default_max_results > MAX_LIST_RESULTS {
            return Err(TriageError::ConfigError(format!(
                "mail.default_max_results must be between 1 and {}",
                MAX_LIST_RESULTS
            )));
        }
        // Stay well under the per-user Gmail quota
        if self.mail.max_concurrent_requests == 0 || self.mail.max_concurrent_requests > 50 {
            return Err(TriageError::ConfigError(
                "mail.max_concurrent_requests must be between 1 and 50".to_string(),
            ));
        }
        if self.mail.request_timeout_secs == 0 {
            return Err(TriageError::ConfigError(
                "mail.request_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.classifier.model, "gemini-1.5-flash");
        assert_eq!(config.classifier.timeout_secs, 20);
        assert!(!config.classifier.strict_labels);
        assert_eq!(
            config.oauth.scopes,
            vec!["https://www.googleapis.com/auth/gmail.readonly".to_string()]
        );
        assert_eq!(config.oauth.token_file, PathBuf::from("token.json"));
        assert_eq!(config.oauth.redirect_port, 8080);
        assert_eq!(config.mail.default_max_results, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint() {
        let mut config = ClassifierConfig::default();
        config.base_url = "http://127.0.0.1:9000/".to_string();
        config.model = "gemini-pro".to_string();
        assert_eq!(
            config.endpoint(),
            "http://127.0.0.1:9000/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(&temp_dir.path().join("missing.toml")).await.unwrap();
        assert_eq!(config.mail.max_concurrent_requests, 5);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("zenbox.toml");

        let mut config = Config::default();
        config.classifier.strict_labels = true;
        config.mail.default_max_results = 25;
        config.save(&path).await.unwrap();

        let loaded = Config::load(&path).await.unwrap();
        assert!(loaded.classifier.strict_labels);
        assert_eq!(loaded.mail.default_max_results, 25);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("zenbox.toml");
        tokio::fs::write(&path, "[classifier]\nmodel = \"gemini-2.0-flash\"\n")
            .await
            .unwrap();

        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.classifier.model, "gemini-2.0-flash");
        assert_eq!(config.classifier.timeout_secs, 20);
        assert_eq!(config.oauth.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[tokio::test]
    async fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("zenbox.toml");
        tokio::fs::write(&path, "[mail]\nmax_concurrent_requests = 0\n")
            .await
            .unwrap();

        let result = Config::load(&path).await;
        assert!(matches!(result, Err(TriageError::ConfigError(_))));

        tokio::fs::write(&path, "not = [valid").await.unwrap();
        assert!(matches!(
            Config::load(&path).await,
            Err(TriageError::ConfigError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.classifier.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.oauth.scopes.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.mail.default_max_results = 501;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.classifier.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("GEMINI_API_KEY", "key-123"),
            ("GEMINI_MODEL", "gemini-pro"),
            ("GOOGLE_CLIENT_ID", "client"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            (
                "GMAIL_SCOPES",
                "https://www.googleapis.com/auth/gmail.readonly, https://www.googleapis.com/auth/gmail.metadata",
            ),
            ("TOKEN_FILE", "/tmp/zenbox/token.json"),
            ("CREDENTIALS_FILE", "   "),
        ]);

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.classifier.api_key, "key-123");
        assert_eq!(config.classifier.model, "gemini-pro");
        assert_eq!(config.oauth.inline_client(), Some(("client", "secret")));
        assert_eq!(config.oauth.scopes.len(), 2);
        assert_eq!(config.oauth.token_file, PathBuf::from("/tmp/zenbox/token.json"));
        // Blank values leave the default in place
        assert_eq!(config.oauth.credentials_file, PathBuf::from("credentials.json"));
    }

    #[test]
    fn test_inline_client_requires_both_halves() {
        let mut oauth = OAuthConfig::default();
        assert!(oauth.inline_client().is_none());
        oauth.client_id = "id".to_string();
        assert!(oauth.inline_client().is_none());
        oauth.client_secret = "secret".to_string();
        assert_eq!(oauth.inline_client(), Some(("id", "secret")));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_load_with_env() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var("GEMINI_API_KEY", "from-env");
        let config = Config::load_with_env(&temp_dir.path().join("none.toml"))
            .await
            .unwrap();
        std::env::remove_var("GEMINI_API_KEY");

        assert_eq!(config.classifier.api_key, "from-env");
    }
}
