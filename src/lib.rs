//! ZenBox email triage
//!
//! Classifies email into categories and statuses with a remote language model,
//! falling back to deterministic keyword rules, and fetches Gmail messages on
//! behalf of one user through delegated OAuth credentials.
//!
//! # Overview
//!
//! - **Classification**: [`pipeline::ClassificationPipeline`] calls the remote
//!   classifier with a bounded timeout and never fails outward; any transport,
//!   status or payload problem degrades to [`classifier::classify_by_rules`].
//! - **Credentials**: [`credentials::CredentialManager`] loads the persisted
//!   token, refreshes it or runs the consent flow when needed, and persists the
//!   result, one refresh at a time per token location.
//! - **Mail**: [`fetcher::MailFetcher`] lists and reads messages with a fresh
//!   credential and projects them into [`models::EmailSummary`].
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use zenbox_triage::{
//!     auth::{InstalledFlowAuthorizer, OAuthRefresher},
//!     client::GmailMailProvider,
//!     config::Config,
//!     credentials::CredentialManager,
//!     fetcher::MailFetcher,
//!     models::ClassificationRequest,
//!     pipeline::ClassificationPipeline,
//!     token_store::FileCredentialStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_with_env("zenbox.toml".as_ref()).await?;
//!
//!     let pipeline = ClassificationPipeline::from_config(&config.classifier);
//!     let result = pipeline
//!         .classify(&ClassificationRequest::new("Summer internship", ""))
//!         .await;
//!     println!("{} / {} ({})", result.category, result.status, result.confidence);
//!
//!     let manager = CredentialManager::new(
//!         Arc::new(FileCredentialStore::new(&config.oauth.token_file)),
//!         Arc::new(OAuthRefresher::new(&config.oauth)?),
//!         Some(Arc::new(InstalledFlowAuthorizer::new(&config.oauth))),
//!         config.oauth.scopes.clone(),
//!     );
//!     let provider = GmailMailProvider::new(config.mail.request_timeout())?;
//!     let fetcher = MailFetcher::new(
//!         Arc::new(manager),
//!         Arc::new(provider),
//!         config.mail.max_concurrent_requests,
//!     );
//!     for email in fetcher.list_emails(5).await? {
//!         println!("{}: {}", email.sender, email.subject);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - Refresh-token exchange and the interactive consent flow
//! - [`classifier`] - Keyword rule engine
//! - [`cli`] - Command-line interface
//! - [`client`] - Gmail API adapter behind the `MailProvider` trait
//! - [`config`] - Configuration management
//! - [`credentials`] - Credential lifecycle manager
//! - [`error`] - Error types and result aliases
//! - [`fetcher`] - Message listing and projection
//! - [`gemini`] - Remote classifier client
//! - [`models`] - Core data structures
//! - [`pipeline`] - Classification pipeline with fallback
//! - [`token_store`] - Credential persistence

pub mod auth;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod fetcher;
pub mod gemini;
pub mod models;
pub mod pipeline;
pub mod token_store;

// Re-export commonly used types for convenience
pub use error::{Result, TriageError};

// Core data models
pub use models::{
    ClassificationRequest, ClassificationResult, Credential, EmailCategory, EmailStatus,
    EmailSummary, TokenGrant,
};

// Classification
pub use classifier::classify_by_rules;
pub use gemini::{ClassifierClient, GeminiClient};
pub use pipeline::ClassificationPipeline;

// Credentials
pub use auth::{InstalledFlowAuthorizer, InteractiveAuthorizer, OAuthRefresher, TokenRefresher};
pub use credentials::CredentialManager;
pub use token_store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

// Mail
pub use client::{GmailMailProvider, MailProvider};
pub use fetcher::MailFetcher;

// Config types
pub use config::{ClassifierConfig, Config, MailConfig, OAuthConfig};

// CLI types (for binary usage)
pub use cli::{Cli, Commands};
