//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::auth::{InstalledFlowAuthorizer, OAuthRefresher};
use crate::client::GmailMailProvider;
use crate::config::Config;
use crate::credentials::CredentialManager;
use crate::error::{Result, TriageError};
use crate::fetcher::MailFetcher;
use crate::models::{ClassificationRequest, ClassificationResult, EmailSummary};
use crate::pipeline::ClassificationPipeline;
use crate::token_store::FileCredentialStore;

#[derive(Parser, Debug)]
#[command(name = "zenbox")]
#[command(version)]
#[command(about = "Email triage with AI classification and Gmail fetching", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "zenbox.toml")]
    pub config: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or refresh the Gmail token file
    Auth {
        /// Run the consent flow even if a usable token exists
        #[arg(long)]
        force: bool,
    },

    /// Classify a single message
    Classify {
        #[arg(short, long, default_value = "")]
        subject: String,

        #[arg(short, long, default_value = "")]
        body: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent messages from the mailbox
    Emails {
        /// Number of messages to fetch (defaults to mail.default_max_results)
        #[arg(short = 'n', long)]
        max_results: Option<u32>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "zenbox.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Credential manager backed by the configured token file and OAuth client
pub fn build_credential_manager(config: &Config) -> Result<CredentialManager> {
    let store = FileCredentialStore::new(&config.oauth.token_file);
    let refresher = OAuthRefresher::new(&config.oauth)?;
    let authorizer = InstalledFlowAuthorizer::new(&config.oauth);

    Ok(CredentialManager::new(
        Arc::new(store),
        Arc::new(refresher),
        Some(Arc::new(authorizer)),
        config.oauth.scopes.clone(),
    ))
}

pub async fn run_auth(config: &Config, force: bool) -> Result<()> {
    let manager = build_credential_manager(config)?;
    let credential = if force {
        manager.reauthorize().await?
    } else {
        manager.obtain_valid_credential().await?
    };

    info!(
        "Token ready (expires: {})",
        credential
            .expiry
            .map(|e| e.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string())
    );
    println!("Saved token to {}", config.oauth.token_file.display());
    Ok(())
}

pub async fn run_classify(config: &Config, subject: String, body: String, json: bool) -> Result<()> {
    let pipeline = ClassificationPipeline::from_config(&config.classifier);
    let result = pipeline
        .classify(&ClassificationRequest { subject, body })
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", format_classification(&result));
    }
    Ok(())
}

pub async fn run_emails(config: &Config, max_results: Option<u32>, json: bool) -> Result<()> {
    let manager = build_credential_manager(config)?;
    let provider = GmailMailProvider::new(config.mail.request_timeout())?;
    let fetcher = MailFetcher::new(
        Arc::new(manager),
        Arc::new(provider),
        config.mail.max_concurrent_requests,
    );

    let emails = fetcher
        .list_emails(max_results.unwrap_or(config.mail.default_max_results))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&emails)?);
    } else {
        for email in &emails {
            println!("{}", format_email(email));
        }
    }
    Ok(())
}

pub async fn run_init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(TriageError::ConfigError(format!(
            "{} already exists (use --force to overwrite)",
            output.display()
        )));
    }

    Config::default().save(output).await?;
    println!("Wrote example configuration to {}", output.display());
    Ok(())
}

fn format_classification(result: &ClassificationResult) -> String {
    format!(
        "category: {}\nstatus: {}\nconfidence: {:.2}",
        result.category, result.status, result.confidence
    )
}

/// Truncate a string to max_len characters, adding "..." if truncated
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len.saturating_sub(3)).collect::<String>())
    }
}

fn format_email(email: &EmailSummary) -> String {
    format!(
        "{:<40}  {}\n    {}",
        truncate_string(&email.sender, 40),
        email.subject,
        truncate_string(&email.snippet, 100)
    )
}
