use anyhow::Result;
use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;
use zenbox_triage::cli::{self, Cli, Commands};
use zenbox_triage::config::Config;

#[tokio::main]
async fn main() {
    // Exit with proper code on error
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        eprintln!("\nFor help, run: zenbox --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Install default crypto provider for rustls
    // This is necessary because multiple dependencies use different crypto providers
    // On non-Windows platforms, use aws-lc-rs (better performance, FIPS support)
    // On Windows, use ring (better compatibility, no NASM/CMake required)
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    // Pick up GEMINI_API_KEY and friends from a local .env, real env vars win
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("zenbox_triage=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("zenbox_triage=info,warn"))
    };

    // Logs go to stderr so command output on stdout stays machine-readable
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::InitConfig { output, force } => {
            cli::run_init_config(&output, force).await?;
        }
        Commands::Auth { force } => {
            let config = Config::load_with_env(&cli.config).await?;
            tracing::info!("Authenticating with Gmail API...");
            cli::run_auth(&config, force).await?;
        }
        Commands::Classify {
            subject,
            body,
            json,
        } => {
            let config = Config::load_with_env(&cli.config).await?;
            cli::run_classify(&config, subject, body, json).await?;
        }
        Commands::Emails { max_results, json } => {
            let config = Config::load_with_env(&cli.config).await?;
            cli::run_emails(&config, max_results, json).await?;
        }
    }

    Ok(())
}
