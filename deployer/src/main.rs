//! Deployer - Entry Point
//!
//! Builds configured web projects, uploads their output to a hosting provider
//! and follows each remote deployment until it is live.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use colored::Colorize;
use secrecy::SecretString;
use tracing::{error, info, warn};

use deployer::app::options::AppOptions;
use deployer::app::run::{deploy_once, run};
use deployer::filesys::file::File;
use deployer::logs::{init_logging, LogOptions};
use deployer::models::deployment::{DeploymentRecord, RecordStatus};
use deployer::storage::history::{DeploymentHistory, JsonFileHistoryStore};
use deployer::storage::layout::StorageLayout;
use deployer::storage::settings::Settings;
use deployer::utils::version_info;

/// Environment variable holding the provider token
const TOKEN_ENV: &str = "DEPLOYER_TOKEN";

const USAGE: &str = "\
Usage: deployer [--settings=<path>] <command>

Commands:
  --deploy=<project>   Build and deploy a project, then wait until it is live
  --serve              Run the local status server
  --history            List past deployments
  --remove=<id>        Delete a history record
  --version            Print version information

The provider token is read from --token=<token> or DEPLOYER_TOKEN.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version_info())?);
        return Ok(());
    }

    let layout = StorageLayout::default();
    layout
        .setup()
        .await
        .with_context(|| format!("Unable to prepare {}", layout.base_dir.display()))?;

    // Retrieve the settings file
    let settings_file = match cli_args.get("settings") {
        Some(path) => File::new(path),
        None => layout.settings_file(),
    };
    let settings = Settings::load(&settings_file).await?;

    // Listing commands keep stdout for their own output
    let listing = cli_args.contains_key("history") || cli_args.contains_key("remove");
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        stdout: !listing,
        log_dir: Some(layout.logs_dir().path().to_path_buf()),
        json_format: settings.json_logs,
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    if cli_args.contains_key("history") {
        let history = open_history(&layout).await?;
        print_history(&history.list());
        return Ok(());
    }

    if let Some(id) = cli_args.get("remove") {
        let history = open_history(&layout).await?;
        history.remove(id).await?;
        println!("Removed {}", id);
        return Ok(());
    }

    let options = AppOptions::from_settings(layout, &settings);

    if let Some(project) = cli_args.get("deploy") {
        let credential = provider_token(&cli_args)?;
        info!("Running deployer with options: {:?}", options);

        return match deploy_once(&options, credential, project, await_shutdown_signal()).await {
            Ok(result) => {
                println!("{} {}", "Deployed".green().bold(), result.url);
                Ok(())
            }
            Err(e) => {
                error!("Deployment of {} failed: {}", project, e);
                Err(anyhow!("{} {}", "Deployment failed:".red().bold(), e))
            }
        };
    }

    if cli_args.contains_key("serve") {
        let credential = provider_token(&cli_args)?;
        info!("Running deployer with options: {:?}", options);
        run(options, credential, await_shutdown_signal()).await?;
        return Ok(());
    }

    println!("{}", USAGE);
    Ok(())
}

fn provider_token(cli_args: &HashMap<String, String>) -> anyhow::Result<SecretString> {
    cli_args
        .get("token")
        .cloned()
        .or_else(|| env::var(TOKEN_ENV).ok())
        .filter(|token| !token.trim().is_empty())
        .map(SecretString::from)
        .with_context(|| format!("Provider token missing: pass --token=<token> or set {}", TOKEN_ENV))
}

async fn open_history(layout: &StorageLayout) -> anyhow::Result<DeploymentHistory> {
    let store = Arc::new(JsonFileHistoryStore::new(layout.history_file()));
    Ok(DeploymentHistory::open(store).await?)
}

fn print_history(records: &[DeploymentRecord]) {
    if records.is_empty() {
        println!("No deployments yet");
        return;
    }

    for record in records {
        let status = match record.status {
            RecordStatus::Success => record.status.to_string().green(),
            RecordStatus::Failed => record.status.to_string().red(),
            RecordStatus::InProgress => record.status.to_string().yellow(),
        };
        let detail = record
            .url
            .as_deref()
            .or(record.error.as_deref())
            .unwrap_or("");

        println!(
            "{}  {}  {}  {}  {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.id.dimmed(),
            status,
            record.name.bold(),
            detail
        );
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, shutting down...");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Ctrl+C received, shutting down...");
                    }
                }
            }
            Err(e) => {
                warn!("Unable to listen for SIGTERM: {}", e);
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Ctrl+C received, shutting down..."),
                    Err(e) => {
                        warn!("Unable to listen for Ctrl+C: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received, shutting down..."),
            Err(e) => {
                warn!("Unable to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}
