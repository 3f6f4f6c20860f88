//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::models::deployment::Provider;

/// Deployer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Write logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Hosting provider configuration
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Deployment status polling
    #[serde(default)]
    pub poller: PollerSettings,

    /// Local status server
    #[serde(default)]
    pub server: ServerSettings,

    /// Deployable projects
    #[serde(default)]
    pub projects: Vec<ProjectSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            provider: ProviderSettings::default(),
            poller: PollerSettings::default(),
            server: ServerSettings::default(),
            projects: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings, using defaults when the file does not exist
    pub async fn load(file: &File) -> Result<Self, DeployError> {
        let settings: Settings = file.read_json_or_default().await.map_err(|e| {
            DeployError::ConfigError(format!(
                "Unable to read settings file {}: {}",
                file.path().display(),
                e
            ))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.poller.max_attempts == 0 {
            return Err(DeployError::ConfigError(
                "poller.max_attempts must be at least 1".to_string(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for project in &self.projects {
            if project.name.trim().is_empty() {
                return Err(DeployError::ConfigError("project name is empty".to_string()));
            }
            if !names.insert(project.name.as_str()) {
                return Err(DeployError::ConfigError(format!(
                    "duplicate project name: {}",
                    project.name
                )));
            }
        }
        Ok(())
    }

    /// Find a project by name
    pub fn project(&self, name: &str) -> Option<&ProjectSettings> {
        self.projects.iter().find(|p| p.name == name)
    }
}

/// Hosting provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider recorded in history
    #[serde(default)]
    pub kind: Provider,

    /// Base URL for the provider API
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_provider_url() -> String {
    "https://api.netlify.com/api/v1".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: Provider::Netlify,
            base_url: default_provider_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Status polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerSettings {
    /// Status checks before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after a non-terminal status, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Delay after a failed status request, in milliseconds
    #[serde(default = "default_error_interval_ms")]
    pub error_interval_ms: u64,
}

fn default_max_attempts() -> u32 {
    20
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_error_interval_ms() -> u64 {
    2000
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
            error_interval_ms: default_error_interval_ms(),
        }
    }
}

/// Local server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// A deployable project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Unique project name, also used to derive the site name
    pub name: String,

    /// Project root
    pub path: PathBuf,

    /// Build command run in the project root
    #[serde(default = "default_build_command")]
    pub build_command: String,

    /// Build output directory, relative to the project root
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Custom domain requested when the site is created
    #[serde(default)]
    pub custom_domain: Option<String>,
}

fn default_build_command() -> String {
    "npm run build".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}
