//! Application configuration options

use std::time::Duration;

use crate::deploy::pipeline::PipelineOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{ProjectSettings, Settings};
use crate::workers::poller;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Storage layout paths
    pub layout: StorageLayout,

    /// Hosting provider API base URL
    pub provider_base_url: String,

    /// Timeout for a single provider request
    pub request_timeout: Duration,

    /// Pipeline configuration shared by all projects
    pub pipeline: PipelineOptions,

    /// Deployable projects
    pub projects: Vec<ProjectSettings>,

    /// Server configuration
    pub server: ServerOptions,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            layout: StorageLayout::default(),
            provider_base_url: "https://api.netlify.com/api/v1".to_string(),
            request_timeout: Duration::from_secs(30),
            pipeline: PipelineOptions::default(),
            projects: Vec::new(),
            server: ServerOptions::default(),
            max_shutdown_delay: Duration::from_secs(10),
        }
    }
}

impl AppOptions {
    /// Runtime options for a settings file found in `layout`
    pub fn from_settings(layout: StorageLayout, settings: &Settings) -> Self {
        Self {
            layout,
            provider_base_url: settings.provider.base_url.clone(),
            request_timeout: Duration::from_secs(settings.provider.request_timeout_secs),
            pipeline: PipelineOptions {
                provider: settings.provider.kind,
                poller: poller::Options {
                    max_attempts: settings.poller.max_attempts,
                    interval: Duration::from_millis(settings.poller.interval_ms),
                    error_interval: Duration::from_millis(settings.poller.error_interval_ms),
                },
            },
            projects: settings.projects.clone(),
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            ..Default::default()
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}
