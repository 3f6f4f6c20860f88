//! Application state management

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::build::{BuildExecutor, CommandBuildExecutor};
use crate::deploy::pipeline::{DeployPipeline, PipelineOptions};
use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::http::provider::HostingProvider;
use crate::storage::history::{DeploymentHistory, JsonFileHistoryStore};
use crate::storage::settings::ProjectSettings;
use crate::storage::sites::SiteRegistry;

/// Main application state
pub struct AppState {
    /// Deployment history shared by every pipeline
    pub history: Arc<DeploymentHistory>,

    pipelines: BTreeMap<String, Arc<DeployPipeline>>,
}

impl AppState {
    /// Initialize application state from the configured storage and provider
    pub async fn init(options: &AppOptions) -> Result<Self, DeployError> {
        info!("Initializing application state...");

        options.layout.setup().await?;

        let provider = Arc::new(HttpClient::with_timeout(
            &options.provider_base_url,
            options.request_timeout,
        )?);
        let history_store = Arc::new(JsonFileHistoryStore::new(options.layout.history_file()));
        let history = Arc::new(DeploymentHistory::open(history_store).await?);
        let sites = Arc::new(SiteRegistry::new(options.layout.sites_file()));

        Ok(Self::from_parts(
            &options.projects,
            options.pipeline.clone(),
            Arc::new(CommandBuildExecutor::new()),
            provider,
            sites,
            history,
        ))
    }

    /// Assemble state around explicit collaborators
    pub fn from_parts(
        projects: &[ProjectSettings],
        pipeline_options: PipelineOptions,
        executor: Arc<dyn BuildExecutor>,
        provider: Arc<dyn HostingProvider>,
        sites: Arc<SiteRegistry>,
        history: Arc<DeploymentHistory>,
    ) -> Self {
        let pipelines = projects
            .iter()
            .map(|project| {
                let pipeline = DeployPipeline::new(
                    project.clone(),
                    pipeline_options.clone(),
                    executor.clone(),
                    provider.clone(),
                    sites.clone(),
                    history.clone(),
                );
                (project.name.clone(), Arc::new(pipeline))
            })
            .collect::<BTreeMap<_, _>>();

        info!("Loaded {} projects", pipelines.len());
        Self {
            history,
            pipelines,
        }
    }

    /// Pipeline for a project
    pub fn pipeline(&self, name: &str) -> Result<Arc<DeployPipeline>, DeployError> {
        self.pipelines
            .get(name)
            .cloned()
            .ok_or_else(|| DeployError::NotFound(format!("project {}", name)))
    }

    /// All pipelines, ordered by project name
    pub fn pipelines(&self) -> impl Iterator<Item = &Arc<DeployPipeline>> {
        self.pipelines.values()
    }

    /// Cancel whatever is still in flight
    pub fn shutdown(&self) {
        info!("Shutting down application state...");
        for pipeline in self.pipelines.values() {
            pipeline.cancel();
        }
    }
}
