//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hosting_api::{CreateDeployRequest, CreateSiteRequest, Deploy, RemoteState, Site};
use secrecy::SecretString;
use tokio::sync::Semaphore;

use deployer::app::state::AppState;
use deployer::deploy::build::{BuildAction, BuildExecutor, BuildOutput};
use deployer::deploy::pipeline::{DeployPipeline, PipelineOptions};
use deployer::errors::DeployError;
use deployer::filesys::dir::Dir;
use deployer::http::provider::HostingProvider;
use deployer::models::deployment::Provider;
use deployer::storage::history::DeploymentHistory;
use deployer::storage::settings::ProjectSettings;
use deployer::storage::sites::SiteRegistry;
use deployer::workers::poller;

pub fn token() -> SecretString {
    SecretString::from("test-token".to_string())
}

/// Builds answer from a script; an exhausted script succeeds
#[derive(Default)]
pub struct FakeBuild {
    script: Mutex<VecDeque<Result<BuildOutput, DeployError>>>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicU32,
}

impl FakeBuild {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every build waits for a permit on `gate` before answering
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn push(&self, result: Result<BuildOutput, DeployError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn exits(&self, exit_code: i32, output: &str) {
        self.push(Ok(BuildOutput {
            exit_code,
            output: output.to_string(),
        }));
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildExecutor for FakeBuild {
    async fn add_action(&self, _action: &BuildAction) -> Result<(), DeployError> {
        Ok(())
    }

    async fn run_action(&self, _action: &BuildAction) -> Result<BuildOutput, DeployError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(BuildOutput {
                exit_code: 0,
                output: "built".to_string(),
            })
        })
    }
}

/// Provider with scripted deploy creation and status answers.
///
/// Unscripted deploy creations succeed with deploy `d1`; unscripted status
/// checks report `building`.
pub struct FakeProvider {
    pub site_id: String,
    sites: Mutex<Vec<Site>>,
    deploys: Mutex<VecDeque<Result<Deploy, DeployError>>>,
    statuses: Mutex<VecDeque<Result<Deploy, DeployError>>>,
    uploaded_paths: Mutex<Vec<String>>,
    create_site_calls: AtomicU32,
    create_deploy_calls: AtomicU32,
    get_calls: AtomicU32,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            site_id: "s1".to_string(),
            sites: Mutex::new(Vec::new()),
            deploys: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            uploaded_paths: Mutex::new(Vec::new()),
            create_site_calls: AtomicU32::new(0),
            create_deploy_calls: AtomicU32::new(0),
            get_calls: AtomicU32::new(0),
        }
    }

    pub fn push_deploy(&self, result: Result<Deploy, DeployError>) {
        self.deploys.lock().unwrap().push_back(result);
    }

    pub fn push_status(&self, result: Result<Deploy, DeployError>) {
        self.statuses.lock().unwrap().push_back(result);
    }

    pub fn push_states(&self, states: &[&str]) {
        for state in states {
            self.push_status(Ok(remote(state, None)));
        }
    }

    pub fn uploaded_paths(&self) -> Vec<String> {
        self.uploaded_paths.lock().unwrap().clone()
    }

    pub fn create_site_calls(&self) -> u32 {
        self.create_site_calls.load(Ordering::SeqCst)
    }

    pub fn create_deploy_calls(&self) -> u32 {
        self.create_deploy_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }
}

/// A remote deploy in `state`
pub fn remote(state: &str, ssl_url: Option<&str>) -> Deploy {
    Deploy {
        id: "d1".to_string(),
        site_id: Some("s1".to_string()),
        state: RemoteState::from(state),
        ssl_url: ssl_url.map(str::to_string),
        ..Default::default()
    }
}

#[async_trait]
impl HostingProvider for FakeProvider {
    async fn list_sites(&self, _credential: &SecretString) -> Result<Vec<Site>, DeployError> {
        Ok(self.sites.lock().unwrap().clone())
    }

    async fn create_site(
        &self,
        _credential: &SecretString,
        request: &CreateSiteRequest,
    ) -> Result<Site, DeployError> {
        self.create_site_calls.fetch_add(1, Ordering::SeqCst);
        let site = Site {
            id: self.site_id.clone(),
            name: request.name.clone(),
            ..Default::default()
        };
        self.sites.lock().unwrap().push(site.clone());
        Ok(site)
    }

    async fn create_deploy(
        &self,
        _credential: &SecretString,
        _site_id: &str,
        request: &CreateDeployRequest,
    ) -> Result<Deploy, DeployError> {
        self.create_deploy_calls.fetch_add(1, Ordering::SeqCst);
        *self.uploaded_paths.lock().unwrap() = request.files.keys().cloned().collect();
        let next = self.deploys.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(remote("uploading", None)))
    }

    async fn get_deploy(
        &self,
        _credential: &SecretString,
        _site_id: &str,
        _deploy_id: &str,
    ) -> Result<Deploy, DeployError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(remote("building", None)))
    }
}

/// Pipeline options that never wait between status checks
pub fn fast_options() -> PipelineOptions {
    PipelineOptions {
        provider: Provider::Netlify,
        poller: poller::Options {
            max_attempts: 20,
            interval: Duration::ZERO,
            error_interval: Duration::ZERO,
        },
    }
}

/// A project on disk with its collaborators
pub struct Harness {
    pub root: Dir,
    pub project: ProjectSettings,
    pub build: Arc<FakeBuild>,
    pub provider: Arc<FakeProvider>,
    pub sites: Arc<SiteRegistry>,
    pub history: Arc<DeploymentHistory>,
}

impl Harness {
    pub async fn new(name: &str) -> Self {
        Self::with_build(name, FakeBuild::new()).await
    }

    pub async fn with_build(name: &str, build: FakeBuild) -> Self {
        let root = Dir::create_temp_dir("deployer-it").await.unwrap();
        let project_dir = root.subdir(name);
        project_dir.subdir("dist/assets").create().await.unwrap();
        project_dir
            .file("dist/index.html")
            .write_atomic(b"<!doctype html><h1>hello</h1>")
            .await
            .unwrap();
        project_dir
            .file("dist/assets/app.js")
            .write_atomic(b"console.log('hello')")
            .await
            .unwrap();

        let project = ProjectSettings {
            name: name.to_string(),
            path: project_dir.path().to_path_buf(),
            build_command: "npm run build".to_string(),
            output_dir: PathBuf::from("dist"),
            custom_domain: None,
        };

        Self {
            sites: Arc::new(SiteRegistry::new(root.file("sites.json"))),
            root,
            project,
            build: Arc::new(build),
            provider: Arc::new(FakeProvider::new()),
            history: Arc::new(DeploymentHistory::in_memory().await.unwrap()),
        }
    }

    pub fn pipeline(&self) -> Arc<DeployPipeline> {
        self.pipeline_with_history(self.history.clone())
    }

    /// Pipeline over the harness fakes, recording into `history`
    pub fn pipeline_with_history(&self, history: Arc<DeploymentHistory>) -> Arc<DeployPipeline> {
        Arc::new(DeployPipeline::new(
            self.project.clone(),
            fast_options(),
            self.build.clone(),
            self.provider.clone(),
            self.sites.clone(),
            history,
        ))
    }

    pub fn app_state(&self) -> AppState {
        AppState::from_parts(
            std::slice::from_ref(&self.project),
            fast_options(),
            self.build.clone(),
            self.provider.clone(),
            self.sites.clone(),
            self.history.clone(),
        )
    }

    pub async fn cleanup(self) {
        self.root.delete().await.unwrap();
    }
}
