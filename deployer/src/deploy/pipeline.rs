//! Deployment pipeline
//!
//! Drives one project's deployment attempts: build, upload, poll, finalize.
//! Every attempt ends in exactly one terminal phase, one state write and one
//! history record.

use std::sync::{Arc, Mutex};

use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::deploy::build::{BuildAction, BuildExecutor};
use crate::deploy::classifier::classify;
use crate::deploy::fsm::{PipelineEvent, PipelineFsm, PipelinePhase};
use crate::deploy::state::{DeploymentState, StateReader, StateStore};
use crate::deploy::uploader::{collect_artifacts, ArtifactUploader};
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::http::provider::HostingProvider;
use crate::models::build::BuildError;
use crate::models::deployment::{NewDeploymentRecord, Provider};
use crate::storage::history::DeploymentHistory;
use crate::storage::settings::ProjectSettings;
use crate::storage::sites::SiteRegistry;
use crate::workers::poller;

/// Pipeline options
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Provider recorded in history
    pub provider: Provider,

    /// Status polling budget and intervals
    pub poller: poller::Options,
}

/// A live deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    pub url: String,
    pub site_id: String,
    pub deploy_id: String,
}

/// How an attempt ended, before it is finalized
enum Outcome {
    Succeeded {
        result: DeployResult,
        digest: String,
    },
    BuildFailed(BuildError),
    UploadFailed(DeployError),
    PollFailed {
        error: DeployError,
        site_id: String,
        deploy_id: String,
    },
    Cancelled,
}

/// Deployment pipeline for a single project
pub struct DeployPipeline {
    project: ProjectSettings,
    options: PipelineOptions,
    fsm: RwLock<PipelineFsm>,
    state: StateStore,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
    executor: Arc<dyn BuildExecutor>,
    provider: Arc<dyn HostingProvider>,
    uploader: ArtifactUploader,
    history: Arc<DeploymentHistory>,
}

impl DeployPipeline {
    pub fn new(
        project: ProjectSettings,
        options: PipelineOptions,
        executor: Arc<dyn BuildExecutor>,
        provider: Arc<dyn HostingProvider>,
        sites: Arc<SiteRegistry>,
        history: Arc<DeploymentHistory>,
    ) -> Self {
        let uploader = ArtifactUploader::new(provider.clone(), sites);
        Self {
            project,
            options,
            fsm: RwLock::new(PipelineFsm::new()),
            state: StateStore::new(),
            cancel: Mutex::new(None),
            executor,
            provider,
            uploader,
            history,
        }
    }

    pub fn project(&self) -> &ProjectSettings {
        &self.project
    }

    /// Current deployment state
    pub fn state(&self) -> DeploymentState {
        self.state.snapshot()
    }

    /// Subscribe to state changes
    pub fn reader(&self) -> StateReader {
        self.state.reader()
    }

    pub fn is_deploying(&self) -> bool {
        self.state.snapshot().is_deploying
    }

    /// Phase as tracked by the state machine
    pub async fn phase(&self) -> PipelinePhase {
        self.fsm.read().await.phase()
    }

    /// Number of attempts started so far
    pub async fn attempts(&self) -> u32 {
        self.fsm.read().await.attempts()
    }

    /// Run one deployment attempt and wait for its outcome.
    ///
    /// Fails with [`DeployError::AlreadyDeploying`], without touching state or
    /// history, while another attempt for this project is in flight. The
    /// attempt runs on its own task, so dropping this future leaves it running
    /// to its terminal phase; use [`DeployPipeline::cancel`] to stop it.
    pub async fn deploy(
        self: &Arc<Self>,
        credential: &SecretString,
    ) -> Result<DeployResult, DeployError> {
        let handle = self.spawn(credential.clone())?;
        handle
            .await
            .map_err(|e| DeployError::Internal(format!("deployment task failed: {}", e)))?
    }

    /// Claim the project and run the attempt on a background task.
    ///
    /// The in-flight check happens before this returns, so callers learn
    /// about a conflict immediately.
    pub fn spawn(
        self: &Arc<Self>,
        credential: SecretString,
    ) -> Result<JoinHandle<Result<DeployResult, DeployError>>, DeployError> {
        let cancelled = self.begin()?;
        let pipeline = self.clone();
        Ok(tokio::spawn(async move {
            pipeline.attempt(&credential, cancelled).await
        }))
    }

    async fn attempt(
        &self,
        credential: &SecretString,
        cancelled: oneshot::Receiver<()>,
    ) -> Result<DeployResult, DeployError> {
        self.transition(PipelineEvent::Start).await;
        info!("Deploying {}", self.project.name);

        let outcome = tokio::select! {
            outcome = self.run(credential) => outcome,
            Ok(()) = cancelled => Outcome::Cancelled,
        };

        self.finalize(outcome).await
    }

    /// Stop tracking the in-flight attempt. Returns false when nothing was running.
    ///
    /// A deploy already submitted to the provider is not withdrawn.
    pub fn cancel(&self) -> bool {
        let mut slot = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        match slot.take() {
            Some(tx) => {
                info!("Cancelling deployment of {}", self.project.name);
                tx.send(()).is_ok()
            }
            None => false,
        }
    }

    /// Claim the state slot and arm cancellation, as one step
    fn begin(&self) -> Result<oneshot::Receiver<()>, DeployError> {
        let mut slot = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        if !self.state.try_begin() {
            warn!("Deployment of {} already in progress", self.project.name);
            return Err(DeployError::AlreadyDeploying(self.project.name.clone()));
        }
        let (tx, rx) = oneshot::channel();
        *slot = Some(tx);
        Ok(rx)
    }

    async fn transition(&self, event: PipelineEvent) -> PipelinePhase {
        let mut fsm = self.fsm.write().await;
        let phase = match fsm.process(event) {
            Ok(phase) => phase,
            Err(e) => {
                error!("Deployment of {}: {}", self.project.name, e);
                fsm.abort(e)
            }
        };
        match fsm.error() {
            Some(reason) => info!("Deployment of {} is {:?}: {}", self.project.name, phase, reason),
            None => info!("Deployment of {} is {:?}", self.project.name, phase),
        }
        phase
    }

    async fn enter(&self, event: PipelineEvent, state: DeploymentState) {
        self.transition(event).await;
        self.state.set(state);
    }

    async fn run(&self, credential: &SecretString) -> Outcome {
        if let Err(build_error) = self.build().await {
            return Outcome::BuildFailed(build_error);
        }
        self.enter(PipelineEvent::BuildSucceeded, DeploymentState::build_ready())
            .await;

        let uploading = self.state.snapshot().in_phase(PipelinePhase::Uploading);
        self.enter(PipelineEvent::Upload, uploading).await;

        let output = Dir::new(self.project.path.join(&self.project.output_dir));
        let artifacts = match collect_artifacts(&output).await {
            Ok(artifacts) if artifacts.is_empty() => {
                return Outcome::UploadFailed(DeployError::UploadError(format!(
                    "Build output {} is empty",
                    output.path().display()
                )))
            }
            Ok(artifacts) => artifacts,
            Err(e) => return Outcome::UploadFailed(e),
        };
        let digest = artifacts.digest.clone();

        let uploaded = match self.uploader.upload(credential, &self.project, artifacts).await {
            Ok(uploaded) => uploaded,
            Err(e) => return Outcome::UploadFailed(e),
        };

        let polling = self.state.snapshot().in_phase(PipelinePhase::Polling);
        self.enter(PipelineEvent::Uploaded, polling).await;

        let site_id = uploaded.site_id;
        let deploy_id = uploaded.deploy.id;
        let remote = poller::poll(
            &self.options.poller,
            self.provider.as_ref(),
            credential,
            &site_id,
            &deploy_id,
            tokio::time::sleep,
        )
        .await;

        let url = remote.and_then(|deploy| {
            deploy
                .live_url()
                .map(str::to_string)
                .ok_or_else(|| DeployError::InvalidResponse("live deploy has no URL".to_string()))
        });

        match url {
            Ok(url) => Outcome::Succeeded {
                result: DeployResult {
                    url,
                    site_id,
                    deploy_id,
                },
                digest,
            },
            Err(error) => Outcome::PollFailed {
                error,
                site_id,
                deploy_id,
            },
        }
    }

    async fn build(&self) -> Result<(), BuildError> {
        let action = BuildAction::new(&self.project.build_command, &self.project.path);

        let result = async {
            self.executor.add_action(&action).await?;
            self.executor.run_action(&action).await
        }
        .await;

        let output = match result {
            Ok(build) if build.succeeded() => return Ok(()),
            Ok(build) => {
                warn!("Build of {} exited with {}", self.project.name, build.exit_code);
                build.output
            }
            Err(DeployError::CommandError { message, output }) => {
                warn!("Build of {} could not complete: {}", self.project.name, message);
                if output.is_empty() {
                    message
                } else {
                    output
                }
            }
            Err(e) => {
                warn!("Build of {} could not start: {}", self.project.name, e);
                e.to_string()
            }
        };

        let details = classify(&output);
        Err(BuildError {
            message: DeployError::BuildFailed.to_string(),
            output,
            details: Some(details),
        })
    }

    /// Record the attempt, then publish its terminal state and report the outcome.
    ///
    /// The history record is committed before observers can see the project
    /// as idle again.
    async fn finalize(&self, outcome: Outcome) -> Result<DeployResult, DeployError> {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner()).take();

        let record = NewDeploymentRecord::new(
            &self.project.name,
            self.project.path.to_string_lossy(),
            self.options.provider,
        );

        let (event, state, record, result) = match outcome {
            Outcome::Succeeded { result, digest } => {
                info!("Deployed {} to {}", self.project.name, result.url);
                let record = record
                    .succeeded(&result.url)
                    .with_metadata("siteId", result.site_id.as_str())
                    .with_metadata("deployId", result.deploy_id.as_str())
                    .with_metadata("digest", digest);
                (
                    PipelineEvent::Ready,
                    DeploymentState::succeeded(),
                    record,
                    Ok(result),
                )
            }
            Outcome::BuildFailed(build_error) => {
                error!("Build of {} failed", self.project.name);
                let event = PipelineEvent::BuildFailed(build_error.message.clone());
                let record = record
                    .failed(&build_error.message)
                    .with_metadata("buildError", true)
                    .with_metadata("buildOutput", build_error.output.as_str())
                    .with_metadata("errorDetails", serde_json::to_value(&build_error.details).unwrap_or_default());
                (
                    event,
                    DeploymentState::build_failed(build_error),
                    record,
                    Err(DeployError::BuildFailed),
                )
            }
            Outcome::UploadFailed(e) => {
                let message = e.to_string();
                error!("Upload of {} failed: {}", self.project.name, message);
                let state = DeploymentState::failed(PipelinePhase::DeployFailed, &message);
                let record = record.failed(&message).with_metadata("stage", "upload");
                (PipelineEvent::DeployFailed(message), state, record, Err(e))
            }
            Outcome::PollFailed {
                error: e,
                site_id,
                deploy_id,
            } => {
                let message = e.to_string();
                error!("Deployment of {} failed: {}", self.project.name, message);
                let (event, phase) = match e {
                    DeployError::TimedOut => (PipelineEvent::TimedOut, PipelinePhase::TimedOut),
                    _ => (
                        PipelineEvent::DeployFailed(message.clone()),
                        PipelinePhase::DeployFailed,
                    ),
                };
                let state = DeploymentState::failed(phase, &message);
                let record = record
                    .failed(message)
                    .with_metadata("stage", "poll")
                    .with_metadata("siteId", site_id)
                    .with_metadata("deployId", deploy_id);
                (event, state, record, Err(e))
            }
            Outcome::Cancelled => {
                let is_build_ready = self.state.snapshot().is_build_ready;
                let record = record
                    .failed(DeployError::Cancelled.to_string())
                    .with_metadata("cancelled", true);
                (
                    PipelineEvent::Cancel,
                    DeploymentState::cancelled(is_build_ready),
                    record,
                    Err(DeployError::Cancelled),
                )
            }
        };

        if let Err(e) = self.history.append(record).await {
            error!("Failed to record deployment of {}: {}", self.project.name, e);
        }
        self.enter(event, state).await;
        result
    }
}
