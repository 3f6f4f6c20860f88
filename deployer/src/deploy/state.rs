//! Observable deployment state
//!
//! One [`StateStore`] exists per project pipeline. Only the pipeline writes to
//! it, always replacing the whole record; any number of [`StateReader`]s
//! observe the latest snapshot.

use serde::Serialize;
use tokio::sync::watch;

use crate::deploy::fsm::PipelinePhase;
use crate::errors::DeployError;
use crate::models::build::BuildError;

/// Snapshot of the current deployment for a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentState {
    pub phase: PipelinePhase,
    pub is_deploying: bool,
    pub is_build_ready: bool,
    pub error: Option<String>,
    pub build_error: Option<BuildError>,
}

impl DeploymentState {
    /// Fresh attempt, everything cleared
    pub fn starting() -> Self {
        Self {
            phase: PipelinePhase::Building,
            is_deploying: true,
            ..Default::default()
        }
    }

    pub fn build_ready() -> Self {
        Self {
            phase: PipelinePhase::BuildReady,
            is_deploying: true,
            is_build_ready: true,
            ..Default::default()
        }
    }

    /// Same flags, later in-flight phase
    pub fn in_phase(&self, phase: PipelinePhase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }

    pub fn build_failed(build_error: BuildError) -> Self {
        Self {
            phase: PipelinePhase::BuildFailed,
            is_deploying: false,
            is_build_ready: false,
            error: Some(build_error.message.clone()),
            build_error: Some(build_error),
        }
    }

    pub fn failed(phase: PipelinePhase, error: impl Into<String>) -> Self {
        Self {
            phase,
            is_deploying: false,
            is_build_ready: false,
            error: Some(error.into()),
            build_error: None,
        }
    }

    pub fn succeeded() -> Self {
        Self {
            phase: PipelinePhase::Succeeded,
            is_deploying: false,
            is_build_ready: true,
            error: None,
            build_error: None,
        }
    }

    pub fn cancelled(is_build_ready: bool) -> Self {
        Self {
            phase: PipelinePhase::Cancelled,
            is_deploying: false,
            is_build_ready,
            error: None,
            build_error: None,
        }
    }

    /// `build_error` implies `error`; in-flight and errored never overlap
    pub fn is_consistent(&self) -> bool {
        let build_error_ok = self.build_error.is_none() || self.error.is_some();
        let exclusive = !(self.is_deploying && self.error.is_some());
        let build_error_phase =
            self.build_error.is_none() || self.phase == PipelinePhase::BuildFailed;
        build_error_ok && exclusive && build_error_phase
    }
}

/// Writable state slot, owned by the pipeline
#[derive(Debug)]
pub struct StateStore {
    tx: watch::Sender<DeploymentState>,
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DeploymentState::default());
        Self { tx }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> DeploymentState {
        self.tx.borrow().clone()
    }

    /// Replace the whole record and notify observers
    pub fn set(&self, state: DeploymentState) {
        debug_assert!(state.is_consistent(), "inconsistent deployment state: {:?}", state);
        self.tx.send_replace(state);
    }

    /// Atomically claim the slot for a new attempt.
    ///
    /// Returns false, leaving the state untouched, when an attempt is already
    /// in flight.
    pub fn try_begin(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_deploying {
                return false;
            }
            *state = DeploymentState::starting();
            true
        })
    }

    /// Read-only handle for observers
    pub fn reader(&self) -> StateReader {
        StateReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`StateStore`]
#[derive(Debug, Clone)]
pub struct StateReader {
    rx: watch::Receiver<DeploymentState>,
}

impl StateReader {
    /// Current snapshot
    pub fn snapshot(&self) -> DeploymentState {
        self.rx.borrow().clone()
    }

    /// Wait for the next write and return the snapshot it produced
    pub async fn changed(&mut self) -> Result<DeploymentState, DeployError> {
        self.rx
            .changed()
            .await
            .map_err(|_| DeployError::Internal("deployment state store dropped".to_string()))?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// Underlying receiver, for adapters such as streams
    pub fn into_receiver(self) -> watch::Receiver<DeploymentState> {
        self.rx
    }
}
