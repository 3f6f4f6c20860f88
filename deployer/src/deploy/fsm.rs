//! Finite State Machine for a deployment attempt

use serde::{Deserialize, Serialize};

/// Pipeline phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    /// No attempt has run yet
    #[default]
    Idle,

    /// Build command running
    Building,

    /// Build exited non-zero
    BuildFailed,

    /// Build output is ready to upload
    BuildReady,

    /// Artifacts being submitted to the provider
    Uploading,

    /// Waiting for the remote deploy to settle
    Polling,

    /// Remote deploy is live
    Succeeded,

    /// Upload rejected or provider reported an error
    DeployFailed,

    /// Poll budget exhausted
    TimedOut,

    /// Stopped by the user
    Cancelled,
}

impl PipelinePhase {
    /// Whether an attempt has concluded in this phase
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelinePhase::BuildFailed
                | PipelinePhase::Succeeded
                | PipelinePhase::DeployFailed
                | PipelinePhase::TimedOut
                | PipelinePhase::Cancelled
        )
    }

    /// Whether a deployment is in flight
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PipelinePhase::Building
                | PipelinePhase::BuildReady
                | PipelinePhase::Uploading
                | PipelinePhase::Polling
        )
    }
}

/// Pipeline event
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Begin a new attempt
    Start,

    /// Build exited zero
    BuildSucceeded,

    /// Build exited non-zero
    BuildFailed(String),

    /// Begin uploading artifacts
    Upload,

    /// Provider accepted the deploy
    Uploaded,

    /// Remote deploy is live
    Ready,

    /// Upload or remote deploy failed
    DeployFailed(String),

    /// Poll budget exhausted
    TimedOut,

    /// User cancelled
    Cancel,
}

/// Deployment attempt FSM
#[derive(Debug, Clone)]
pub struct PipelineFsm {
    phase: PipelinePhase,
    error: Option<String>,
    attempts: u32,
}

impl PipelineFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            phase: PipelinePhase::Idle,
            error: None,
            attempts: 0,
        }
    }

    /// Get current phase
    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of attempts started
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Process an event and transition phase
    pub fn process(&mut self, event: PipelineEvent) -> Result<PipelinePhase, String> {
        let new_phase = match (self.phase, &event) {
            // A new attempt from rest
            (phase, PipelineEvent::Start) if phase == PipelinePhase::Idle || phase.is_terminal() => {
                self.error = None;
                self.attempts += 1;
                PipelinePhase::Building
            }

            // From Building
            (PipelinePhase::Building, PipelineEvent::BuildSucceeded) => PipelinePhase::BuildReady,
            (PipelinePhase::Building, PipelineEvent::BuildFailed(err)) => {
                self.error = Some(err.clone());
                PipelinePhase::BuildFailed
            }

            // From BuildReady
            (PipelinePhase::BuildReady, PipelineEvent::Upload) => PipelinePhase::Uploading,

            // From Uploading
            (PipelinePhase::Uploading, PipelineEvent::Uploaded) => PipelinePhase::Polling,
            (PipelinePhase::Uploading, PipelineEvent::DeployFailed(err)) => {
                self.error = Some(err.clone());
                PipelinePhase::DeployFailed
            }

            // From Polling
            (PipelinePhase::Polling, PipelineEvent::Ready) => PipelinePhase::Succeeded,
            (PipelinePhase::Polling, PipelineEvent::DeployFailed(err)) => {
                self.error = Some(err.clone());
                PipelinePhase::DeployFailed
            }
            (PipelinePhase::Polling, PipelineEvent::TimedOut) => {
                self.error = Some("Deployment timed out".to_string());
                PipelinePhase::TimedOut
            }

            // Any in-flight phase can be cancelled
            (phase, PipelineEvent::Cancel) if phase.is_active() => PipelinePhase::Cancelled,

            // Invalid transitions
            (phase, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", phase, event));
            }
        };

        self.phase = new_phase;
        Ok(new_phase)
    }

    /// Force the attempt into `DeployFailed` after an invalid transition
    pub fn abort(&mut self, error: String) -> PipelinePhase {
        self.error = Some(error);
        self.phase = PipelinePhase::DeployFailed;
        self.phase
    }
}

impl Default for PipelineFsm {
    fn default() -> Self {
        Self::new()
    }
}
