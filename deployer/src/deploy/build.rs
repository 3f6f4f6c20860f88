//! Build executor adapter

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::DeployError;

/// A build to run for a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildAction {
    /// Shell command, e.g. `npm run build`
    pub command: String,

    /// Directory the command runs in
    pub working_dir: PathBuf,
}

impl BuildAction {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
        }
    }
}

/// Result of a finished build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub exit_code: i32,

    /// Combined stdout and stderr
    pub output: String,
}

impl BuildOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs project builds in some sandbox.
///
/// `run_action` may fail with [`DeployError::CommandError`] carrying whatever
/// output was captured before the failure.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    /// Register an action before running it
    async fn add_action(&self, action: &BuildAction) -> Result<(), DeployError>;

    /// Run a registered action to completion
    async fn run_action(&self, action: &BuildAction) -> Result<BuildOutput, DeployError>;
}

/// Runs builds as local shell commands
#[derive(Debug, Default)]
pub struct CommandBuildExecutor {
    actions: Mutex<Vec<BuildAction>>,
}

impl CommandBuildExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_registered(&self, action: &BuildAction) -> bool {
        let actions = self.actions.lock().unwrap_or_else(|e| e.into_inner());
        actions.contains(action)
    }
}

#[async_trait]
impl BuildExecutor for CommandBuildExecutor {
    async fn add_action(&self, action: &BuildAction) -> Result<(), DeployError> {
        if action.command.trim().is_empty() {
            return Err(DeployError::ConfigError("Build command is empty".to_string()));
        }

        let mut actions = self.actions.lock().unwrap_or_else(|e| e.into_inner());
        if !actions.contains(action) {
            debug!("Registered build action: {} in {}", action.command, action.working_dir.display());
            actions.push(action.clone());
        }
        Ok(())
    }

    async fn run_action(&self, action: &BuildAction) -> Result<BuildOutput, DeployError> {
        if !self.is_registered(action) {
            return Err(DeployError::ConfigError(format!(
                "Build action was not registered: {}",
                action.command
            )));
        }

        info!("Running build: {} (in {})", action.command, action.working_dir.display());

        let output = shell(&action.command)
            .current_dir(&action.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DeployError::CommandError {
                message: format!("Failed to run '{}': {}", action.command, e),
                output: String::new(),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        // Killed by a signal: no exit code
        let exit_code = output.status.code().unwrap_or(-1);
        debug!("Build finished with exit code {}", exit_code);

        Ok(BuildOutput {
            exit_code,
            output: combined,
        })
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(not(unix))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
