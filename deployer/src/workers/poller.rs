//! Deployment status poller
//!
//! Fixed-interval polling with a bounded attempt budget. A provider-reported
//! `error` ends polling at once; a failed request is retried after a longer
//! delay and counts against the budget.

use std::future::Future;
use std::time::Duration;

use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use crate::errors::DeployError;
use crate::http::provider::HostingProvider;
use crate::models::RemoteDeployment;

/// Poller options
#[derive(Debug, Clone)]
pub struct Options {
    /// Status checks before giving up
    pub max_attempts: u32,

    /// Delay after a non-terminal status
    pub interval: Duration,

    /// Delay after a failed status request
    pub error_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_millis(1000),
            error_interval: Duration::from_millis(2000),
        }
    }
}

/// Poll a remote deploy until it is live, fails, or the budget runs out.
///
/// Returns [`DeployError::RemoteFailed`] with the provider's message when the
/// deploy reports `error`, and [`DeployError::TimedOut`] when no terminal state
/// was seen within `max_attempts` checks.
pub async fn poll<S, F>(
    options: &Options,
    provider: &dyn HostingProvider,
    credential: &SecretString,
    site_id: &str,
    deploy_id: &str,
    sleep_fn: S,
) -> Result<RemoteDeployment, DeployError>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Polling deploy {} of site {}...", deploy_id, site_id);

    for attempt in 1..=options.max_attempts {
        let wait = match provider.get_deploy(credential, site_id, deploy_id).await {
            Ok(deploy) if deploy.state.is_live() => {
                info!("Deploy {} is {} after {} checks", deploy_id, deploy.state, attempt);
                return Ok(deploy);
            }
            Ok(deploy) if deploy.state.is_error() => {
                let message = deploy
                    .error_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Deployment failed".to_string());
                error!("Deploy {} failed: {}", deploy_id, message);
                return Err(DeployError::RemoteFailed(message));
            }
            Ok(deploy) => {
                debug!(
                    "Deploy {} is {} (check {}/{})",
                    deploy_id, deploy.state, attempt, options.max_attempts
                );
                options.interval
            }
            Err(e) => {
                warn!(
                    "Status check {}/{} for deploy {} failed: {}",
                    attempt, options.max_attempts, deploy_id, e
                );
                options.error_interval
            }
        };

        if attempt < options.max_attempts {
            sleep_fn(wait).await;
        }
    }

    error!(
        "Deploy {} did not settle after {} checks",
        deploy_id, options.max_attempts
    );
    Err(DeployError::TimedOut)
}
