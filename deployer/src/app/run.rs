//! Main application run modes

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::deploy::pipeline::DeployResult;
use crate::errors::DeployError;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Deploy one project and wait for the outcome.
///
/// The shutdown signal cancels the attempt rather than abandoning it, so the
/// history still gets its record.
pub async fn deploy_once(
    options: &AppOptions,
    credential: SecretString,
    project: &str,
    shutdown_signal: impl Future<Output = ()> + Send,
) -> Result<DeployResult, DeployError> {
    let app_state = AppState::init(options).await?;
    let pipeline = app_state.pipeline(project)?;

    let deploy = pipeline.deploy(&credential);
    tokio::pin!(deploy);

    tokio::select! {
        result = &mut deploy => result,
        _ = shutdown_signal => {
            info!("Shutdown signal received, cancelling deployment of {}...", project);
            pipeline.cancel();
            deploy.await
        }
    }
}

/// Run the local status server until the shutdown signal fires
pub async fn run(
    options: AppOptions,
    credential: SecretString,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DeployError> {
    info!("Initializing deployer...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);

    let app_state = Arc::new(AppState::init(&options).await?);
    let server_handle = init_socket_server(
        &options,
        app_state.clone(),
        credential,
        shutdown_tx.subscribe(),
    )
    .await?;

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    app_state.shutdown();
    let _ = shutdown_tx.send(());
    await_server(server_handle, options.max_shutdown_delay).await
}

async fn init_socket_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    credential: SecretString,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<JoinHandle<Result<(), DeployError>>, DeployError> {
    info!("Initializing local HTTP server...");

    let server_state = ServerState::new(app_state, credential);
    serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await
}

async fn await_server(
    handle: JoinHandle<Result<(), DeployError>>,
    max_delay: Duration,
) -> Result<(), DeployError> {
    match tokio::time::timeout(max_delay, handle).await {
        Ok(Ok(result)) => {
            info!("Shutdown complete");
            result
        }
        Ok(Err(e)) => {
            error!("Server task failed: {}", e);
            Err(DeployError::ServerError(e.to_string()))
        }
        Err(_) => {
            warn!("Server did not stop within {:?}", max_delay);
            Err(DeployError::ServerError("shutdown timed out".to_string()))
        }
    }
}
