//! Server state

use std::sync::Arc;

use secrecy::SecretString;

use crate::app::state::AppState;

/// Server state shared across handlers
pub struct ServerState {
    pub app: Arc<AppState>,

    /// Provider token used for deployments started over HTTP
    pub credential: SecretString,
}

impl ServerState {
    pub fn new(app: Arc<AppState>, credential: SecretString) -> Self {
        Self { app, credential }
    }
}
