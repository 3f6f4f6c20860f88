//! Project-to-site registry
//!
//! Remembers which remote site each project deploys to, so repeated
//! deployments reuse it instead of creating duplicates. Reads always go to
//! disk: another process may have changed or cleared an entry since the last
//! deployment.

use std::collections::BTreeMap;

use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::file::File;

/// Persisted `project -> site id` map
#[derive(Debug)]
pub struct SiteRegistry {
    file: File,
    write_lock: Mutex<()>,
}

impl SiteRegistry {
    pub fn new(file: File) -> Self {
        Self {
            file,
            write_lock: Mutex::new(()),
        }
    }

    /// Site id cached for a project, read fresh from disk
    pub async fn get(&self, project: &str) -> Result<Option<String>, DeployError> {
        let sites = self.load().await?;
        Ok(sites.get(project).cloned())
    }

    /// Remember the site used by a project
    pub async fn set(&self, project: &str, site_id: &str) -> Result<(), DeployError> {
        let _guard = self.write_lock.lock().await;
        let mut sites = self.load().await?;
        sites.insert(project.to_string(), site_id.to_string());
        self.file.write_json(&sites).await?;
        debug!("Cached site {} for project {}", site_id, project);
        Ok(())
    }

    /// Drop a project's cached site
    pub async fn forget(&self, project: &str) -> Result<(), DeployError> {
        let _guard = self.write_lock.lock().await;
        let mut sites = self.load().await?;
        if sites.remove(project).is_some() {
            self.file.write_json(&sites).await?;
            debug!("Forgot cached site for project {}", project);
        }
        Ok(())
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, DeployError> {
        self.file
            .read_json_or_default()
            .await
            .map_err(|e| DeployError::StorageError(format!("Failed to read site registry: {}", e)))
    }
}
