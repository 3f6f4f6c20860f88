//! Hosting provider API

use async_trait::async_trait;
use hosting_api::{CreateDeployRequest, CreateSiteRequest, Deploy, Site};
use secrecy::SecretString;

use crate::errors::DeployError;
use crate::http::client::HttpClient;

/// The provider endpoints the pipeline depends on.
///
/// Implemented by [`HttpClient`]; tests substitute scripted fakes.
#[async_trait]
pub trait HostingProvider: Send + Sync {
    /// `GET /sites`
    async fn list_sites(&self, credential: &SecretString) -> Result<Vec<Site>, DeployError>;

    /// `POST /sites`
    async fn create_site(
        &self,
        credential: &SecretString,
        request: &CreateSiteRequest,
    ) -> Result<Site, DeployError>;

    /// `POST /sites/{site_id}/deploys`
    async fn create_deploy(
        &self,
        credential: &SecretString,
        site_id: &str,
        request: &CreateDeployRequest,
    ) -> Result<Deploy, DeployError>;

    /// `GET /sites/{site_id}/deploys/{deploy_id}`
    async fn get_deploy(
        &self,
        credential: &SecretString,
        site_id: &str,
        deploy_id: &str,
    ) -> Result<Deploy, DeployError>;
}

#[async_trait]
impl HostingProvider for HttpClient {
    async fn list_sites(&self, credential: &SecretString) -> Result<Vec<Site>, DeployError> {
        self.get("/sites", credential).await
    }

    async fn create_site(
        &self,
        credential: &SecretString,
        request: &CreateSiteRequest,
    ) -> Result<Site, DeployError> {
        self.post("/sites", credential, request).await
    }

    async fn create_deploy(
        &self,
        credential: &SecretString,
        site_id: &str,
        request: &CreateDeployRequest,
    ) -> Result<Deploy, DeployError> {
        let path = format!("/sites/{}/deploys", site_id);
        self.post(&path, credential, request).await
    }

    async fn get_deploy(
        &self,
        credential: &SecretString,
        site_id: &str,
        deploy_id: &str,
    ) -> Result<Deploy, DeployError> {
        let path = format!("/sites/{}/deploys/{}", site_id, deploy_id);
        self.get(&path, credential).await
    }
}
