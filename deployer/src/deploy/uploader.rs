//! Artifact uploader
//!
//! Packs a build output directory into a single deploy request and submits it
//! to the project's remote site, creating the site on first use.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine;
use hosting_api::{CreateDeployRequest, CreateSiteRequest, Deploy, DeployFile};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::http::provider::HostingProvider;
use crate::storage::settings::ProjectSettings;
use crate::storage::sites::SiteRegistry;
use crate::utils::{sha256_hex, slugify};

/// Build output ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// Site-relative path (`/index.html`) to content
    pub files: BTreeMap<String, DeployFile>,

    /// SHA-256 over every path and its raw content
    pub digest: String,
}

impl Artifacts {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Read every file below `dir` into a flat path map.
///
/// UTF-8 files are sent as text, anything else base64 encoded.
pub async fn collect_artifacts(dir: &Dir) -> Result<Artifacts, DeployError> {
    let paths = dir.walk_files().await.map_err(|e| {
        DeployError::UploadError(format!(
            "Unable to read build output {}: {}",
            dir.path().display(),
            e
        ))
    })?;

    let mut raw = Vec::with_capacity(paths.len());
    for relative in paths {
        let bytes = dir.file(&relative).read_bytes().await?;
        let key = format!("/{}", relative.to_string_lossy().replace('\\', "/"));
        raw.push((key, bytes));
    }

    let digest = sha256_hex(
        raw.iter()
            .flat_map(|(key, bytes)| [key.as_bytes(), b"\0".as_slice(), bytes.as_slice(), b"\0".as_slice()]),
    );

    let files = raw
        .into_iter()
        .map(|(key, bytes)| {
            let file = match String::from_utf8(bytes) {
                Ok(text) => DeployFile::text(text),
                Err(e) => DeployFile::base64(base64::engine::general_purpose::STANDARD.encode(e.into_bytes())),
            };
            (key, file)
        })
        .collect();

    Ok(Artifacts { files, digest })
}

/// A deploy the provider accepted
#[derive(Debug, Clone)]
pub struct UploadedDeploy {
    pub site_id: String,
    pub deploy: Deploy,
}

/// Submits artifacts to the project's remote site
pub struct ArtifactUploader {
    provider: Arc<dyn HostingProvider>,
    sites: Arc<SiteRegistry>,
}

impl ArtifactUploader {
    pub fn new(provider: Arc<dyn HostingProvider>, sites: Arc<SiteRegistry>) -> Self {
        Self { provider, sites }
    }

    /// Upload all artifacts in one deploy.
    ///
    /// Provider rejections and unusable answers become
    /// [`DeployError::InvalidResponse`]; transport errors pass through.
    pub async fn upload(
        &self,
        credential: &SecretString,
        project: &ProjectSettings,
        artifacts: Artifacts,
    ) -> Result<UploadedDeploy, DeployError> {
        let request = CreateDeployRequest {
            files: artifacts.files,
            digest: Some(artifacts.digest),
            title: Some(format!("Deploy of {}", project.name)),
        };

        self.submit(credential, project, &request)
            .await
            .map_err(invalid_response)
    }

    async fn submit(
        &self,
        credential: &SecretString,
        project: &ProjectSettings,
        request: &CreateDeployRequest,
    ) -> Result<UploadedDeploy, DeployError> {
        let cached = self.sites.get(&project.name).await?;
        let mut site_id = match &cached {
            Some(id) => {
                debug!("Reusing site {} for {}", id, project.name);
                id.clone()
            }
            None => self.resolve_site(credential, project).await?,
        };

        info!(
            "Uploading {} files for {} to site {}",
            request.files.len(),
            project.name,
            site_id
        );

        let deploy = match self.provider.create_deploy(credential, &site_id, request).await {
            Err(e) if cached.is_some() && e.api_status() == Some(404) => {
                warn!(
                    "Cached site {} for {} no longer exists, resolving again",
                    site_id, project.name
                );
                self.sites.forget(&project.name).await?;
                site_id = self.resolve_site(credential, project).await?;
                self.provider.create_deploy(credential, &site_id, request).await?
            }
            result => result?,
        };

        if deploy.id.trim().is_empty() {
            return Err(DeployError::InvalidResponse("deploy id missing".to_string()));
        }

        self.sites.set(&project.name, &site_id).await?;
        info!("Created deploy {} on site {}", deploy.id, site_id);

        Ok(UploadedDeploy { site_id, deploy })
    }

    /// Find the project's site by name, creating it when absent
    async fn resolve_site(
        &self,
        credential: &SecretString,
        project: &ProjectSettings,
    ) -> Result<String, DeployError> {
        let name = slugify(&project.name);

        let existing = self
            .provider
            .list_sites(credential)
            .await?
            .into_iter()
            .find(|site| site.name == name);

        let site = match existing {
            Some(site) => {
                info!("Found existing site {} ({})", site.name, site.id);
                site
            }
            None => {
                let request = CreateSiteRequest {
                    name: name.clone(),
                    custom_domain: project.custom_domain.clone(),
                    force_ssl: true,
                };
                let site = self.provider.create_site(credential, &request).await?;
                info!("Created site {} ({})", name, site.id);
                site
            }
        };

        if site.id.trim().is_empty() {
            return Err(DeployError::InvalidResponse("site id missing".to_string()));
        }
        Ok(site.id)
    }
}

fn invalid_response(err: DeployError) -> DeployError {
    match err {
        DeployError::ApiError { status, body } => {
            DeployError::InvalidResponse(format!("provider answered {}: {}", status, body))
        }
        DeployError::JsonError(e) => DeployError::InvalidResponse(e.to_string()),
        other => other,
    }
}
