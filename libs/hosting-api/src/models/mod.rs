//! API models

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Site creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSiteRequest {
    pub name: String,
    pub custom_domain: Option<String>,
    pub force_ssl: bool,
}

/// A remote site
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ssl_url: Option<String>,
    #[serde(default)]
    pub custom_domain: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Encoding of a deploy file's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEncoding {
    Base64,
}

/// A single file of a deployment. Content is UTF-8 text unless `encoding` says otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployFile {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<FileEncoding>,
}

impl DeployFile {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            encoding: None,
        }
    }

    pub fn base64(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            encoding: Some(FileEncoding::Base64),
        }
    }
}

/// Deploy creation request, keyed by site-relative path (e.g. `/index.html`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeployRequest {
    pub files: BTreeMap<String, DeployFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Remote deploy state.
///
/// Providers add states over time, so anything unrecognised is kept verbatim
/// in `Other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemoteState {
    New,
    #[default]
    Pending,
    Building,
    Uploading,
    Uploaded,
    Processing,
    Ready,
    Error,
    Other(String),
}

impl RemoteState {
    pub fn as_str(&self) -> &str {
        match self {
            RemoteState::New => "new",
            RemoteState::Pending => "pending",
            RemoteState::Building => "building",
            RemoteState::Uploading => "uploading",
            RemoteState::Uploaded => "uploaded",
            RemoteState::Processing => "processing",
            RemoteState::Ready => "ready",
            RemoteState::Error => "error",
            RemoteState::Other(s) => s.as_str(),
        }
    }

    /// `ready` and `uploaded` both mean the site is live
    pub fn is_live(&self) -> bool {
        matches!(self, RemoteState::Ready | RemoteState::Uploaded)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RemoteState::Error)
    }
}

impl From<String> for RemoteState {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "new" => RemoteState::New,
            "pending" => RemoteState::Pending,
            "building" => RemoteState::Building,
            "uploading" => RemoteState::Uploading,
            "uploaded" => RemoteState::Uploaded,
            "processing" => RemoteState::Processing,
            "ready" => RemoteState::Ready,
            "error" => RemoteState::Error,
            _ => RemoteState::Other(value),
        }
    }
}

impl From<&str> for RemoteState {
    fn from(value: &str) -> Self {
        RemoteState::from(value.to_string())
    }
}

impl From<RemoteState> for String {
    fn from(value: RemoteState) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RemoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote deploy as reported by the provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deploy {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub state: RemoteState,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ssl_url: Option<String>,
    #[serde(default)]
    pub deploy_ssl_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Deploy {
    /// Public URL of the deployed site, preferring HTTPS
    pub fn live_url(&self) -> Option<&str> {
        self.ssl_url
            .as_deref()
            .or(self.url.as_deref())
            .or(self.deploy_ssl_url.as_deref())
    }
}

/// Error body returned by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: Option<u16>,
    pub message: String,
}
