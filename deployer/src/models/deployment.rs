//! Deployment history models

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hosting provider a deployment went to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    #[default]
    Netlify,
    Vercel,
    GithubPages,
    Other,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Netlify => "netlify",
            Provider::Vercel => "vercel",
            Provider::GithubPages => "github-pages",
            Provider::Other => "other",
        };
        f.write_str(name)
    }
}

/// Outcome recorded for a deployment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordStatus {
    Success,
    Failed,
    InProgress,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordStatus::Success => "success",
            RecordStatus::Failed => "failed",
            RecordStatus::InProgress => "in-progress",
        };
        f.write_str(name)
    }
}

/// A history entry. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub provider: Provider,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub project_path: String,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// A history entry before the log assigns its id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeploymentRecord {
    pub name: String,
    pub url: Option<String>,
    pub provider: Provider,
    pub status: RecordStatus,
    pub project_path: String,
    pub error: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl NewDeploymentRecord {
    pub fn new(name: impl Into<String>, project_path: impl Into<String>, provider: Provider) -> Self {
        Self {
            name: name.into(),
            url: None,
            provider,
            status: RecordStatus::InProgress,
            project_path: project_path.into(),
            error: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn succeeded(mut self, url: impl Into<String>) -> Self {
        self.status = RecordStatus::Success;
        self.url = Some(url.into());
        self.error = None;
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = RecordStatus::Failed;
        self.error = Some(error.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Stamp the entry with an id and creation time
    pub fn into_record(self, id: String, created_at: DateTime<Utc>) -> DeploymentRecord {
        DeploymentRecord {
            id,
            name: self.name,
            url: self.url,
            provider: self.provider,
            status: self.status,
            created_at,
            project_path: self.project_path,
            error: self.error,
            metadata: self.metadata,
        }
    }
}
