//! HTTP client implementation

use std::time::Duration;

use hosting_api::ErrorResponse;
use reqwest::{header, Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::DeployError;

/// HTTP client for the hosting provider API
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str) -> Result<Self, DeployError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a new HTTP client with a custom request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, DeployError> {
        Url::parse(base_url)
            .map_err(|e| DeployError::ConfigError(format!("Invalid provider URL '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("deployer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        credential: &SecretString,
    ) -> Result<T, DeployError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let request = self.client.get(&url);
        self.send(request, credential, "GET").await
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        credential: &SecretString,
        body: &B,
    ) -> Result<T, DeployError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let request = self.client.post(&url).json(body);
        self.send(request, credential, "POST").await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        credential: &SecretString,
        method: &str,
    ) -> Result<T, DeployError> {
        let response = request
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", credential.expose_secret()),
            )
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("HTTP {} failed: {} - {}", method, status, body);
            let body = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(DeployError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
