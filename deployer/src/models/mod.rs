//! Data models

pub mod build;
pub mod deployment;

/// A provider-side deployment, polled but never changed locally
pub type RemoteDeployment = hosting_api::Deploy;
