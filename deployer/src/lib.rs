//! Deployer Library
//!
//! Build, upload and track web project deployments against a hosting
//! provider.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
