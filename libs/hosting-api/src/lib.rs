//! Hosting provider API models
//!
//! Request and response bodies for the sites/deploys endpoints used by the
//! deployment pipeline.

pub mod models;

pub use models::*;
