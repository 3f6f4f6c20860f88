//! Hosting provider HTTP access

pub mod client;
pub mod provider;
