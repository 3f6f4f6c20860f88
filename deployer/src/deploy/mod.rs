//! Deployment pipeline

pub mod build;
pub mod classifier;
pub mod fsm;
pub mod pipeline;
pub mod state;
pub mod uploader;
