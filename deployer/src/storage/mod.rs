//! Local persistence

pub mod history;
pub mod layout;
pub mod settings;
pub mod sites;
