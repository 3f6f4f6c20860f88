//! Background work

pub mod poller;
