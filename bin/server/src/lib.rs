//! The encore web server.

pub mod auth;
pub mod config;
pub mod error;
pub mod jobs;
