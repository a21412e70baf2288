//! Core domain types and utilities for the encore platform.
//!
//! This crate provides the foundational ID types and error handling
//! shared by the identity library and the server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{AuthRecordId, ParseIdError, UserId};
