//! # Regis Registrar Library
//!
//! Domain engine for the campus records store:
//! - Entity models and per-entity repositories
//! - Enrollment admission (capacity and duplicate checks, serialized per section)
//! - Key-value settings access
//! - Letter-grade evaluation
//! - Credential-bridge contract and registration flows

pub mod admission;
pub mod auth;
pub mod db;
pub mod grading;
pub mod models;

pub use regis_common::{Error, Result};
