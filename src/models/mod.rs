// src/models/mod.rs

//! Domain models for the dashboard.
//!
//! Wire records served by the REST backend, the derived status tree, and
//! application configuration.

mod config;
mod failing_object;
mod meta;
mod status;
mod summary;
mod validator;

// Re-export all public types
pub use config::{ApiConfig, Config, EditingConfig, LoggingConfig};
pub use failing_object::{FailingObject, FailingObjectPage};
pub use meta::{CsrfInfo, ObjectCount};
pub use status::Status;
pub use summary::{AppSummary, AppTree, ModelSummary};
pub use validator::Validator;
