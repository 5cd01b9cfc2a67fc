//! The REST backend as seen by the dashboard.
//!
//! Storage-style async trait in the manner of the other service seams: one
//! method per endpoint, each returning a fully validated payload or an error.

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CsrfInfo, FailingObject, FailingObjectPage, Validator};

/// Which failing-objects page to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// First page of a validator's failing objects
    First { validator_id: u64 },
    /// Page behind a continuation link returned by the previous page
    Next { url: String },
}

impl fmt::Display for PageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRequest::First { validator_id } => {
                write!(f, "first page of validator {validator_id}")
            }
            PageRequest::Next { url } => write!(f, "next page {url}"),
        }
    }
}

/// Endpoints consumed by the dashboard.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET meta/csrf/`; the backend remembers the names for later writes.
    async fn fetch_csrf_info(&self) -> Result<CsrfInfo>;

    /// `GET meta/object-counts/?appLabel=&modelName=`
    async fn fetch_object_count(&self, app_label: &str, model_name: &str) -> Result<u64>;

    /// `GET validator-summary/`
    async fn fetch_validators(&self) -> Result<Vec<Validator>>;

    /// `PUT validator-summary/{id}/` with the full record.
    async fn put_validator(&self, validator: &Validator) -> Result<()>;

    /// `GET failing-objects/?validator_id=` or `GET <next>`.
    async fn fetch_failing_objects(&self, request: &PageRequest) -> Result<FailingObjectPage>;

    /// `PUT failing-objects/{id}/` with the full record.
    async fn put_failing_object(&self, object: &FailingObject) -> Result<()>;
}
