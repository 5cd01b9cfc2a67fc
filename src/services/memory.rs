//! In-memory [`Backend`] used by tests and local experiments.
//!
//! Serves a fixed validator list and paginates failing objects the way the
//! REST API does, records every write, and can be told to fail individual
//! endpoints.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CsrfInfo, FailingObject, FailingObjectPage, Validator};
use crate::services::{Backend, PageRequest};

const NEXT_BASE: &str = "memory://backend/failing-objects/";

/// Endpoints that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Csrf,
    ObjectCount,
    Validators,
    PutValidator,
    FailingObjects,
    PutFailingObject,
}

/// A write received by the backend, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Validator(Validator),
    FailingObject(FailingObject),
}

#[derive(Debug, Default)]
struct MemoryState {
    validators: Vec<Validator>,
    failing_objects: Vec<FailingObject>,
    object_counts: HashMap<(String, String), u64>,
    writes: Vec<(Instant, Write)>,
    failing: HashSet<Endpoint>,
    page_requests: Vec<PageRequest>,
}

/// Backend holding all records in memory.
#[derive(Debug)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
    page_size: usize,
}

impl InMemoryBackend {
    /// Create a backend serving failing objects `page_size` at a time.
    pub fn new(page_size: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            page_size: page_size.max(1),
        }
    }

    pub fn with_validators(self, validators: Vec<Validator>) -> Self {
        self.state.lock().validators = validators;
        self
    }

    pub fn with_failing_objects(self, objects: Vec<FailingObject>) -> Self {
        self.state.lock().failing_objects = objects;
        self
    }

    pub fn with_object_count(self, app_label: &str, model_name: &str, count: u64) -> Self {
        self.state
            .lock()
            .object_counts
            .insert((app_label.to_string(), model_name.to_string()), count);
        self
    }

    /// Make `endpoint` fail (or succeed again) from now on.
    pub fn set_failing(&self, endpoint: Endpoint, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failing.insert(endpoint);
        } else {
            state.failing.remove(&endpoint);
        }
    }

    /// Every write received so far.
    pub fn writes(&self) -> Vec<Write> {
        self.state
            .lock()
            .writes
            .iter()
            .map(|(_, write)| write.clone())
            .collect()
    }

    /// Every write received so far, with the (Tokio) time it arrived.
    pub fn timed_writes(&self) -> Vec<(Instant, Write)> {
        self.state.lock().writes.clone()
    }

    /// Failing-object page requests received so far.
    pub fn page_requests(&self) -> Vec<PageRequest> {
        self.state.lock().page_requests.clone()
    }

    /// Stored copy of a validator, reflecting accepted writes.
    pub fn stored_validator(&self, id: u64) -> Option<Validator> {
        self.state.lock().validators.iter().find(|v| v.id == id).cloned()
    }

    /// Stored copy of a failing object, reflecting accepted writes.
    pub fn stored_failing_object(&self, id: u64) -> Option<FailingObject> {
        self.state
            .lock()
            .failing_objects
            .iter()
            .find(|o| o.id == id)
            .cloned()
    }

    fn check(&self, endpoint: Endpoint) -> Result<()> {
        if self.state.lock().failing.contains(&endpoint) {
            return Err(AppError::Status {
                url: format!("memory://backend/{endpoint:?}"),
                status: 503,
            });
        }
        Ok(())
    }

    fn page(&self, validator_id: u64, page: usize) -> FailingObjectPage {
        let state = self.state.lock();
        let matching: Vec<&FailingObject> = state
            .failing_objects
            .iter()
            .filter(|o| o.validator == validator_id)
            .collect();

        let start = (page - 1) * self.page_size;
        let results: Vec<FailingObject> = matching
            .iter()
            .skip(start)
            .take(self.page_size)
            .map(|o| (*o).clone())
            .collect();
        let next = (start + self.page_size < matching.len())
            .then(|| format!("{NEXT_BASE}?validator_id={validator_id}&page={}", page + 1));

        FailingObjectPage { results, next }
    }
}

/// Read `(validator_id, page)` back out of a continuation link.
fn parse_next(url: &str) -> Result<(u64, usize)> {
    let parsed = Url::parse(url)?;
    let mut validator_id = None;
    let mut page = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "validator_id" => validator_id = value.parse().ok(),
            "page" => page = value.parse().ok(),
            _ => {}
        }
    }
    match (validator_id, page) {
        (Some(id), Some(page)) if page >= 1 => Ok((id, page)),
        _ => Err(AppError::Status {
            url: url.to_string(),
            status: 404,
        }),
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn fetch_csrf_info(&self) -> Result<CsrfInfo> {
        self.check(Endpoint::Csrf)?;
        Ok(CsrfInfo {
            csrf_header_name: "X-CSRFTOKEN".to_string(),
            csrf_cookie_name: "csrftoken".to_string(),
        })
    }

    async fn fetch_object_count(&self, app_label: &str, model_name: &str) -> Result<u64> {
        self.check(Endpoint::ObjectCount)?;
        self.state
            .lock()
            .object_counts
            .get(&(app_label.to_string(), model_name.to_string()))
            .copied()
            .ok_or_else(|| AppError::Status {
                url: format!("memory://backend/meta/object-counts/{app_label}.{model_name}"),
                status: 404,
            })
    }

    async fn fetch_validators(&self) -> Result<Vec<Validator>> {
        self.check(Endpoint::Validators)?;
        Ok(self.state.lock().validators.clone())
    }

    async fn put_validator(&self, validator: &Validator) -> Result<()> {
        self.check(Endpoint::PutValidator)?;
        let mut state = self.state.lock();
        if let Some(stored) = state.validators.iter_mut().find(|v| v.id == validator.id) {
            *stored = validator.clone();
        }
        state
            .writes
            .push((Instant::now(), Write::Validator(validator.clone())));
        Ok(())
    }

    async fn fetch_failing_objects(&self, request: &PageRequest) -> Result<FailingObjectPage> {
        self.state.lock().page_requests.push(request.clone());
        self.check(Endpoint::FailingObjects)?;
        let (validator_id, page) = match request {
            PageRequest::First { validator_id } => (*validator_id, 1),
            PageRequest::Next { url } => parse_next(url)?,
        };
        Ok(self.page(validator_id, page))
    }

    async fn put_failing_object(&self, object: &FailingObject) -> Result<()> {
        self.check(Endpoint::PutFailingObject)?;
        let mut state = self.state.lock();
        if let Some(stored) = state.failing_objects.iter_mut().find(|o| o.id == object.id) {
            *stored = object.clone();
        }
        state
            .writes
            .push((Instant::now(), Write::FailingObject(object.clone())));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::failing_object;

    #[tokio::test]
    async fn test_pages_follow_next_links() {
        let backend = InMemoryBackend::new(2).with_failing_objects(
            (1..=5)
                .map(|id| failing_object(id, 7))
                .chain([failing_object(99, 8)])
                .collect(),
        );

        let first = backend
            .fetch_failing_objects(&PageRequest::First { validator_id: 7 })
            .await
            .unwrap();
        assert_eq!(first.results.len(), 2);

        let second = backend
            .fetch_failing_objects(&PageRequest::Next {
                url: first.next.unwrap(),
            })
            .await
            .unwrap();
        let third = backend
            .fetch_failing_objects(&PageRequest::Next {
                url: second.next.unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(third.results.iter().map(|o| o.id).collect::<Vec<_>>(), vec![5]);
        assert!(third.next.is_none());
        assert_eq!(backend.page_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let backend = InMemoryBackend::new(5);
        backend.set_failing(Endpoint::Validators, true);
        assert!(backend.fetch_validators().await.is_err());
        backend.set_failing(Endpoint::Validators, false);
        assert!(backend.fetch_validators().await.unwrap().is_empty());
    }

    #[test]
    fn test_parse_next_rejects_garbage() {
        assert!(parse_next("memory://backend/failing-objects/?page=2").is_err());
        assert!(parse_next("not a url").is_err());
        assert_eq!(
            parse_next("memory://backend/failing-objects/?validator_id=3&page=4").unwrap(),
            (3, 4)
        );
    }
}
