//! Top-level dashboard state.
//!
//! [`Dashboard`] owns the flat validator list, one cursor per open
//! drill-down and the lazily fetched object counts. The App → Model tree is
//! never stored; [`Dashboard::summary`] rebuilds it on demand.
//!
//! Failures at the backend boundary are logged with the operation tag and
//! leave state untouched. Operations report whether state changed instead of
//! returning the error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;

use super::aggregate::aggregate;
use super::cursor::FailingObjectCursor;
use super::debounce::JustificationDebouncer;
use super::reconcile::{self, Reconciliation};
use crate::error::{AppError, Result};
use crate::models::{AppTree, Config, FailingObject, ObjectCount, Validator};
use crate::services::Backend;

pub struct Dashboard {
    backend: Arc<dyn Backend>,
    validators: Vec<Validator>,
    cursors: HashMap<u64, FailingObjectCursor>,
    object_counts: HashMap<(String, String), ObjectCount>,
    debouncer: JustificationDebouncer,
    pending: Vec<JoinHandle<()>>,
    max_concurrent: usize,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self::with_settings(
            backend,
            config.editing.debounce_window(),
            config.api.max_concurrent,
        )
    }

    pub fn with_settings(
        backend: Arc<dyn Backend>,
        debounce_window: Duration,
        max_concurrent: usize,
    ) -> Self {
        let debouncer = JustificationDebouncer::new(Arc::clone(&backend), debounce_window);
        Self {
            backend,
            validators: Vec::new(),
            cursors: HashMap::new(),
            object_counts: HashMap::new(),
            debouncer,
            pending: Vec::new(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// CSRF handshake followed by the first validator fetch.
    ///
    /// A failed handshake is logged and does not stop the fetch; writes are
    /// then sent without the token header.
    pub async fn bootstrap(&mut self) -> bool {
        match self.backend.fetch_csrf_info().await {
            Ok(info) => log::debug!(
                "csrf token read from cookie {} into header {}",
                info.csrf_cookie_name,
                info.csrf_header_name
            ),
            Err(e) => log::error!("[fetch_csrf_info] {e}"),
        }
        self.refresh_validators().await
    }

    /// Replace the flat validator list with the backend's.
    ///
    /// Optimistic edits that never reached the backend are overwritten.
    pub async fn refresh_validators(&mut self) -> bool {
        let validators = match self.backend.fetch_validators().await {
            Ok(validators) => validators,
            Err(e) => {
                log::error!("[fetch_validators] {e}");
                return false;
            }
        };

        for validator in validators.iter().filter(|v| !v.counts_consistent()) {
            log::warn!(
                "[fetch_validators] validator {} reports {:?} allowed to fail out of {:?} failing",
                validator.id,
                validator.num_allowed_to_fail,
                validator.num_failing
            );
        }
        log::info!("Loaded {} validators", validators.len());
        self.validators = validators;
        true
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn validator(&self, id: u64) -> Option<&Validator> {
        self.validators.iter().find(|v| v.id == id)
    }

    /// App → Model → Validator tree of the current flat list.
    pub fn summary(&self) -> AppTree<'_> {
        aggregate(&self.validators)
    }

    /// Open a validator's failing-object list and load its first page.
    ///
    /// Any previously accumulated pages of that validator are discarded.
    /// Exception validators and validators without failures have nothing to
    /// open and return `false`.
    pub async fn open_drilldown(&mut self, validator_id: u64) -> bool {
        match self.validator(validator_id) {
            Some(validator) if validator.has_failing_objects() => {}
            Some(_) => {
                log::info!("validator {validator_id} has no failing objects to list");
                return false;
            }
            None => {
                log::warn!("[fetch_failing_objects] unknown validator {validator_id}");
                return false;
            }
        }

        if let Some(previous) = self
            .cursors
            .insert(validator_id, FailingObjectCursor::new(validator_id))
        {
            self.release_fields(&previous);
        }
        self.fetch_page(validator_id, true).await
    }

    /// Close a drill-down. Justification edits still inside the debounce
    /// window are written right away. Must be called within a Tokio runtime.
    pub fn close_drilldown(&mut self, validator_id: u64) -> Option<FailingObjectCursor> {
        let cursor = self.cursors.remove(&validator_id)?;
        self.release_fields(&cursor);
        Some(cursor)
    }

    fn release_fields(&mut self, cursor: &FailingObjectCursor) {
        for object in cursor.results() {
            if let Some(record) = self.debouncer.forget(object.id) {
                self.put_failing_object(record);
            }
        }
    }

    /// Append the next page of an open drill-down.
    pub async fn load_more(&mut self, validator_id: u64) -> bool {
        self.fetch_page(validator_id, false).await
    }

    pub fn cursor(&self, validator_id: u64) -> Option<&FailingObjectCursor> {
        self.cursors.get(&validator_id)
    }

    async fn fetch_page(&mut self, validator_id: u64, first: bool) -> bool {
        let Some(cursor) = self.cursors.get_mut(&validator_id) else {
            log::warn!("[fetch_failing_objects] drill-down of validator {validator_id} is not open");
            return false;
        };
        let begun = if first {
            cursor.begin_first()
        } else {
            cursor.begin_next()
        };
        let request = match begun {
            Ok(request) => request,
            Err(e) => {
                log::warn!("[fetch_failing_objects] {e}");
                return false;
            }
        };

        let outcome = self.backend.fetch_failing_objects(&request).await;
        match self.cursors.get_mut(&validator_id) {
            Some(cursor) => cursor.finish(outcome),
            None => false,
        }
    }

    /// Toggle `allowed_to_fail` on a loaded failing object.
    ///
    /// Local state changes immediately; the failing object and, when its
    /// status flipped, the validator are written in the background. Errors
    /// only when the object is not loaded. Must be called within a Tokio
    /// runtime.
    pub fn set_allowed_to_fail(
        &mut self,
        failing_object_id: u64,
        validator_id: u64,
        allowed: bool,
    ) -> Result<Reconciliation> {
        let cursor = self
            .cursors
            .get_mut(&validator_id)
            .ok_or_else(|| not_open(validator_id))?;
        // the written record carries the text being edited, committed or not
        if let Some(live) = self.debouncer.live_text(failing_object_id) {
            reconcile::set_justification(cursor.page_mut(), failing_object_id, &live)?;
        }
        let reconciliation = reconcile::set_allowed_to_fail(
            &mut self.validators,
            cursor.page_mut(),
            failing_object_id,
            validator_id,
            allowed,
        )?;

        if let Some(object) = &reconciliation.failing_object {
            self.debouncer.observe(object);
            self.put_failing_object(object.clone());
        }
        if let Some(validator) = &reconciliation.validator {
            self.put_validator(validator.clone());
        }
        Ok(reconciliation)
    }

    /// Register a keystroke-level edit of a justification field.
    ///
    /// Returns whether a commit was scheduled. Local state is left alone
    /// until [`blur_justification`](Self::blur_justification).
    pub fn edit_justification(
        &mut self,
        validator_id: u64,
        failing_object_id: u64,
        text: &str,
    ) -> Result<bool> {
        let object = self.loaded_object(validator_id, failing_object_id)?;
        let record = FailingObject {
            allowed_to_fail_justification: text.to_string(),
            ..object.clone()
        };
        match self.debouncer.on_edit(record) {
            Some(handle) => {
                self.track(handle);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The justification field lost focus: apply `text` locally right away.
    ///
    /// No write is issued here beyond what the debouncer already scheduled.
    pub fn blur_justification(
        &mut self,
        validator_id: u64,
        failing_object_id: u64,
        text: &str,
    ) -> Result<bool> {
        let cursor = self
            .cursors
            .get_mut(&validator_id)
            .ok_or_else(|| not_open(validator_id))?;
        let updated = reconcile::set_justification(cursor.page_mut(), failing_object_id, text)?;
        if let Some(object) = &updated {
            self.debouncer.observe(object);
        }
        Ok(updated.is_some())
    }

    /// Text currently shown in a justification field.
    pub fn justification_text(&self, validator_id: u64, failing_object_id: u64) -> Option<String> {
        self.debouncer.live_text(failing_object_id).or_else(|| {
            self.loaded_object(validator_id, failing_object_id)
                .ok()
                .map(|o| o.allowed_to_fail_justification.clone())
        })
    }

    fn loaded_object(&self, validator_id: u64, failing_object_id: u64) -> Result<&FailingObject> {
        self.cursors
            .get(&validator_id)
            .ok_or_else(|| not_open(validator_id))?
            .page()
            .get(failing_object_id)
            .ok_or_else(|| AppError::not_found(format!("failing object {failing_object_id}")))
    }

    /// Fetch the record count of every model that has validators.
    ///
    /// Runs at most `max_concurrent` requests at once. Counts that fail or
    /// time out stay [`ObjectCount::Unknown`]. Returns how many are known.
    pub async fn fetch_object_counts(&mut self) -> usize {
        let mut seen = HashSet::new();
        let pairs: Vec<(String, String)> = self
            .validators
            .iter()
            .map(|v| (v.app_label.clone(), v.model_name.clone()))
            .filter(|pair| seen.insert(pair.clone()))
            .collect();
        for pair in &pairs {
            self.object_counts.entry(pair.clone()).or_default();
        }

        let backend = &self.backend;
        let results: Vec<_> = stream::iter(pairs)
            .map(|(app_label, model_name)| async move {
                let result = backend.fetch_object_count(&app_label, &model_name).await;
                ((app_label, model_name), result)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        for (pair, result) in results {
            match result {
                Ok(count) => {
                    self.object_counts.insert(pair, ObjectCount::Known(count));
                }
                Err(e) => log::warn!("[fetch_object_count] {}.{}: {e}", pair.0, pair.1),
            }
        }

        self.object_counts
            .values()
            .filter(|count| count.known().is_some())
            .count()
    }

    pub fn object_count(&self, app_label: &str, model_name: &str) -> ObjectCount {
        self.object_counts
            .get(&(app_label.to_string(), model_name.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Background writes and debounced commits not yet finished.
    pub fn pending_writes(&self) -> usize {
        self.pending.iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every background write, including debounced commits.
    pub async fn settle(&mut self) {
        for handle in self.pending.drain(..) {
            if let Err(e) = handle.await {
                log::error!("background write task failed: {e}");
            }
        }
    }

    fn put_failing_object(&mut self, object: FailingObject) {
        let backend = Arc::clone(&self.backend);
        self.track(tokio::spawn(async move {
            if let Err(e) = backend.put_failing_object(&object).await {
                log::error!("[patch_failing_object] {}: {e}", object.id);
            }
        }));
    }

    fn put_validator(&mut self, validator: Validator) {
        let backend = Arc::clone(&self.backend);
        self.track(tokio::spawn(async move {
            if let Err(e) = backend.put_validator(&validator).await {
                log::error!("[patch_validator] {}: {e}", validator.id);
            }
        }));
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.pending.retain(|h| !h.is_finished());
        self.pending.push(handle);
    }
}

fn not_open(validator_id: u64) -> AppError {
    AppError::precondition(format!(
        "drill-down of validator {validator_id} is not open"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;
    use crate::models::fixtures::{failing_object, validator};
    use crate::services::InMemoryBackend;
    use crate::services::memory::{Endpoint, Write};

    fn failing_validator(id: u64, failing: u64, allowed: u64) -> Validator {
        let mut v = validator(id, "shop", "Order", Status::Failing);
        v.num_failing = Some(failing);
        v.num_allowed_to_fail = Some(allowed);
        v
    }

    fn setup() -> (Arc<InMemoryBackend>, Dashboard) {
        let mut broken = validator(9, "shop", "Customer", Status::Exception);
        broken.exc_type = Some("KeyError".into());
        broken.num_failing = None;

        let backend = Arc::new(
            InMemoryBackend::new(2)
                .with_validators(vec![
                    failing_validator(7, 3, 2),
                    validator(8, "shop", "Order", Status::Passing),
                    broken,
                ])
                .with_failing_objects((1..=3).map(|id| failing_object(id, 7)).collect())
                .with_object_count("shop", "Order", 100),
        );
        let dashboard = Dashboard::with_settings(backend.clone(), Duration::from_millis(1000), 2);
        (backend, dashboard)
    }

    #[tokio::test]
    async fn test_bootstrap_builds_summary() {
        let (_, mut dashboard) = setup();
        assert!(dashboard.bootstrap().await);
        assert_eq!(dashboard.validators().len(), 3);

        let tree = dashboard.summary();
        assert_eq!(tree["shop"].models["Order"].status, Status::Failing);
        assert_eq!(tree["shop"].models["Customer"].status, Status::Exception);
        assert_eq!(tree["shop"].status, Status::Exception);
    }

    #[tokio::test]
    async fn test_bootstrap_survives_csrf_failure() {
        let (backend, mut dashboard) = setup();
        backend.set_failing(Endpoint::Csrf, true);
        assert!(dashboard.bootstrap().await);
        assert_eq!(dashboard.validators().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_state() {
        let (backend, mut dashboard) = setup();
        dashboard.bootstrap().await;
        backend.set_failing(Endpoint::Validators, true);
        assert!(!dashboard.refresh_validators().await);
        assert_eq!(dashboard.validators().len(), 3);
    }

    #[tokio::test]
    async fn test_drilldown_pages_until_exhausted() {
        let (_, mut dashboard) = setup();
        dashboard.bootstrap().await;

        assert!(dashboard.open_drilldown(7).await);
        assert_eq!(dashboard.cursor(7).unwrap().results().len(), 2);
        assert!(dashboard.cursor(7).unwrap().can_load_more());

        assert!(dashboard.load_more(7).await);
        let cursor = dashboard.cursor(7).unwrap();
        assert_eq!(
            cursor.results().iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(!cursor.can_load_more());
        assert!(!dashboard.load_more(7).await);
    }

    #[tokio::test]
    async fn test_drilldown_not_offered_without_failures() {
        let (backend, mut dashboard) = setup();
        dashboard.bootstrap().await;
        assert!(!dashboard.open_drilldown(8).await);
        assert!(!dashboard.open_drilldown(9).await);
        assert!(!dashboard.open_drilldown(42).await);
        assert!(backend.page_requests().is_empty());
        assert!(dashboard.cursor(9).is_none());
    }

    #[tokio::test]
    async fn test_failed_page_can_be_retried() {
        let (backend, mut dashboard) = setup();
        dashboard.bootstrap().await;
        dashboard.open_drilldown(7).await;

        backend.set_failing(Endpoint::FailingObjects, true);
        assert!(!dashboard.load_more(7).await);
        let cursor = dashboard.cursor(7).unwrap();
        assert_eq!(cursor.results().len(), 2);
        assert!(cursor.can_load_more());

        backend.set_failing(Endpoint::FailingObjects, false);
        assert!(dashboard.load_more(7).await);
        assert_eq!(dashboard.cursor(7).unwrap().results().len(), 3);
    }

    #[tokio::test]
    async fn test_reopening_discards_pages() {
        let (_, mut dashboard) = setup();
        dashboard.bootstrap().await;
        dashboard.open_drilldown(7).await;
        dashboard.load_more(7).await;
        assert!(dashboard.close_drilldown(7).is_some());
        assert!(dashboard.cursor(7).is_none());

        dashboard.open_drilldown(7).await;
        assert_eq!(dashboard.cursor(7).unwrap().results().len(), 2);
    }

    #[tokio::test]
    async fn test_toggle_writes_object_and_validator() {
        let (backend, mut dashboard) = setup();
        dashboard.bootstrap().await;
        dashboard.open_drilldown(7).await;

        let r = dashboard.set_allowed_to_fail(1, 7, true).unwrap();
        assert!(r.validator.is_some());
        assert_eq!(dashboard.validator(7).unwrap().status, Status::Passing);
        assert_eq!(dashboard.summary()["shop"].models["Order"].status, Status::Passing);
        dashboard.settle().await;

        let writes = backend.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().any(|w| matches!(w, Write::FailingObject(o) if o.id == 1 && o.allowed_to_fail)));
        assert_eq!(backend.stored_validator(7).unwrap().status, Status::Passing);
        assert_eq!(backend.stored_validator(7).unwrap().num_allowed_to_fail, Some(3));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_local_edit() {
        let (backend, mut dashboard) = setup();
        dashboard.bootstrap().await;
        dashboard.open_drilldown(7).await;
        backend.set_failing(Endpoint::PutFailingObject, true);
        backend.set_failing(Endpoint::PutValidator, true);

        dashboard.set_allowed_to_fail(2, 7, true).unwrap();
        dashboard.settle().await;

        assert!(backend.writes().is_empty());
        assert!(dashboard.cursor(7).unwrap().page().get(2).unwrap().allowed_to_fail);
        assert_eq!(dashboard.validator(7).unwrap().status, Status::Passing);
        assert_eq!(backend.stored_validator(7).unwrap().status, Status::Failing);
    }

    #[tokio::test]
    async fn test_toggle_requires_open_drilldown() {
        let (_, mut dashboard) = setup();
        dashboard.bootstrap().await;
        let err = dashboard.set_allowed_to_fail(1, 7, true).unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_justification_edit_and_blur() {
        let (backend, mut dashboard) = setup();
        dashboard.bootstrap().await;
        dashboard.open_drilldown(7).await;

        assert!(dashboard.edit_justification(7, 1, "le").unwrap());
        assert!(dashboard.edit_justification(7, 1, "legacy").unwrap());
        assert!(!dashboard.edit_justification(7, 1, "legacy").unwrap());
        assert_eq!(dashboard.justification_text(7, 1).as_deref(), Some("legacy"));
        assert_eq!(
            dashboard.cursor(7).unwrap().page().get(1).unwrap().allowed_to_fail_justification,
            ""
        );

        assert!(dashboard.blur_justification(7, 1, "legacy").unwrap());
        assert_eq!(
            dashboard.cursor(7).unwrap().page().get(1).unwrap().allowed_to_fail_justification,
            "legacy"
        );
        assert!(backend.writes().is_empty());

        dashboard.settle().await;
        assert_eq!(backend.writes().len(), 1);
        assert_eq!(
            backend.stored_failing_object(1).unwrap().allowed_to_fail_justification,
            "legacy"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_after_commit_keeps_justification() {
        let (backend, mut dashboard) = setup();
        dashboard.bootstrap().await;
        dashboard.open_drilldown(7).await;

        dashboard.edit_justification(7, 1, "because").unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(
            backend.stored_failing_object(1).unwrap().allowed_to_fail_justification,
            "because"
        );

        dashboard.set_allowed_to_fail(1, 7, true).unwrap();
        dashboard.settle().await;

        let stored = backend.stored_failing_object(1).unwrap();
        assert!(stored.allowed_to_fail);
        assert_eq!(stored.allowed_to_fail_justification, "because");
        assert_eq!(
            dashboard.cursor(7).unwrap().page().get(1).unwrap().allowed_to_fail_justification,
            "because"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_shows_reloaded_justification() {
        let (backend, mut dashboard) = setup();
        dashboard.bootstrap().await;
        dashboard.open_drilldown(7).await;
        dashboard.edit_justification(7, 1, "draft").unwrap();
        dashboard.settle().await;

        // the server's copy changes behind our back
        let mut changed = backend.stored_failing_object(1).unwrap();
        changed.allowed_to_fail_justification = "reviewed".into();
        backend.put_failing_object(&changed).await.unwrap();

        dashboard.open_drilldown(7).await;
        assert_eq!(dashboard.justification_text(7, 1).as_deref(), Some("reviewed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending_justification() {
        let (backend, mut dashboard) = setup();
        dashboard.bootstrap().await;
        dashboard.open_drilldown(7).await;
        dashboard.edit_justification(7, 2, "wip").unwrap();

        assert!(dashboard.close_drilldown(7).is_some());
        dashboard.settle().await;

        assert_eq!(backend.writes().len(), 1);
        assert_eq!(
            backend.stored_failing_object(2).unwrap().allowed_to_fail_justification,
            "wip"
        );
        assert_eq!(dashboard.justification_text(7, 2), None);
    }

    #[tokio::test]
    async fn test_object_counts_fall_back_to_unknown() {
        let (_, mut dashboard) = setup();
        dashboard.bootstrap().await;
        assert_eq!(dashboard.object_count("shop", "Order"), ObjectCount::Unknown);

        assert_eq!(dashboard.fetch_object_counts().await, 1);
        assert_eq!(dashboard.object_count("shop", "Order"), ObjectCount::Known(100));
        assert_eq!(dashboard.object_count("shop", "Customer"), ObjectCount::Unknown);

        let unvalidated = dashboard
            .validator(7)
            .and_then(|v| v.unvalidated(dashboard.object_count("shop", "Order").known()?));
        assert_eq!(unvalidated, Some(100 - 13));
    }
}
