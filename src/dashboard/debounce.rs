//! Deferred commit of justification text.
//!
//! Each edited field gets its own deferred task per change. When the quiet
//! window has passed, the task compares the text it was scheduled with to the
//! field's live text; only if they still match is the record written. Newer
//! edits therefore supersede older tasks without any cancellation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::models::FailingObject;
use crate::services::Backend;

#[derive(Debug, Clone)]
struct FieldState {
    /// Text of the most recent edit that scheduled a commit
    last_seen: Option<String>,
    /// Current content of the editing control
    live: String,
    /// Latest local copy of the record the field belongs to
    record: FailingObject,
    /// An edit has been scheduled but `live` has not been written yet
    uncommitted: bool,
}

/// Per-field debouncer for `allowed_to_fail_justification` edits.
#[derive(Clone)]
pub struct JustificationDebouncer {
    backend: Arc<dyn Backend>,
    window: Duration,
    fields: Arc<Mutex<HashMap<u64, FieldState>>>,
}

impl JustificationDebouncer {
    pub fn new(backend: Arc<dyn Backend>, window: Duration) -> Self {
        Self {
            backend,
            window,
            fields: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an edit of `record`'s justification field.
    ///
    /// `record` is the local failing object with the edited text already in
    /// place. Returns the handle of the scheduled commit, or `None` when the
    /// text equals the previous edit. Must be called within a Tokio runtime.
    pub fn on_edit(&self, record: FailingObject) -> Option<JoinHandle<()>> {
        let text = record.allowed_to_fail_justification.clone();
        let id = record.id;
        {
            let mut fields = self.fields.lock();
            let field = fields.entry(id).or_insert_with(|| FieldState {
                last_seen: None,
                live: text.clone(),
                record: record.clone(),
                uncommitted: false,
            });
            field.live = text.clone();
            field.record = record;
            if field.last_seen.as_deref() == Some(text.as_str()) {
                return None;
            }
            field.last_seen = Some(text.clone());
            field.uncommitted = true;
        }

        let backend = Arc::clone(&self.backend);
        let fields = Arc::clone(&self.fields);
        let window = self.window;
        Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;

            let due = {
                let mut fields = fields.lock();
                fields
                    .get_mut(&id)
                    .filter(|field| field.live == text)
                    .map(|field| {
                        field.uncommitted = false;
                        FailingObject {
                            allowed_to_fail_justification: text.clone(),
                            ..field.record.clone()
                        }
                    })
            };

            match due {
                Some(record) => {
                    if let Err(e) = backend.put_failing_object(&record).await {
                        log::error!("[patch_failing_object] justification of {id}: {e}");
                    }
                }
                None => log::trace!("justification commit for {id} superseded"),
            }
        }))
    }

    /// Keep a field's copy of its record current after other local edits,
    /// so a later commit does not write stale values back.
    pub fn observe(&self, object: &FailingObject) {
        if let Some(field) = self.fields.lock().get_mut(&object.id) {
            field.record = FailingObject {
                allowed_to_fail_justification: field.live.clone(),
                ..object.clone()
            };
        }
    }

    /// Live text of a field that has been edited.
    pub fn live_text(&self, failing_object_id: u64) -> Option<String> {
        self.fields
            .lock()
            .get(&failing_object_id)
            .map(|field| field.live.clone())
    }

    /// Drop a field's state once its record leaves the page.
    ///
    /// Scheduled commits for the field become no-ops. When the last edit was
    /// still waiting out the window, the record carrying it is returned so
    /// the caller can write it now.
    pub fn forget(&self, failing_object_id: u64) -> Option<FailingObject> {
        let field = self.fields.lock().remove(&failing_object_id)?;
        field.uncommitted.then(|| FailingObject {
            allowed_to_fail_justification: field.live,
            ..field.record
        })
    }
}
