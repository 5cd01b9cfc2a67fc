//! Incremental accumulation of one validator's failing objects.
//!
//! The cursor never performs I/O. A fetch is started with [`begin_first`] or
//! [`begin_next`], which hand back the [`PageRequest`] to send, and finished
//! with [`finish`]. Only one fetch may be outstanding at a time.
//!
//! [`begin_first`]: FailingObjectCursor::begin_first
//! [`begin_next`]: FailingObjectCursor::begin_next
//! [`finish`]: FailingObjectCursor::finish

use crate::error::{AppError, Result};
use crate::models::{FailingObject, FailingObjectPage};
use crate::services::PageRequest;

/// Accumulated pages of a single drill-down.
#[derive(Debug, Clone)]
pub struct FailingObjectCursor {
    validator_id: u64,
    page: FailingObjectPage,
    in_flight: Option<PageRequest>,
    pages_loaded: usize,
}

impl FailingObjectCursor {
    pub fn new(validator_id: u64) -> Self {
        Self {
            validator_id,
            page: FailingObjectPage::default(),
            in_flight: None,
            pages_loaded: 0,
        }
    }

    pub fn validator_id(&self) -> u64 {
        self.validator_id
    }

    pub fn page(&self) -> &FailingObjectPage {
        &self.page
    }

    pub(crate) fn page_mut(&mut self) -> &mut FailingObjectPage {
        &mut self.page
    }

    pub fn results(&self) -> &[FailingObject] {
        &self.page.results
    }

    pub fn next(&self) -> Option<&str> {
        self.page.next.as_deref()
    }

    /// A fetch has been started and not yet finished.
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// "Load more" should be offered.
    pub fn can_load_more(&self) -> bool {
        !self.is_loading() && self.page.has_more()
    }

    /// Number of pages applied since the first page request.
    pub fn pages_loaded(&self) -> usize {
        self.pages_loaded
    }

    /// Start loading the first page, discarding everything accumulated.
    pub fn begin_first(&mut self) -> Result<PageRequest> {
        self.guard_single_flight()?;
        self.page = FailingObjectPage::default();
        self.pages_loaded = 0;
        let request = PageRequest::First {
            validator_id: self.validator_id,
        };
        self.in_flight = Some(request.clone());
        Ok(request)
    }

    /// Start loading the page behind the current continuation link.
    pub fn begin_next(&mut self) -> Result<PageRequest> {
        self.guard_single_flight()?;
        let Some(url) = self.page.next.clone() else {
            return Err(AppError::precondition(format!(
                "validator {} has no further failing-object pages",
                self.validator_id
            )));
        };
        let request = PageRequest::Next { url };
        self.in_flight = Some(request.clone());
        Ok(request)
    }

    /// Apply the outcome of the outstanding fetch.
    ///
    /// A fetched page is appended and its continuation link replaces the
    /// current one. A failure is logged and leaves the accumulated state as it
    /// was, so the same fetch can be retried. Returns whether state advanced.
    pub fn finish(&mut self, outcome: Result<FailingObjectPage>) -> bool {
        let Some(request) = self.in_flight.take() else {
            log::warn!(
                "[fetch_failing_objects] validator {}: page arrived with no fetch outstanding",
                self.validator_id
            );
            return false;
        };

        match outcome {
            Ok(page) => {
                if let Some(stray) = page.results.iter().find(|o| o.validator != self.validator_id) {
                    log::warn!(
                        "[fetch_failing_objects] failing object {} belongs to validator {}, not {}",
                        stray.id,
                        stray.validator,
                        self.validator_id
                    );
                }
                log::debug!(
                    "validator {}: {} objects from {request}",
                    self.validator_id,
                    page.results.len()
                );
                self.page.extend(page);
                self.pages_loaded += 1;
                true
            }
            Err(e) => {
                log::error!("[fetch_failing_objects] {request}: {e}");
                false
            }
        }
    }

    fn guard_single_flight(&self) -> Result<()> {
        if self.in_flight.is_some() {
            return Err(AppError::FetchInFlight {
                validator_id: self.validator_id,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::failing_object;

    fn page(ids: std::ops::RangeInclusive<u64>, next: Option<&str>) -> FailingObjectPage {
        FailingObjectPage {
            results: ids.map(|id| failing_object(id, 7)).collect(),
            next: next.map(str::to_string),
        }
    }

    #[test]
    fn test_pages_accumulate_in_order() {
        let mut cursor = FailingObjectCursor::new(7);
        assert_eq!(
            cursor.begin_first().unwrap(),
            PageRequest::First { validator_id: 7 }
        );
        assert!(cursor.finish(Ok(page(1..=5, Some("p2")))));

        assert_eq!(
            cursor.begin_next().unwrap(),
            PageRequest::Next { url: "p2".into() }
        );
        assert!(cursor.finish(Ok(page(6..=10, Some("p3")))));
        assert_eq!(cursor.next(), Some("p3"));

        cursor.begin_next().unwrap();
        assert!(cursor.finish(Ok(page(11..=12, None))));

        let ids: Vec<u64> = cursor.results().iter().map(|o| o.id).collect();
        assert_eq!(ids, (1..=12).collect::<Vec<_>>());
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.pages_loaded(), 3);
        assert!(!cursor.can_load_more());
    }

    #[test]
    fn test_second_fetch_rejected_while_in_flight() {
        let mut cursor = FailingObjectCursor::new(7);
        cursor.begin_first().unwrap();
        assert!(cursor.is_loading());
        assert!(matches!(
            cursor.begin_first(),
            Err(AppError::FetchInFlight { validator_id: 7 })
        ));

        cursor.finish(Ok(page(1..=2, Some("p2"))));
        cursor.begin_next().unwrap();
        assert!(!cursor.can_load_more());
        assert!(matches!(
            cursor.begin_next(),
            Err(AppError::FetchInFlight { .. })
        ));
    }

    #[test]
    fn test_failed_fetch_keeps_last_good_state() {
        let mut cursor = FailingObjectCursor::new(7);
        cursor.begin_first().unwrap();
        cursor.finish(Ok(page(1..=5, Some("p2"))));

        cursor.begin_next().unwrap();
        assert!(!cursor.finish(Err(AppError::Status {
            url: "p2".into(),
            status: 500
        })));
        assert!(!cursor.is_loading());
        assert_eq!(cursor.results().len(), 5);
        assert_eq!(cursor.next(), Some("p2"));

        // retry succeeds from the same link
        assert_eq!(
            cursor.begin_next().unwrap(),
            PageRequest::Next { url: "p2".into() }
        );
        cursor.finish(Ok(page(6..=6, None)));
        assert_eq!(cursor.results().len(), 6);
    }

    #[test]
    fn test_next_without_link_is_precondition_error() {
        let mut cursor = FailingObjectCursor::new(7);
        let err = cursor.begin_next().unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));
        assert!(!cursor.is_loading());
    }

    #[test]
    fn test_first_page_replaces_accumulated() {
        let mut cursor = FailingObjectCursor::new(7);
        cursor.begin_first().unwrap();
        cursor.finish(Ok(page(1..=5, Some("p2"))));

        cursor.begin_first().unwrap();
        assert!(cursor.results().is_empty());
        cursor.finish(Ok(page(1..=3, None)));
        assert_eq!(cursor.results().len(), 3);
        assert_eq!(cursor.pages_loaded(), 1);
    }

    #[test]
    fn test_unsolicited_page_ignored() {
        let mut cursor = FailingObjectCursor::new(7);
        assert!(!cursor.finish(Ok(page(1..=2, None))));
        assert!(cursor.results().is_empty());
    }
}
