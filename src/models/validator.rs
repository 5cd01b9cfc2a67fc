//! Validator record as served by `validator-summary/`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Status;

/// A named check run against one `(app_label, model_name)` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Validator {
    pub id: u64,
    pub app_label: String,
    pub model_name: String,
    pub method_name: String,
    pub description: String,
    pub is_class_method: bool,
    /// ISO 8601 timestamp, kept verbatim so a full-record PUT echoes it back
    pub last_run_time: Option<String>,
    pub status: Status,
    pub num_passing: Option<u64>,
    pub num_failing: Option<u64>,
    pub num_na: Option<u64>,
    pub num_allowed_to_fail: Option<u64>,
    pub exc_type: Option<String>,
    pub exc_traceback: Option<String>,
    pub exc_obj_pk: Option<i64>,
}

impl Validator {
    /// The validator raised instead of evaluating records.
    pub fn is_exception(&self) -> bool {
        self.exc_type.is_some()
    }

    /// Passing, failing and N/A counts are all null.
    pub fn never_run(&self) -> bool {
        self.num_passing.is_none() && self.num_failing.is_none() && self.num_na.is_none()
    }

    /// Allowed-to-fail count as it should be shown: hidden for never-run validators.
    pub fn displayed_allowed_to_fail(&self) -> Option<u64> {
        if self.never_run() {
            None
        } else {
            self.num_allowed_to_fail
        }
    }

    /// Number of records the validator evaluated; `None` on overflow.
    pub fn total_validated(&self) -> Option<u64> {
        self.num_passing?
            .checked_add(self.num_failing?)?
            .checked_add(self.num_na?)
    }

    /// Records of the model the validator has not yet evaluated. Negative
    /// when the counts disagree with the total; `None` out of `i64` range.
    pub fn unvalidated(&self, total_objects: u64) -> Option<i64> {
        let validated = i64::try_from(self.total_validated()?).ok()?;
        i64::try_from(total_objects).ok()?.checked_sub(validated)
    }

    /// Status implied by the counts: Exception overrides, then Passing when
    /// every failure is allowed to fail, Failing otherwise. Falls back to the
    /// stored status when the counts are not meaningful.
    pub fn derived_status(&self) -> Status {
        if self.is_exception() {
            return Status::Exception;
        }
        match (self.num_failing, self.num_allowed_to_fail) {
            (Some(failing), Some(allowed)) if failing == allowed => Status::Passing,
            (Some(_), Some(_)) => Status::Failing,
            _ => self.status,
        }
    }

    /// Check the count invariant `0 <= num_allowed_to_fail <= num_failing`.
    ///
    /// Only applies to non-exception validators whose passing, failing and
    /// N/A counts are all present.
    pub fn counts_consistent(&self) -> bool {
        if self.is_exception() || self.total_validated().is_none() {
            return true;
        }
        match (self.num_allowed_to_fail, self.num_failing) {
            (Some(allowed), Some(failing)) => allowed <= failing,
            _ => true,
        }
    }

    /// Whether there is a failing-object list worth opening.
    pub fn has_failing_objects(&self) -> bool {
        !self.is_exception() && self.num_failing.unwrap_or(0) > 0
    }

    /// Parsed `last_run_time`. Naive timestamps are read as UTC.
    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_run_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }

    /// One-line description of the raised exception.
    pub fn exception_summary(&self) -> Option<String> {
        let exc_type = self.exc_type.as_deref()?;
        Some(match self.exc_obj_pk {
            Some(pk) => format!("{exc_type} at object id: {pk}"),
            None => exc_type.to_string(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Validator fixture with counts, grouped under `app`/`model`.
    pub(crate) fn validator(id: u64, app: &str, model: &str, status: Status) -> Validator {
        Validator {
            id,
            app_label: app.to_string(),
            model_name: model.to_string(),
            method_name: format!("check_{id}"),
            description: String::new(),
            is_class_method: false,
            last_run_time: Some("2024-03-01T10:00:00Z".to_string()),
            status,
            num_passing: Some(10),
            num_failing: Some(0),
            num_na: Some(0),
            num_allowed_to_fail: Some(0),
            exc_type: None,
            exc_traceback: None,
            exc_obj_pk: None,
        }
    }

    #[test]
    fn test_derived_status() {
        let mut v = validator(1, "a", "m", Status::Passing);
        assert_eq!(v.derived_status(), Status::Passing);

        v.num_failing = Some(3);
        v.num_allowed_to_fail = Some(2);
        assert_eq!(v.derived_status(), Status::Failing);

        v.num_allowed_to_fail = Some(3);
        assert_eq!(v.derived_status(), Status::Passing);

        v.exc_type = Some("ValueError".into());
        assert_eq!(v.derived_status(), Status::Exception);
    }

    #[test]
    fn test_never_run_hides_allowed_to_fail() {
        let mut v = validator(1, "a", "m", Status::Uninitialized);
        v.num_passing = None;
        v.num_failing = None;
        v.num_na = None;
        v.num_allowed_to_fail = Some(0);
        assert!(v.never_run());
        assert_eq!(v.displayed_allowed_to_fail(), None);
        assert_eq!(v.total_validated(), None);
        assert_eq!(v.unvalidated(50), None);
    }

    #[test]
    fn test_unvalidated() {
        let mut v = validator(1, "a", "m", Status::Failing);
        v.num_passing = Some(5);
        v.num_failing = Some(2);
        v.num_na = Some(1);
        assert_eq!(v.total_validated(), Some(8));
        assert_eq!(v.unvalidated(10), Some(2));
    }

    #[test]
    fn test_huge_counts_do_not_overflow() {
        let mut v = validator(1, "a", "m", Status::Passing);
        v.num_passing = Some(u64::MAX);
        assert_eq!(v.total_validated(), None);
        assert_eq!(v.unvalidated(10), None);

        v.num_passing = Some(u64::MAX - 10);
        assert_eq!(v.total_validated(), Some(u64::MAX - 10));
        assert_eq!(v.unvalidated(10), None);

        v.num_passing = Some(5);
        assert_eq!(v.unvalidated(u64::MAX), None);
    }

    #[test]
    fn test_counts_consistent() {
        let mut v = validator(1, "a", "m", Status::Failing);
        v.num_failing = Some(1);
        v.num_allowed_to_fail = Some(2);
        assert!(!v.counts_consistent());

        v.exc_type = Some("KeyError".into());
        assert!(v.counts_consistent());
    }

    #[test]
    fn test_last_run_at() {
        let mut v = validator(1, "a", "m", Status::Passing);
        let at = v.last_run_at().unwrap();
        assert_eq!(at.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-03-01 10:00:00");

        v.last_run_time = Some("2024-03-01T10:00:00.250000".into());
        assert!(v.last_run_at().is_some());

        v.last_run_time = Some("yesterday".into());
        assert!(v.last_run_at().is_none());
    }

    #[test]
    fn test_exception_summary() {
        let mut v = validator(1, "a", "m", Status::Exception);
        assert_eq!(v.exception_summary(), None);
        v.exc_type = Some("ZeroDivisionError".into());
        assert_eq!(v.exception_summary().unwrap(), "ZeroDivisionError");
        v.exc_obj_pk = Some(42);
        assert_eq!(
            v.exception_summary().unwrap(),
            "ZeroDivisionError at object id: 42"
        );
        assert!(!v.has_failing_objects());
    }
}
