//! Optimistic application of failing-object edits to local state.
//!
//! Everything here is synchronous and performs no I/O: an edit is applied to
//! the in-memory records immediately and the records that must then be
//! written to the backend are handed back to the caller.

use crate::error::{AppError, Result};
use crate::models::{FailingObject, FailingObjectPage, Status, Validator};

/// Records to write after an edit has been applied locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// The edited failing object
    pub failing_object: Option<FailingObject>,
    /// The owning validator, present only when its status flipped
    pub validator: Option<Validator>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.failing_object.is_none() && self.validator.is_none()
    }
}

/// Set `allowed_to_fail` on a failing object and keep its validator's
/// allowed-to-fail count and status in step.
///
/// Setting the flag to the value it already has changes nothing. Exception
/// validators and validators without counts keep their counts and status.
pub fn set_allowed_to_fail(
    validators: &mut [Validator],
    page: &mut FailingObjectPage,
    failing_object_id: u64,
    validator_id: u64,
    allowed: bool,
) -> Result<Reconciliation> {
    let object = page
        .get_mut(failing_object_id)
        .ok_or_else(|| AppError::not_found(format!("failing object {failing_object_id}")))?;

    if object.allowed_to_fail == allowed {
        return Ok(Reconciliation::default());
    }
    object.allowed_to_fail = allowed;
    let mut reconciliation = Reconciliation {
        failing_object: Some(object.clone()),
        validator: None,
    };

    match validators.iter_mut().find(|v| v.id == validator_id) {
        Some(validator) => {
            if apply_toggle(validator, allowed) {
                reconciliation.validator = Some(validator.clone());
            }
        }
        None => log::warn!(
            "[set_allowed_to_fail] validator {validator_id} not loaded; counts left untouched"
        ),
    }

    Ok(reconciliation)
}

/// Adjust the allowed-to-fail count for one toggle. Returns whether the
/// status changed.
fn apply_toggle(validator: &mut Validator, allowed: bool) -> bool {
    if validator.is_exception() {
        return false;
    }
    let (Some(failing), Some(count)) = (validator.num_failing, validator.num_allowed_to_fail)
    else {
        return false;
    };

    let count = if allowed {
        (count + 1).min(failing)
    } else {
        count.saturating_sub(1)
    };
    validator.num_allowed_to_fail = Some(count);

    let status = if allowed && count == failing {
        Status::Passing
    } else if !allowed && count + 1 == failing {
        Status::Failing
    } else {
        validator.status
    };

    if status == validator.status {
        return false;
    }
    log::debug!(
        "validator {} {} -> {} ({count}/{failing} allowed to fail)",
        validator.id,
        validator.status,
        status
    );
    validator.status = status;
    true
}

/// Replace a failing object's justification text locally.
///
/// Returns the updated record, or `None` when the text was already current.
pub fn set_justification(
    page: &mut FailingObjectPage,
    failing_object_id: u64,
    text: &str,
) -> Result<Option<FailingObject>> {
    let object = page
        .get_mut(failing_object_id)
        .ok_or_else(|| AppError::not_found(format!("failing object {failing_object_id}")))?;
    if object.allowed_to_fail_justification == text {
        return Ok(None);
    }
    object.allowed_to_fail_justification = text.to_string();
    Ok(Some(object.clone()))
}
