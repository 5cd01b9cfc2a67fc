//! Dashboard core: everything between the backend and the rendering layer.
//!
//! - `aggregate`: flat validator list to App → Model → Validator tree
//! - `cursor`: single-flight failing-object pagination
//! - `reconcile`: optimistic `allowed_to_fail` and justification edits
//! - `debounce`: per-field deferred justification commits
//! - `state`: the `Dashboard` container tying them together

pub mod aggregate;
pub mod cursor;
pub mod debounce;
pub mod reconcile;
pub mod state;

pub use aggregate::{aggregate, roll_up};
pub use cursor::FailingObjectCursor;
pub use debounce::JustificationDebouncer;
pub use reconcile::Reconciliation;
pub use state::Dashboard;
