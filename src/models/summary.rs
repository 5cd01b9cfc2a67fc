// src/models/summary.rs

//! Derived App and Model nodes of the status tree.
//!
//! These borrow from the flat validator list they were built from and are
//! rebuilt after every change to it; nothing here is ever edited in place.

use indexmap::IndexMap;

use super::{Status, Validator};

/// Apps keyed by `app_label`, in first-seen order.
pub type AppTree<'a> = IndexMap<&'a str, AppSummary<'a>>;

/// All validators sharing an `app_label`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSummary<'a> {
    pub app_label: &'a str,
    pub status: Status,
    /// Models keyed by `model_name`, in first-seen order
    pub models: IndexMap<&'a str, ModelSummary<'a>>,
}

impl<'a> AppSummary<'a> {
    pub fn new(app_label: &'a str) -> Self {
        Self {
            app_label,
            status: Status::Passing,
            models: IndexMap::new(),
        }
    }

    /// Total validators across all models of this app.
    pub fn validator_count(&self) -> usize {
        self.models.values().map(|m| m.validators.len()).sum()
    }

    /// Iterate over every validator in the app, model by model.
    pub fn validators(&self) -> impl Iterator<Item = &'a Validator> + '_ {
        self.models.values().flat_map(|m| m.validators.iter().copied())
    }
}

/// All validators sharing an `(app_label, model_name)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSummary<'a> {
    pub app_label: &'a str,
    pub model_name: &'a str,
    pub status: Status,
    /// Members in input order
    pub validators: Vec<&'a Validator>,
}

impl<'a> ModelSummary<'a> {
    pub fn new(app_label: &'a str, model_name: &'a str) -> Self {
        Self {
            app_label,
            model_name,
            status: Status::Passing,
            validators: Vec::new(),
        }
    }

    /// Sum of `num_failing` over members that report it.
    pub fn failing_total(&self) -> u64 {
        self.validators.iter().filter_map(|v| v.num_failing).sum()
    }
}
