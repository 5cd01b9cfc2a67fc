//! Failing-object records and their paginated envelope.

use serde::{Deserialize, Serialize};

/// One record that failed a specific validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailingObject {
    pub id: u64,
    /// Owning validator id
    pub validator: u64,
    /// Primary key of the failing record in its own table
    pub object_pk: i64,
    pub comment: String,
    pub allowed_to_fail: bool,
    pub allowed_to_fail_justification: String,
    /// Admin change URL, or empty
    pub admin_page: String,
}

impl FailingObject {
    pub fn admin_page(&self) -> Option<&str> {
        if self.admin_page.is_empty() {
            None
        } else {
            Some(&self.admin_page)
        }
    }
}

/// Accumulated failing objects for one validator drill-down.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailingObjectPage {
    pub results: Vec<FailingObject>,
    /// Continuation URL, `None` once exhausted
    pub next: Option<String>,
}

impl FailingObjectPage {
    /// Append a freshly fetched page, taking over its continuation token.
    pub fn extend(&mut self, page: FailingObjectPage) {
        self.results.extend(page.results);
        self.next = page.next;
    }

    pub fn get(&self, id: u64) -> Option<&FailingObject> {
        self.results.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut FailingObject> {
        self.results.iter_mut().find(|o| o.id == id)
    }

    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}
