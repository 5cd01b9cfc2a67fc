//! Small payloads from the `meta/` endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Names the backend uses for its cross-site-request-forgery token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CsrfInfo {
    /// Header that must carry the token on mutating requests
    pub csrf_header_name: String,
    /// Cookie the token is read from
    pub csrf_cookie_name: String,
}

/// Total record count of a model, fetched lazily.
///
/// Stays `Unknown` when the count request fails or times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectCount {
    #[default]
    Unknown,
    Known(u64),
}

impl ObjectCount {
    pub fn known(self) -> Option<u64> {
        match self {
            ObjectCount::Known(n) => Some(n),
            ObjectCount::Unknown => None,
        }
    }
}

impl fmt::Display for ObjectCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectCount::Known(n) => write!(f, "{n}"),
            ObjectCount::Unknown => f.write_str("?"),
        }
    }
}
