//! Service layer for the dashboard.
//!
//! This module contains the REST backend seam:
//! - The endpoint contract (`Backend`, `PageRequest`)
//! - The HTTP implementation (`HttpBackend`)
//! - An in-memory implementation for tests (`InMemoryBackend`)

mod backend;
mod http;
pub mod memory;

pub use backend::{Backend, PageRequest};
pub use http::HttpBackend;
pub use memory::InMemoryBackend;
