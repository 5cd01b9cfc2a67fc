// src/lib.rs

//! Data-validation dashboard client library

pub mod dashboard;
pub mod error;
pub mod models;
pub mod render;
pub mod schema;
pub mod services;
pub mod utils;
