// src/utils/http.rs

//! HTTP client utilities.

use std::sync::Arc;

use reqwest::cookie::Jar;

use crate::error::Result;
use crate::models::ApiConfig;

/// Create a configured asynchronous HTTP client sharing `jar` for cookies.
///
/// The jar is kept by the caller so the CSRF token cookie can be read back.
pub fn create_async_client(config: &ApiConfig, jar: Arc<Jar>) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .cookie_provider(jar)
        .build()?;
    Ok(client)
}

/// Turn a non-success response into an error, passing success through.
pub fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(crate::error::AppError::Status {
            url: response.url().to_string(),
            status: status.as_u16(),
        })
    }
}
