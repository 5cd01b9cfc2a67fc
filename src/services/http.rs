// src/services/http.rs

//! reqwest implementation of [`Backend`].

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderName, HeaderValue};
use serde_json::Value;
use url::Url;

use crate::error::Result;
use crate::models::{ApiConfig, CsrfInfo, FailingObject, FailingObjectPage, Validator};
use crate::schema;
use crate::services::{Backend, PageRequest};
use crate::utils::http::{create_async_client, ensure_success};
use crate::utils::url::{endpoint, resolve};

/// Backend talking to the REST API over HTTP.
pub struct HttpBackend {
    client: Client,
    jar: Arc<Jar>,
    base: Url,
    config: ApiConfig,
    csrf: RwLock<Option<CsrfInfo>>,
}

impl HttpBackend {
    /// Create a backend rooted at `config.base_url`.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = create_async_client(config, Arc::clone(&jar))?;
        let base = Url::parse(&config.base_url)?;
        Ok(Self {
            client,
            jar,
            base,
            config: config.clone(),
            csrf: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        endpoint(self.base.as_str(), segments)
    }

    async fn get_json(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = ensure_success(request.send().await?)?;
        Ok(response.json::<Value>().await?)
    }

    async fn put_json<T: serde::Serialize + Sync>(&self, url: Url, body: &T) -> Result<()> {
        let mut request = self.client.put(url.clone()).json(body);
        if let Some((name, value)) = self.csrf_header(&url) {
            request = request.header(name, value);
        }
        ensure_success(request.send().await?)?;
        Ok(())
    }

    /// CSRF header for a write to `url`, when the handshake succeeded and the
    /// token cookie is present.
    fn csrf_header(&self, url: &Url) -> Option<(HeaderName, HeaderValue)> {
        let guard = self.csrf.read();
        let info = guard.as_ref()?;
        let cookies = self.jar.cookies(url)?;
        let token = cookie_value(cookies.to_str().ok()?, &info.csrf_cookie_name)?;

        let name = match HeaderName::from_bytes(info.csrf_header_name.as_bytes()) {
            Ok(name) => name,
            Err(e) => {
                log::warn!("[csrf] invalid header name {:?}: {e}", info.csrf_header_name);
                return None;
            }
        };
        let value = HeaderValue::from_str(token).ok()?;
        Some((name, value))
    }
}

/// Value of cookie `name` in a `Cookie:` header string.
fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_csrf_info(&self) -> Result<CsrfInfo> {
        let url = self.url(&["meta/csrf/"])?;
        let info = schema::decode_csrf_info(self.get_json(self.client.get(url)).await?)?;
        log::debug!(
            "CSRF header {} / cookie {}",
            info.csrf_header_name,
            info.csrf_cookie_name
        );
        *self.csrf.write() = Some(info.clone());
        Ok(info)
    }

    async fn fetch_object_count(&self, app_label: &str, model_name: &str) -> Result<u64> {
        let url = self.url(&["meta/object-counts/"])?;
        let request = self
            .client
            .get(url)
            .query(&[("appLabel", app_label), ("modelName", model_name)])
            .timeout(self.config.object_count_timeout());
        schema::decode_object_count(self.get_json(request).await?)
    }

    async fn fetch_validators(&self) -> Result<Vec<Validator>> {
        let url = self.url(&["validator-summary/"])?;
        schema::decode_validators(self.get_json(self.client.get(url)).await?)
    }

    async fn put_validator(&self, validator: &Validator) -> Result<()> {
        let url = self.url(&["validator-summary/", &format!("{}/", validator.id)])?;
        self.put_json(url, validator).await
    }

    async fn fetch_failing_objects(&self, request: &PageRequest) -> Result<FailingObjectPage> {
        let builder = match request {
            PageRequest::First { validator_id } => {
                let url = self.url(&["failing-objects/"])?;
                let mut query = vec![("validator_id", validator_id.to_string())];
                if let Some(size) = self.config.page_size {
                    query.push(("page_size", size.to_string()));
                }
                self.client.get(url).query(&query)
            }
            PageRequest::Next { url } => self.client.get(resolve(&self.base, url)?),
        };
        schema::decode_failing_object_page(self.get_json(builder).await?)
    }

    async fn put_failing_object(&self, object: &FailingObject) -> Result<()> {
        let url = self.url(&["failing-objects/", &format!("{}/", object.id)])?;
        self.put_json(url, object).await
    }
}
