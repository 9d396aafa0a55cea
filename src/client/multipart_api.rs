//! Multipart client: bodies go through the preparation pipeline for the configured platform
//! before anything is sent.

use super::api::{ApiClient, ClientConfig};
use crate::error::{ErrorHandler, TrencherError};
use crate::multipart::{prepare_data, Payload, Platform};
use reqwest::Method;
use serde_json::Value;

#[derive(Clone, Debug, Default)]
pub struct MultipartApiClient {
    inner: ApiClient,
    platform: Platform,
}

impl MultipartApiClient {
    pub fn new(config: ClientConfig, platform: Platform) -> Self {
        MultipartApiClient {
            inner: ApiClient::new(config),
            platform,
        }
    }

    pub fn from_client(inner: ApiClient, platform: Platform) -> Self {
        MultipartApiClient { inner, platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn base_url(&self) -> Option<&str> {
        self.inner.base_url()
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.inner.set_base_url(base_url);
    }

    /// Preparation errors are returned as-is; only transport and response failures reach
    /// `on_error`.
    async fn send_form(
        &self,
        method: Method,
        route: &str,
        payload: Payload,
        on_error: Option<&ErrorHandler>,
    ) -> Result<Value, TrencherError> {
        let prepared = prepare_data(payload, self.platform)?;
        let form = prepared.body.into_form().await?;
        let url = self.inner.url_for(route);
        tracing::debug!(%method, url = %url, platform = %self.platform, "sending multipart request");
        // reqwest sets the content type with its boundary for the form.
        let request = self.inner.http().request(method, url).multipart(form);
        self.inner.dispatch(request, on_error).await
    }

    pub async fn get(&self, route: &str, on_error: Option<&ErrorHandler>) -> Result<Value, TrencherError> {
        self.inner.get(route, on_error).await
    }

    pub async fn post(
        &self,
        route: &str,
        payload: Payload,
        on_error: Option<&ErrorHandler>,
    ) -> Result<Value, TrencherError> {
        self.send_form(Method::POST, route, payload, on_error).await
    }

    pub async fn put(
        &self,
        route: &str,
        payload: Payload,
        on_error: Option<&ErrorHandler>,
    ) -> Result<Value, TrencherError> {
        self.send_form(Method::PUT, route, payload, on_error).await
    }

    pub async fn patch(
        &self,
        route: &str,
        payload: Payload,
        on_error: Option<&ErrorHandler>,
    ) -> Result<Value, TrencherError> {
        self.send_form(Method::PATCH, route, payload, on_error).await
    }

    pub async fn delete(&self, route: &str, on_error: Option<&ErrorHandler>) -> Result<Value, TrencherError> {
        self.inner.delete(route, on_error).await
    }
}
