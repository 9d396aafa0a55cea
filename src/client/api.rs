//! JSON client: sends JSON bodies, decodes JSON responses and maps failures onto
//! [`TrencherError`].

use super::url::build_full_url;
use crate::config::TrencherConfig;
use crate::error::{handle_error, ErrorBody, ErrorHandler, TrencherError};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        ClientConfig {
            base_url: Some(base_url.into()),
        }
    }

    /// Base URL from `API_BASE_URL`.
    pub fn from_env() -> Self {
        TrencherConfig::from_env().client_config()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

/// Decodes a Trencher error envelope back into the same error; anything else is `Api(status)`.
fn error_from_body(code: u16, bytes: &[u8]) -> TrencherError {
    if let Ok(body) = serde_json::from_slice::<ErrorBody>(bytes) {
        return body.into();
    }
    let mut error = TrencherError::api(code);
    if !bytes.is_empty() {
        error.add_property("body", String::from_utf8_lossy(bytes).into_owned());
    }
    error
}

pub(crate) async fn read_response(response: Response) -> Result<Value, TrencherError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if !status.is_success() {
        return Err(error_from_body(status.as_u16(), &bytes));
    }
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| {
        TrencherError::api(status.as_u16())
            .with_message("Response is not valid JSON")
            .with_property("reason", e.to_string())
    })
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http_client(reqwest::Client::new(), config)
    }

    /// Reuses an existing client (timeouts, proxies and pooling come from it).
    pub fn with_http_client(http: reqwest::Client, config: ClientConfig) -> Self {
        ApiClient { http, config }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.config.base_url.as_deref()
    }

    /// Affects only this client.
    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.config.base_url = Some(base_url.into());
    }

    pub fn url_for(&self, route: &str) -> String {
        build_full_url(self.base_url(), route)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Sends `request` and routes any failure through [`handle_error`].
    pub(crate) async fn dispatch(
        &self,
        request: RequestBuilder,
        on_error: Option<&ErrorHandler>,
    ) -> Result<Value, TrencherError> {
        let result = match request.send().await {
            Ok(response) => read_response(response).await,
            Err(e) => Err(e.into()),
        };
        result.or_else(|e| handle_error(e, on_error))
    }

    async fn send_json(
        &self,
        method: Method,
        route: &str,
        body: Option<&Value>,
        on_error: Option<&ErrorHandler>,
    ) -> Result<Value, TrencherError> {
        let url = self.url_for(route);
        tracing::debug!(%method, url = %url, "sending request");
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.dispatch(request, on_error).await
    }

    pub async fn get(&self, route: &str, on_error: Option<&ErrorHandler>) -> Result<Value, TrencherError> {
        self.send_json(Method::GET, route, None, on_error).await
    }

    pub async fn post(
        &self,
        route: &str,
        body: Option<&Value>,
        on_error: Option<&ErrorHandler>,
    ) -> Result<Value, TrencherError> {
        self.send_json(Method::POST, route, body, on_error).await
    }

    pub async fn put(
        &self,
        route: &str,
        body: Option<&Value>,
        on_error: Option<&ErrorHandler>,
    ) -> Result<Value, TrencherError> {
        self.send_json(Method::PUT, route, body, on_error).await
    }

    pub async fn patch(
        &self,
        route: &str,
        body: Option<&Value>,
        on_error: Option<&ErrorHandler>,
    ) -> Result<Value, TrencherError> {
        self.send_json(Method::PATCH, route, body, on_error).await
    }

    pub async fn delete(&self, route: &str, on_error: Option<&ErrorHandler>) -> Result<Value, TrencherError> {
        self.send_json(Method::DELETE, route, None, on_error).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn set_base_url_is_idempotent() {
        let mut client = ApiClient::new(ClientConfig::default());
        assert_eq!(client.url_for("users"), "/users");
        client.set_base_url("https://api.example.com");
        let first = client.url_for("users");
        client.set_base_url("https://api.example.com");
        assert_eq!(client.url_for("users"), first);
        assert_eq!(first, "https://api.example.com/users");
    }

    #[test]
    fn error_envelopes_decode_to_the_same_kind() {
        let sent = TrencherError::forbidden().with_property("role", "guest");
        let bytes = serde_json::to_vec(&ErrorBody::from(sent.clone())).unwrap();
        assert_eq!(error_from_body(403, &bytes), sent);
    }

    #[test]
    fn foreign_error_bodies_become_api_errors() {
        let err = error_from_body(502, b"upstream down");
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.code(), 502);
        assert_eq!(err.metadata().get("body"), Some(&json!("upstream down")));
        assert!(!error_from_body(500, b"").has_metadata());
    }
}
