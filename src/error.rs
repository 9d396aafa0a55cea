//! Typed error taxonomy, HTTP mapping and client-side error reporting.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Tag of a [`TrencherError`]. Dispatch on this instead of on concrete error types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InternalServer,
    InternalLibrary,
    Api,
    ResourceNotFound,
    Forbidden,
    IllegalRequest,
    UnprocessableEntity,
    Validation,
    Login,
    Custom,
}

impl ErrorKind {
    /// Code a kind carries when the caller does not supply one. `None` means caller-supplied.
    pub fn default_code(self) -> Option<u16> {
        match self {
            ErrorKind::InternalServer | ErrorKind::InternalLibrary => Some(500),
            ErrorKind::ResourceNotFound => Some(404),
            ErrorKind::Forbidden => Some(403),
            ErrorKind::IllegalRequest => Some(451),
            ErrorKind::UnprocessableEntity => Some(422),
            ErrorKind::Login => Some(401),
            ErrorKind::Api | ErrorKind::Validation | ErrorKind::Custom => None,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::InternalServer => "Internal Server Error",
            ErrorKind::InternalLibrary => "Internal Trencher Error",
            ErrorKind::Api => "API error",
            ErrorKind::ResourceNotFound => "Resource not found",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::IllegalRequest => "Unavailable for legal reasons",
            ErrorKind::UnprocessableEntity => "Unprocessable Entity",
            ErrorKind::Validation => "Validation Error",
            ErrorKind::Login => "Invalid credentials",
            ErrorKind::Custom => "Trencher error",
        }
    }
}

/// Error shared by the server chains and the client helpers.
///
/// `code` is fixed at construction; metadata keys are caller-defined and never validated.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code} {message}")]
pub struct TrencherError {
    kind: ErrorKind,
    message: String,
    code: u16,
    metadata: Map<String, Value>,
    errors: Option<Vec<Value>>,
}

impl TrencherError {
    fn with_kind(kind: ErrorKind, code: u16) -> Self {
        TrencherError {
            kind,
            message: kind.default_message().to_string(),
            code,
            metadata: Map::new(),
            errors: None,
        }
    }

    pub fn internal_server() -> Self {
        Self::with_kind(ErrorKind::InternalServer, 500)
    }

    pub fn internal_library() -> Self {
        Self::with_kind(ErrorKind::InternalLibrary, 500)
    }

    pub fn api(code: u16) -> Self {
        Self::with_kind(ErrorKind::Api, code)
    }

    pub fn not_found() -> Self {
        Self::with_kind(ErrorKind::ResourceNotFound, 404)
    }

    pub fn forbidden() -> Self {
        Self::with_kind(ErrorKind::Forbidden, 403)
    }

    pub fn illegal_request() -> Self {
        Self::with_kind(ErrorKind::IllegalRequest, 451)
    }

    /// 422 carrying the accumulated sub-errors (usually field validation failures).
    pub fn unprocessable_entity(errors: Vec<Value>) -> Self {
        Self::with_kind(ErrorKind::UnprocessableEntity, 422).with_errors(errors)
    }

    pub fn validation(code: u16, errors: Vec<Value>) -> Self {
        Self::with_kind(ErrorKind::Validation, code).with_errors(errors)
    }

    pub fn login() -> Self {
        Self::with_kind(ErrorKind::Login, 401)
    }

    pub fn custom(message: impl Into<String>, code: u16) -> Self {
        Self::with_kind(ErrorKind::Custom, code).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_property(key, value);
        self
    }

    pub fn with_errors(mut self, errors: Vec<Value>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn errors(&self) -> Option<&[Value]> {
        self.errors.as_deref()
    }

    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Removes a metadata entry, returning its value if it was present.
    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.metadata.remove(key)
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn has_metadata(&self) -> bool {
        !self.metadata.is_empty()
    }

    /// HTTP status for this error; codes outside the status range map to 500.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<Value>>,
}

impl From<TrencherError> for ErrorBody {
    fn from(e: TrencherError) -> Self {
        ErrorBody {
            error: ErrorDetail {
                kind: e.kind,
                code: e.code,
                message: e.message,
                metadata: e.metadata,
                errors: e.errors,
            },
        }
    }
}

impl From<ErrorBody> for TrencherError {
    fn from(body: ErrorBody) -> Self {
        let d = body.error;
        TrencherError {
            kind: d.kind,
            message: d.message,
            code: d.code,
            metadata: d.metadata,
            errors: d.errors,
        }
    }
}

impl IntoResponse for TrencherError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorBody::from(self))).into_response()
    }
}

impl From<reqwest::Error> for TrencherError {
    fn from(e: reqwest::Error) -> Self {
        // No status means the request never got a response.
        let code = e.status().map_or(502, |s| s.as_u16());
        TrencherError::api(code).with_property("reason", e.to_string())
    }
}

/// Configuration and logging setup failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid log level '{level}': {reason}")]
    InvalidLogLevel { level: String, reason: String },
    #[error("logger: {0}")]
    Logger(String),
}

impl From<ConfigError> for TrencherError {
    fn from(e: ConfigError) -> Self {
        TrencherError::internal_library().with_property("reason", e.to_string())
    }
}

/// Caller-supplied override for client failures. Returning `Ok` swallows the error and
/// yields the fallback value; returning `Err` re-raises (possibly transformed).
pub type ErrorHandler = dyn Fn(TrencherError) -> Result<Value, TrencherError> + Send + Sync;

/// Logs `<code> <message>: <metadata> <errors>` at error level.
pub fn log_error(error: &TrencherError) {
    let details = if error.has_metadata() {
        format!(": {}", Value::Object(error.metadata.clone()))
    } else {
        String::new()
    };
    let errors = error
        .errors
        .as_ref()
        .map(|e| format!(": {}", Value::Array(e.clone())))
        .unwrap_or_default();
    tracing::error!("{} {}{} {}", error.code, error.message, details, errors);
}

/// Logs the error, then hands it to `handler` if there is one; otherwise returns it.
pub fn handle_error(error: TrencherError, handler: Option<&ErrorHandler>) -> Result<Value, TrencherError> {
    log_error(&error);
    match handler {
        Some(h) => h(error),
        None => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_codes_follow_the_taxonomy() {
        assert_eq!(TrencherError::internal_server().code(), 500);
        assert_eq!(TrencherError::internal_library().code(), 500);
        assert_eq!(TrencherError::not_found().code(), 404);
        assert_eq!(TrencherError::forbidden().code(), 403);
        assert_eq!(TrencherError::illegal_request().code(), 451);
        assert_eq!(TrencherError::unprocessable_entity(vec![]).code(), 422);
        assert_eq!(TrencherError::login().code(), 401);
        assert_eq!(TrencherError::api(418).code(), 418);
        assert_eq!(TrencherError::custom("teapot", 599).code(), 599);
        assert_eq!(ErrorKind::Api.default_code(), None);
    }

    #[test]
    fn metadata_can_be_added_and_removed() {
        let mut err = TrencherError::forbidden();
        assert!(!err.has_metadata());
        err.add_property("user", "alice");
        assert!(err.has_metadata());
        assert_eq!(err.metadata().get("user"), Some(&json!("alice")));
        assert_eq!(err.remove_property("user"), Some(json!("alice")));
        assert_eq!(err.remove_property("user"), None);
        assert!(!err.has_metadata());
        assert_eq!(err.code(), 403);
    }

    #[tokio::test]
    async fn into_response_uses_code_as_status() {
        let err = TrencherError::unprocessable_entity(vec![json!({"message": "name is required"})])
            .with_property("resource", "users");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["kind"], "unprocessable_entity");
        assert_eq!(body["error"]["code"], 422);
        assert_eq!(body["error"]["metadata"]["resource"], "users");
        assert_eq!(body["error"]["errors"][0]["message"], "name is required");
    }

    #[test]
    fn out_of_range_code_maps_to_500() {
        assert_eq!(TrencherError::custom("odd", 42).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(TrencherError::custom("odd", 538).status().as_u16(), 538);
    }

    #[test]
    fn handle_error_rethrows_without_handler() {
        let result = handle_error(TrencherError::not_found(), None);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ResourceNotFound);
    }

    #[test]
    fn handle_error_lets_handler_swallow_or_transform() {
        let swallow = |_e: TrencherError| -> Result<Value, TrencherError> { Ok(Value::Null) };
        assert_eq!(handle_error(TrencherError::login(), Some(&swallow)).unwrap(), Value::Null);

        let transform = |e: TrencherError| -> Result<Value, TrencherError> {
            Err(TrencherError::custom("wrapped", e.code()))
        };
        let err = handle_error(TrencherError::login(), Some(&transform)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Custom);
        assert_eq!(err.code(), 401);
    }
}
