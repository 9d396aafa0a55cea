//! Validation gate: runs a caller validator against the parsed payload and flushes the
//! request-scoped error accumulator before the controller is reached.

use crate::error::TrencherError;
use crate::extractors::RequestPayload;
use async_trait::async_trait;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One recorded validation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Failure not tied to a single field (business rule, cross-field check).
    pub fn general(message: impl Into<String>) -> Self {
        FieldError {
            field: None,
            message: message.into(),
        }
    }

    fn into_value(self) -> Value {
        let mut obj = serde_json::Map::new();
        if let Some(field) = self.field {
            obj.insert("field".into(), Value::String(field));
        }
        obj.insert("message".into(), Value::String(self.message));
        Value::Object(obj)
    }
}

/// Request-scoped accumulator. An error counts as recorded once it has been pushed here,
/// either by the validator or by an earlier middleware through [`ValidationErrors::record`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    entries: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: FieldError) {
        self.entries.push(entry);
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.entries.iter()
    }

    /// Records an entry on the request so the gate of this chain picks it up.
    pub fn record(req: &mut Request, entry: FieldError) {
        match req.extensions_mut().get_mut::<ValidationErrors>() {
            Some(errors) => errors.push(entry),
            None => {
                let mut errors = ValidationErrors::new();
                errors.push(entry);
                req.extensions_mut().insert(errors);
            }
        }
    }

    /// Drains the accumulator. Any recorded entry turns into one 422 carrying all of them.
    pub fn flush(&mut self) -> Result<(), TrencherError> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let errors = std::mem::take(&mut self.entries)
            .into_iter()
            .map(FieldError::into_value)
            .collect();
        Err(TrencherError::unprocessable_entity(errors))
    }
}

#[async_trait]
pub trait Validator: Send + Sync + 'static {
    async fn validate(&self, payload: &RequestPayload, errors: &mut ValidationErrors);
}

pub type SharedValidator = Arc<dyn Validator>;

struct FnValidator<F>(F);

#[async_trait]
impl<F> Validator for FnValidator<F>
where
    F: Fn(&RequestPayload, &mut ValidationErrors) + Send + Sync + 'static,
{
    async fn validate(&self, payload: &RequestPayload, errors: &mut ValidationErrors) {
        (self.0)(payload, errors)
    }
}

/// Wraps a synchronous closure as a [`SharedValidator`].
pub fn validator_fn<F>(f: F) -> SharedValidator
where
    F: Fn(&RequestPayload, &mut ValidationErrors) + Send + Sync + 'static,
{
    Arc::new(FnValidator(f))
}

/// Chain stage wrapping one validator.
#[derive(Clone)]
pub struct ValidationGate {
    validator: SharedValidator,
}

impl std::fmt::Debug for ValidationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationGate").finish_non_exhaustive()
    }
}

impl ValidationGate {
    pub fn new(validator: SharedValidator) -> Self {
        ValidationGate { validator }
    }

    /// Never calls `next` when the accumulator is non-empty after validation.
    pub async fn run(&self, req: Request, next: Next) -> Response {
        let (payload, mut req) = match RequestPayload::take_from(req).await {
            Ok(taken) => taken,
            Err(e) => return e.into_response(),
        };
        let mut errors = req.extensions_mut().remove::<ValidationErrors>().unwrap_or_default();
        self.validator.validate(&payload, &mut errors).await;
        if let Err(e) = errors.flush() {
            tracing::debug!(uri = %req.uri(), "validation rejected request: {}", e);
            return e.into_response();
        }
        req.extensions_mut().insert(payload);
        next.run(req).await
    }
}
