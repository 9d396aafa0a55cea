//! Trencher: declarative CRUD route assembly, upload handling and validation for axum
//! backends, plus the matching JSON and multipart client helpers.

pub mod client;
pub mod config;
pub mod error;
pub mod extractors;
pub mod logging;
pub mod middleware;
pub mod multipart;
pub mod routes;
pub mod service;

pub use client::{build_full_url, ApiClient, ClientConfig, MultipartApiClient};
pub use config::TrencherConfig;
pub use error::{handle_error, ConfigError, ErrorHandler, ErrorKind, TrencherError};
pub use extractors::RequestPayload;
pub use logging::LogHandle;
pub use middleware::{middleware_fn, Middleware, SharedMiddleware};
pub use multipart::{prepare_data, Asset, Payload, PayloadValue, PickerResult, Platform};
pub use routes::{
    register_crud, register_custom_route, AxumDispatcher, CrudOperation, CustomRoute, Dispatcher,
    ResourceDescriptor, Verb,
};
pub use service::{
    generate_filename, validator_fn, FieldError, UploadConfig, UploadMiddleware, UploadedFile, ValidationErrors,
    Validator,
};
