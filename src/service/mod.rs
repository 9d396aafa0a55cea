//! Chain stages the route assembly engine places ahead of controllers.

pub mod upload;
pub mod validation;

pub use upload::{generate_filename, UploadConfig, UploadError, UploadMiddleware, UploadedFile};
pub use validation::{validator_fn, FieldError, SharedValidator, ValidationErrors, ValidationGate, Validator};
