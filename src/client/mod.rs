//! HTTP client helpers for talking to Trencher-style backends.

pub mod api;
pub mod multipart_api;
pub mod url;

pub use api::{ApiClient, ClientConfig};
pub use multipart_api::MultipartApiClient;
pub use url::build_full_url;
