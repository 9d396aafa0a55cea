//! Client-side multipart preparation: picker results and plain values in, a
//! `reqwest::multipart::Form` out.

pub mod normalize;
pub mod payload;
pub mod prepare;

pub use normalize::{is_pdf, normalize_asset, NormalizedFile, Platform};
pub use payload::{prepare_entity_images, Asset, Payload, PayloadValue, PickerResult};
pub use prepare::{multipart_headers, prepare_data, FileField, PreparedRequest, PreparedRequestPayload};
