//! Disk-backed upload stage: parses multipart bodies, stores accepted file fields under a
//! per-resource folder with generated names, and hands text fields on as plain fields.

use crate::config::DEFAULT_UPLOAD_FOLDER;
use crate::error::TrencherError;
use crate::extractors::RequestPayload;
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

const TOKEN_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const TOKEN_LEN: usize = 7;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadConfig {
    pub folder: PathBuf,
    /// Multipart field names allowed to carry files. Empty disables the upload stage.
    pub file_field_names: Vec<String>,
    pub max_file_size: Option<u64>,
    /// Limit on the whole multipart stream.
    pub max_body_size: Option<u64>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig::new(DEFAULT_UPLOAD_FOLDER)
    }
}

impl UploadConfig {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        UploadConfig {
            folder: folder.into(),
            file_field_names: Vec::new(),
            max_file_size: None,
            max_body_size: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.file_field_names.push(name.into());
        self
    }

    pub fn fields<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.file_field_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn max_body_size(mut self, bytes: u64) -> Self {
        self.max_body_size = Some(bytes);
        self
    }

    pub fn accepts(&self, field_name: &str) -> bool {
        self.file_field_names.iter().any(|f| f == field_name)
    }

    /// Whether routes using this config get an upload stage at all.
    pub fn is_active(&self) -> bool {
        !self.file_field_names.is_empty()
    }
}

/// A file stored for the current request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub field_name: String,
    pub generated_name: String,
    pub destination_folder: PathBuf,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    pub size: u64,
}

impl UploadedFile {
    pub fn path(&self) -> PathBuf {
        self.destination_folder.join(&self.generated_name)
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unexpected field: {0}")]
    UnexpectedField(String),
    #[error("File too large: field '{field}' exceeds {limit} bytes")]
    FileTooLarge { field: String, limit: u64 },
    #[error("multipart: {0}")]
    Multipart(#[from] multer::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for TrencherError {
    fn from(e: UploadError) -> Self {
        TrencherError::internal_server().with_property("reason", e.to_string())
    }
}

/// `<7 base36 chars>-<unix millis>.<ext>`, where `ext` is the last `.` segment of
/// `original_name` taken verbatim (the whole name when it has no dot).
pub fn generate_filename(original_name: &str) -> String {
    let extension = original_name.rsplit('.').next().unwrap_or_default();
    format!("{}-{}.{}", random_token(), Utc::now().timestamp_millis(), extension)
}

fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| char::from(TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())]))
        .collect()
}

pub(crate) fn multipart_boundary(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    if !content_type.trim_start().to_ascii_lowercase().starts_with("multipart/form-data") {
        return None;
    }
    multer::parse_boundary(content_type).ok()
}

/// Adds a text field. A repeated name turns the value into an array in arrival order.
pub(crate) fn append_field(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name, value);
        }
    }
}

/// Reads only the text fields of a multipart body. Any file part is an unexpected field.
pub(crate) async fn read_text_fields(
    body: Body,
    boundary: &str,
    limit: u64,
) -> Result<Map<String, Value>, UploadError> {
    let constraints = multer::Constraints::new().size_limit(multer::SizeLimit::new().whole_stream(limit));
    let mut multipart = multer::Multipart::with_constraints(body.into_data_stream(), boundary, constraints);
    let mut fields = Map::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(ToString::to_string);
        match file_name.as_deref() {
            None => {
                let text = field.text().await?;
                append_field(&mut fields, name, Value::String(text));
            }
            Some("") => {}
            Some(_) => return Err(UploadError::UnexpectedField(name)),
        }
    }
    Ok(fields)
}

/// Upload stage bound to one folder and one set of accepted field names.
#[derive(Clone, Debug)]
pub struct UploadMiddleware {
    config: Arc<UploadConfig>,
}

impl UploadMiddleware {
    pub fn configure(config: UploadConfig) -> Self {
        UploadMiddleware {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Non-multipart requests pass through untouched. Any storage failure aborts the chain
    /// with a 500 and removes files already written for this request.
    pub async fn run(&self, mut req: Request, next: Next) -> Response {
        let Some(boundary) = multipart_boundary(req.headers()) else {
            return next.run(req).await;
        };
        let body = std::mem::take(req.body_mut());
        let mut stored = Vec::new();
        match self.store(body, &boundary, &mut stored).await {
            Ok(fields) => {
                tracing::debug!(files = stored.len(), folder = %self.config.folder.display(), "stored upload");
                req.extensions_mut().insert(RequestPayload { fields, files: stored });
                next.run(req).await
            }
            Err(e) => {
                tracing::error!(folder = %self.config.folder.display(), "upload failed: {}", e);
                for file in &stored {
                    if let Err(rm) = tokio::fs::remove_file(file.path()).await {
                        tracing::warn!("could not remove partial upload {}: {}", file.path().display(), rm);
                    }
                }
                TrencherError::from(e).into_response()
            }
        }
    }

    async fn store(
        &self,
        body: Body,
        boundary: &str,
        stored: &mut Vec<UploadedFile>,
    ) -> Result<Map<String, Value>, UploadError> {
        let mut limits = multer::SizeLimit::new();
        if let Some(max) = self.config.max_body_size {
            limits = limits.whole_stream(max);
        }
        let constraints = multer::Constraints::new().size_limit(limits);
        let mut multipart = multer::Multipart::with_constraints(body.into_data_stream(), boundary, constraints);
        let mut fields = Map::new();

        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let original_name = match field.file_name().map(ToString::to_string) {
                None => {
                    let text = field.text().await?;
                    append_field(&mut fields, name, Value::String(text));
                    continue;
                }
                // Empty file inputs arrive with a blank filename.
                Some(file_name) if file_name.is_empty() => continue,
                Some(file_name) => file_name,
            };
            if !self.config.accepts(&name) {
                return Err(UploadError::UnexpectedField(name));
            }
            tokio::fs::create_dir_all(&self.config.folder).await?;

            let generated_name = generate_filename(&original_name);
            let content_type = field.content_type().map(ToString::to_string);
            let mut file = tokio::fs::File::create(self.config.folder.join(&generated_name)).await?;
            stored.push(UploadedFile {
                field_name: name.clone(),
                generated_name,
                destination_folder: self.config.folder.clone(),
                original_name: Some(original_name),
                content_type,
                size: 0,
            });

            let mut size = 0u64;
            while let Some(chunk) = field.chunk().await? {
                size += chunk.len() as u64;
                if let Some(limit) = self.config.max_file_size {
                    if size > limit {
                        return Err(UploadError::FileTooLarge { field: name, limit });
                    }
                }
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            if let Some(last) = stored.last_mut() {
                last.size = size;
            }
        }
        Ok(fields)
    }
}
