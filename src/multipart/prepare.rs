//! Splits a payload into file and plain fields, normalizes the files and turns the result
//! into a multipart form.

use super::normalize::{normalize_asset, NormalizedFile, Platform};
use super::payload::{Payload, PayloadValue};
use crate::error::TrencherError;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileField {
    pub param_name: String,
    pub file: NormalizedFile,
}

/// Fields in append order: files first, then plain values, each in payload order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreparedRequestPayload {
    pub plain_fields: Vec<(String, Value)>,
    pub file_fields: Vec<FileField>,
}

#[derive(Debug)]
pub struct PreparedRequest {
    pub body: PreparedRequestPayload,
    /// Advertises `multipart/form-data`. The transport adds the boundary when it sends the form.
    pub headers: HeaderMap,
}

pub fn multipart_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("multipart/form-data"));
    headers
}

/// Any normalization failure is returned before anything is sent.
pub fn prepare_data(payload: Payload, platform: Platform) -> Result<PreparedRequest, TrencherError> {
    let mut body = PreparedRequestPayload::default();
    for (key, value) in payload {
        match value {
            PayloadValue::Picker(picker) => match picker.uploadable() {
                Some(asset) => {
                    let file = normalize_asset(asset, &key, platform)?;
                    body.file_fields.push(FileField { param_name: key, file });
                }
                // No uri: sent as its JSON form like any other plain object.
                None => {
                    let value = serde_json::to_value(&picker).map_err(|e| {
                        TrencherError::internal_library().with_property("reason", e.to_string())
                    })?;
                    body.plain_fields.push((key, value));
                }
            },
            PayloadValue::Plain(Value::Null) => {}
            PayloadValue::Plain(value) => body.plain_fields.push((key, value)),
        }
    }
    Ok(PreparedRequest {
        body,
        headers: multipart_headers(),
    })
}

fn form_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn file_part(file: NormalizedFile, bytes: Vec<u8>) -> Result<Part, TrencherError> {
    let (name, mime_type) = match file {
        NormalizedFile::Binary { name, mime_type, .. } | NormalizedFile::Reference { name, mime_type, .. } => {
            (name, mime_type)
        }
    };
    Part::bytes(bytes)
        .file_name(name)
        .mime_str(&mime_type)
        .map_err(TrencherError::from)
}

impl PreparedRequestPayload {
    pub fn is_empty(&self) -> bool {
        self.plain_fields.is_empty() && self.file_fields.is_empty()
    }

    /// Builds the form. Device references are read from disk here.
    pub async fn into_form(self) -> Result<Form, TrencherError> {
        let mut form = Form::new();
        for FileField { param_name, file } in self.file_fields {
            let bytes = match &file {
                NormalizedFile::Binary { bytes, .. } => bytes.to_vec(),
                NormalizedFile::Reference { uri, .. } => {
                    let path = uri.strip_prefix("file://").unwrap_or(uri);
                    tokio::fs::read(path).await.map_err(|e| {
                        TrencherError::internal_library()
                            .with_message(format!("Could not read file for field {param_name}"))
                            .with_property("path", path)
                            .with_property("reason", e.to_string())
                    })?
                }
            };
            form = form.part(param_name, file_part(file, bytes)?);
        }
        for (key, value) in self.plain_fields {
            form = form.text(key, form_text(value));
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::payload::{Asset, PickerResult};
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn plain_payload_keeps_non_null_fields_in_order() {
        let payload = Payload::new()
            .with_plain("name", "Ada")
            .with_plain("nickname", Value::Null)
            .with_plain("age", 36)
            .with_plain("tags", json!(["a", "b"]));
        let prepared = prepare_data(payload, Platform::Web).unwrap();
        assert!(prepared.body.file_fields.is_empty());
        assert_eq!(
            prepared.body.plain_fields,
            vec![
                ("name".to_string(), json!("Ada")),
                ("age".to_string(), json!(36)),
                ("tags".to_string(), json!(["a", "b"])),
            ]
        );
        assert_eq!(prepared.headers[CONTENT_TYPE], "multipart/form-data");
    }

    #[test]
    fn files_are_split_from_plain_fields() {
        let payload = Payload::new()
            .with_plain("title", "Report")
            .with_picker("cv", PickerResult::single(Asset::from_uri("file:///docs/cv.pdf")))
            .with_picker("empty", PickerResult::single(Asset::default().with_name("x")))
            .with_picker("avatar", PickerResult::single(Asset::from_uri("file:///img/me.png")));
        let body = prepare_data(payload, Platform::Android).unwrap().body;
        let names: Vec<&str> = body.file_fields.iter().map(|f| f.param_name.as_str()).collect();
        assert_eq!(names, vec!["cv", "avatar"]);
        assert_eq!(body.file_fields[0].file.mime_type(), "application/pdf");
        assert_eq!(body.plain_fields[0], ("title".to_string(), json!("Report")));
        assert_eq!(body.plain_fields[1], ("empty".to_string(), json!({"assets": [{"name": "x"}]})));
    }

    #[test]
    fn unsupported_web_pdf_fails_preparation() {
        let payload = Payload::new().with_picker(
            "cv",
            PickerResult::single(Asset::from_uri("https://example.com/cv.pdf")),
        );
        let err = prepare_data(payload, Platform::Web).unwrap_err();
        assert_eq!(err.message(), "This file format is not supported by PDF.");
    }

    #[test]
    fn form_text_sends_strings_raw() {
        assert_eq!(form_text(json!("plain")), "plain");
        assert_eq!(form_text(json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(form_text(json!(true)), "true");
    }

    #[tokio::test]
    async fn into_form_reads_device_references() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        let uri = format!("file://{}", file.path().display());
        let payload = Payload::new()
            .with_picker("doc", PickerResult::single(Asset::from_uri(uri)))
            .with_plain("n", 1);
        let prepared = prepare_data(payload, Platform::Android).unwrap();
        assert!(prepared.body.into_form().await.is_ok());

        let missing = PreparedRequestPayload {
            plain_fields: vec![],
            file_fields: vec![FileField {
                param_name: "doc".into(),
                file: NormalizedFile::Reference {
                    uri: "/definitely/not/here.bin".into(),
                    mime_type: "application/octet-stream".into(),
                    name: "here.bin".into(),
                },
            }],
        };
        let err = missing.into_form().await.unwrap_err();
        assert_eq!(err.metadata().get("path"), Some(&json!("/definitely/not/here.bin")));
    }
}
