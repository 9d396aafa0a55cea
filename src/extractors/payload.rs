//! Parsed request body shared by the upload stage, the validation gate and controllers.

use crate::error::TrencherError;
use crate::service::upload::{multipart_boundary, read_text_fields, UploadedFile};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::{FromRequest, Request},
    http::{header, HeaderMap},
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Largest JSON or multipart body read when no upload stage parsed the request.
pub const MAX_JSON_BODY: usize = 2 * 1024 * 1024;

/// Plain fields plus the files stored by the upload stage, if any.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RequestPayload {
    pub fields: Map<String, Value>,
    pub files: Vec<UploadedFile>,
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
        .map(|m| m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
        .unwrap_or(false)
}

fn bad_body(reason: impl Into<Value>) -> TrencherError {
    TrencherError::custom("Bad Request", 400).with_property("reason", reason)
}

impl RequestPayload {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// First file stored for `field_name`.
    pub fn file(&self, field_name: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field_name == field_name)
    }

    pub fn has_file(&self, field_name: &str) -> bool {
        self.file(field_name).is_some()
    }

    /// Takes the payload out of `req`.
    ///
    /// A payload left in the extensions by an earlier stage wins. Otherwise a JSON body is
    /// read and put back into the returned request so later extractors can read it again.
    /// A multipart body contributes its text fields and is consumed; file parts are rejected
    /// since no upload stage accepted them. Any other body yields an empty payload.
    pub async fn take_from(mut req: Request) -> Result<(Self, Request), TrencherError> {
        if let Some(payload) = req.extensions_mut().remove::<RequestPayload>() {
            return Ok((payload, req));
        }
        if let Some(boundary) = multipart_boundary(req.headers()) {
            let body = std::mem::take(req.body_mut());
            let fields = read_text_fields(body, &boundary, MAX_JSON_BODY as u64)
                .await
                .map_err(TrencherError::from)?;
            let payload = RequestPayload {
                fields,
                files: Vec::new(),
            };
            return Ok((payload, req));
        }
        if !is_json(req.headers()) {
            return Ok((RequestPayload::default(), req));
        }
        let (parts, body) = req.into_parts();
        let bytes = to_bytes(body, MAX_JSON_BODY).await.map_err(|e| bad_body(e.to_string()))?;
        let fields = if bytes.is_empty() {
            Map::new()
        } else {
            match serde_json::from_slice::<Value>(&bytes).map_err(|e| bad_body(e.to_string()))? {
                Value::Object(m) => m,
                _ => return Err(bad_body("body must be a JSON object")),
            }
        };
        let payload = RequestPayload {
            fields,
            files: Vec::new(),
        };
        Ok((payload, Request::from_parts(parts, Body::from(bytes))))
    }
}

#[async_trait]
impl<S> FromRequest<S> for RequestPayload
where
    S: Send + Sync,
{
    type Rejection = TrencherError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let (payload, _) = Self::take_from(req).await?;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn reads_json_and_restores_body() {
        let (payload, req) = RequestPayload::take_from(json_request(r#"{"name":"Ada","age":36}"#))
            .await
            .unwrap();
        assert_eq!(payload.field("name"), Some(&json!("Ada")));
        let bytes = to_bytes(req.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"name":"Ada","age":36}"#);
    }

    #[tokio::test]
    async fn rejects_non_object_json() {
        let err = RequestPayload::take_from(json_request("[1,2]")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Custom);
        assert_eq!(err.code(), 400);
    }

    #[tokio::test]
    async fn prefers_payload_from_extensions() {
        let mut req = json_request(r#"{"ignored":true}"#);
        let mut stored = RequestPayload::default();
        stored.fields.insert("from".into(), json!("upload"));
        req.extensions_mut().insert(stored.clone());
        let (payload, _) = RequestPayload::take_from(req).await.unwrap();
        assert_eq!(payload, stored);
    }

    fn multipart_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=X")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn reads_multipart_text_fields() {
        let req = multipart_request(
            "--X\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nrust\r\n--X--\r\n",
        );
        let (payload, _) = RequestPayload::take_from(req).await.unwrap();
        assert_eq!(payload.field("name"), Some(&json!("rust")));
        assert!(payload.files.is_empty());
    }

    #[tokio::test]
    async fn multipart_file_without_upload_stage_is_a_500() {
        let req = multipart_request(
            "--X\r\nContent-Disposition: form-data; name=\"cv\"; filename=\"cv.pdf\"\r\n\r\n%PDF\r\n--X--\r\n",
        );
        let err = RequestPayload::take_from(req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalServer);
        assert_eq!(err.metadata().get("reason"), Some(&json!("Unexpected field: cv")));
    }

    #[tokio::test]
    async fn non_json_body_is_an_empty_payload() {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap();
        let (payload, _) = RequestPayload::take_from(req).await.unwrap();
        assert!(payload.fields.is_empty());
        assert!(payload.files.is_empty());
    }
}
