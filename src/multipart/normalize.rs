//! Per-platform file normalization: web builds in-memory binaries, devices send file
//! references the transport reads at send time.

use super::payload::Asset;
use crate::error::TrencherError;
use base64::Engine;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

pub const PDF_MIME: &str = "application/pdf";
pub const OCTET_STREAM_MIME: &str = "application/octet-stream";
pub const UNNAMED_PDF: &str = "unnamed.pdf";
pub const UNSUPPORTED_PDF_MESSAGE: &str = "This file format is not supported by PDF.";

/// `(extension, mime_type)`; the first entry for a mime type is its canonical extension.
const EXTENSION_MIME_MAPPINGS: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Platform {
    #[default]
    Web,
    Android,
    Ios,
}

impl Platform {
    pub fn is_web(self) -> bool {
        self == Platform::Web
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Web => "web",
            Platform::Android => "android",
            Platform::Ios => "ios",
        })
    }
}

impl FromStr for Platform {
    type Err = TrencherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "web" => Ok(Platform::Web),
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(TrencherError::internal_library()
                .with_message(format!("Unknown platform: {other}"))),
        }
    }
}

/// A file ready to be appended to a multipart form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NormalizedFile {
    Binary {
        name: String,
        mime_type: String,
        bytes: Bytes,
    },
    /// Device file, read from `uri` when the form is built.
    Reference {
        uri: String,
        mime_type: String,
        name: String,
    },
}

impl NormalizedFile {
    pub fn name(&self) -> &str {
        match self {
            NormalizedFile::Binary { name, .. } | NormalizedFile::Reference { name, .. } => name,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            NormalizedFile::Binary { mime_type, .. } | NormalizedFile::Reference { mime_type, .. } => mime_type,
        }
    }
}

/// Mime type for the extension of the last path segment of `uri`.
pub fn mime_from_uri(uri: &str) -> Option<&'static str> {
    let segment = last_segment(uri);
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    EXTENSION_MIME_MAPPINGS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, m)| *m)
}

/// Canonical extension for a mime type, falling back to its subtype.
pub fn extension_for_mime(mime_type: &str) -> Option<String> {
    if let Some((ext, _)) = EXTENSION_MIME_MAPPINGS.iter().find(|(_, m)| *m == mime_type) {
        return Some((*ext).to_string());
    }
    mime_type
        .parse::<mime::Mime>()
        .ok()
        .map(|m| m.subtype().as_str().to_string())
}

fn last_segment(uri: &str) -> &str {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    path.rsplit('/').next().unwrap_or(path)
}

/// A PDF either by declared mime type or by the uri extension.
pub fn is_pdf(asset: &Asset) -> bool {
    asset.mime_type.as_deref() == Some(PDF_MIME)
        || asset.uri.as_deref().and_then(mime_from_uri) == Some(PDF_MIME)
}

struct DataUri {
    mime_type: Option<String>,
    bytes: Bytes,
}

/// Decodes `data:<mime>;base64,<payload>`. `None` when `uri` is not a data URI.
fn decode_data_uri(uri: &str) -> Option<Result<DataUri, TrencherError>> {
    let rest = uri.strip_prefix("data:")?;
    Some(rest.split_once(',').ok_or_else(|| malformed(uri)).and_then(|(header, data)| {
        let mime_type = header.split(';').next().filter(|m| !m.is_empty()).map(ToString::to_string);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| malformed(uri).with_property("reason", e.to_string()))?;
        Ok(DataUri {
            mime_type,
            bytes: Bytes::from(bytes),
        })
    }))
}

fn malformed(uri: &str) -> TrencherError {
    let preview: String = uri.chars().take(32).collect();
    TrencherError::internal_library()
        .with_message("Malformed data URI")
        .with_property("uri", preview)
}

fn unsupported_pdf(param_name: &str) -> TrencherError {
    TrencherError::internal_library()
        .with_message(UNSUPPORTED_PDF_MESSAGE)
        .with_property("field", param_name)
}

/// iOS wants plain paths; other platforms keep the uri as given.
fn device_uri(uri: &str, platform: Platform) -> String {
    match platform {
        Platform::Ios => uri.replacen("file://", "", 1),
        _ => uri.to_string(),
    }
}

pub fn normalize_pdf(asset: &Asset, param_name: &str, platform: Platform) -> Result<NormalizedFile, TrencherError> {
    let uri = asset.uri.as_deref().unwrap_or_default();
    if platform.is_web() {
        let mime_type = asset.mime_type.clone().unwrap_or_else(|| PDF_MIME.to_string());
        let bytes = match decode_data_uri(uri) {
            Some(decoded) => decoded?.bytes,
            None => asset.bytes.clone().ok_or_else(|| unsupported_pdf(param_name))?,
        };
        let name = asset
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| (!param_name.is_empty()).then(|| param_name.to_string()))
            .unwrap_or_else(|| UNNAMED_PDF.to_string());
        return Ok(NormalizedFile::Binary { name, mime_type, bytes });
    }
    Ok(NormalizedFile::Reference {
        uri: device_uri(uri, platform),
        mime_type: mime_from_uri(uri).unwrap_or(PDF_MIME).to_string(),
        name: last_segment(uri).to_string(),
    })
}

/// Web images must arrive as base64 data URIs; they are named `<stem>.<ext>` with the stem
/// taken from the asset name (or the field name) and the extension from the mime type.
pub fn normalize_image(asset: &Asset, param_name: &str, platform: Platform) -> Result<NormalizedFile, TrencherError> {
    let uri = asset.uri.as_deref().unwrap_or_default();
    if platform.is_web() {
        let decoded = decode_data_uri(uri).ok_or_else(|| {
            TrencherError::internal_library()
                .with_message("Web images must be base64 data URIs")
                .with_property("field", param_name)
        })??;
        let mime_type = decoded
            .mime_type
            .or_else(|| asset.mime_type.clone())
            .unwrap_or_else(|| OCTET_STREAM_MIME.to_string());
        let stem = asset
            .name
            .as_deref()
            .map(|n| n.rsplit_once('.').map_or(n, |(stem, _)| stem))
            .filter(|n| !n.is_empty())
            .unwrap_or(param_name);
        let name = match extension_for_mime(&mime_type) {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.to_string(),
        };
        return Ok(NormalizedFile::Binary {
            name,
            mime_type,
            bytes: decoded.bytes,
        });
    }
    Ok(NormalizedFile::Reference {
        uri: device_uri(uri, platform),
        mime_type: mime_from_uri(uri).unwrap_or(OCTET_STREAM_MIME).to_string(),
        name: last_segment(uri).to_string(),
    })
}

pub fn normalize_asset(asset: &Asset, param_name: &str, platform: Platform) -> Result<NormalizedFile, TrencherError> {
    if is_pdf(asset) {
        normalize_pdf(asset, param_name, platform)
    } else {
        normalize_image(asset, param_name, platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgo=";
    const PDF_DATA_URI: &str = "data:application/pdf;base64,JVBERi0xLjQ=";

    #[test]
    fn detects_pdfs_by_mime_or_extension() {
        assert!(is_pdf(&Asset::from_uri("file:///docs/cv.PDF")));
        assert!(is_pdf(&Asset::from_uri("blob:xyz").with_mime_type(PDF_MIME)));
        assert!(!is_pdf(&Asset::from_uri("file:///img/a.png")));
    }

    #[test]
    fn web_pdf_from_data_uri_is_named_by_fallbacks() {
        let file = normalize_pdf(&Asset::from_uri(PDF_DATA_URI), "cv", Platform::Web).unwrap();
        assert_eq!(file.name(), "cv");
        assert_eq!(file.mime_type(), PDF_MIME);
        match file {
            NormalizedFile::Binary { bytes, .. } => assert_eq!(&bytes[..], b"%PDF-1.4"),
            other => panic!("expected binary, got {other:?}"),
        }
        let unnamed = normalize_pdf(&Asset::from_uri(PDF_DATA_URI), "", Platform::Web).unwrap();
        assert_eq!(unnamed.name(), UNNAMED_PDF);
    }

    #[test]
    fn web_pdf_without_data_uri_or_bytes_is_rejected() {
        let asset = Asset::from_uri("https://example.com/cv.pdf");
        let err = normalize_pdf(&asset, "cv", Platform::Web).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalLibrary);
        assert_eq!(err.message(), UNSUPPORTED_PDF_MESSAGE);

        let inline = asset.with_bytes(Bytes::from_static(b"%PDF")).with_name("cv.pdf");
        assert_eq!(normalize_pdf(&inline, "cv", Platform::Web).unwrap().name(), "cv.pdf");
    }

    #[test]
    fn web_image_takes_extension_from_mime() {
        let asset = Asset::from_uri(PNG_DATA_URI).with_name("me.jpeg");
        let file = normalize_image(&asset, "avatar", Platform::Web).unwrap();
        assert_eq!(file.name(), "me.png");
        assert_eq!(file.mime_type(), "image/png");
    }

    #[test]
    fn native_files_become_references() {
        let ios = normalize_asset(&Asset::from_uri("file:///var/mobile/photo.jpg"), "avatar", Platform::Ios).unwrap();
        assert_eq!(
            ios,
            NormalizedFile::Reference {
                uri: "/var/mobile/photo.jpg".into(),
                mime_type: "image/jpeg".into(),
                name: "photo.jpg".into(),
            }
        );
        let android = normalize_asset(&Asset::from_uri("file:///sdcard/scan"), "doc", Platform::Android).unwrap();
        assert_eq!(android.mime_type(), OCTET_STREAM_MIME);
        match android {
            NormalizedFile::Reference { uri, .. } => assert_eq!(uri, "file:///sdcard/scan"),
            other => panic!("expected reference, got {other:?}"),
        }
    }

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("iOS".parse::<Platform>().unwrap(), Platform::Ios);
        assert!("symbian".parse::<Platform>().is_err());
    }
}
