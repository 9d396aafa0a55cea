//! Outgoing payload model: ordered entries that are either plain JSON values or the result
//! of a file picker.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One picked file. `uri` is a `data:` URI on web and a local path or `file://` URI on
/// devices.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Raw contents already in memory (web blobs). Never serialized.
    #[serde(skip)]
    pub bytes: Option<Bytes>,
}

impl Asset {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Asset {
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.bytes = Some(bytes.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerResult {
    pub assets: Vec<Asset>,
}

impl PickerResult {
    pub fn single(asset: Asset) -> Self {
        PickerResult { assets: vec![asset] }
    }

    /// The asset that gets uploaded, when it has a uri.
    pub fn uploadable(&self) -> Option<&Asset> {
        self.assets.first().filter(|a| a.uri.is_some())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PayloadValue {
    Plain(Value),
    Picker(PickerResult),
}

impl From<Value> for PayloadValue {
    fn from(value: Value) -> Self {
        PayloadValue::Plain(value)
    }
}

impl From<PickerResult> for PayloadValue {
    fn from(picker: PickerResult) -> Self {
        PayloadValue::Picker(picker)
    }
}

/// Keyed entries in insertion order. Inserting an existing key replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Payload {
    entries: Vec<(String, PayloadValue)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<PayloadValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with_plain(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, PayloadValue::Plain(value.into()));
        self
    }

    pub fn with_picker(mut self, key: impl Into<String>, picker: PickerResult) -> Self {
        self.push(key, PayloadValue::Picker(picker));
        self
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PayloadValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a payload from a JSON object, treating any object value with an `assets`
    /// array as a picker result. Anything else stays plain.
    pub fn from_json(object: Map<String, Value>) -> Self {
        let mut payload = Payload::new();
        for (key, value) in object {
            let picker = value
                .get("assets")
                .filter(|assets| assets.is_array())
                .and_then(|_| serde_json::from_value::<PickerResult>(value.clone()).ok());
            match picker {
                Some(picker) => payload.push(key, PayloadValue::Picker(picker)),
                None => payload.push(key, PayloadValue::Plain(value)),
            }
        }
        payload
    }
}

impl IntoIterator for Payload {
    type Item = (String, PayloadValue);
    type IntoIter = std::vec::IntoIter<(String, PayloadValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Rewrites stored image paths on `entity` into picker values pointing at `base_url`, so an
/// edit form can show the current images. Missing, null or empty properties are left alone.
pub fn prepare_entity_images(entity: &Map<String, Value>, image_properties: &[&str], base_url: &str) -> Payload {
    let base = base_url.trim_end_matches('/');
    let mut payload = Payload::new();
    for (key, value) in entity {
        let stored = image_properties
            .contains(&key.as_str())
            .then(|| value.as_str())
            .flatten()
            .filter(|path| !path.is_empty());
        match stored {
            Some(path) => {
                let uri = format!("{}/{}", base, path.trim_start_matches('/'));
                payload.push(key.clone(), PickerResult::single(Asset::from_uri(uri)));
            }
            None => payload.push(key.clone(), value.clone()),
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn from_json_sniffs_pickers_and_keeps_order() {
        let payload = Payload::from_json(object(json!({
            "name": "Ada",
            "avatar": {"assets": [{"uri": "file:///tmp/a.png", "mimeType": "image/png"}]},
            "tags": ["x"],
            "meta": {"assets": "not-an-array"},
        })));
        let keys: Vec<&str> = payload.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name", "avatar", "tags", "meta"]);
        match payload.get("avatar") {
            Some(PayloadValue::Picker(p)) => {
                assert_eq!(p.assets[0].mime_type.as_deref(), Some("image/png"));
                assert!(p.uploadable().is_some());
            }
            other => panic!("expected picker, got {other:?}"),
        }
        assert!(matches!(payload.get("meta"), Some(PayloadValue::Plain(_))));
    }

    #[test]
    fn push_replaces_existing_key_in_place() {
        let mut payload = Payload::new().with_plain("a", 1).with_plain("b", 2);
        payload.push("a", json!(3));
        let entries: Vec<_> = payload.into_iter().collect();
        assert_eq!(entries[0], ("a".to_string(), PayloadValue::Plain(json!(3))));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn entity_images_become_pickers() {
        let entity = object(json!({"id": 1, "image": "uploads/a.png", "logo": null, "name": "Shop"}));
        let payload = prepare_entity_images(&entity, &["image", "logo"], "https://api.example.com/");
        match payload.get("image") {
            Some(PayloadValue::Picker(p)) => {
                assert_eq!(p.assets[0].uri.as_deref(), Some("https://api.example.com/uploads/a.png"))
            }
            other => panic!("expected picker, got {other:?}"),
        }
        assert_eq!(payload.get("logo"), Some(&PayloadValue::Plain(Value::Null)));
        assert_eq!(payload.get("name"), Some(&PayloadValue::Plain(json!("Shop"))));
    }
}
