//! Resource representations exchanged with peers
//!
//! A representation is the attribute map a peer returns for a GET, PUT, POST
//! or observation notification, tagged with the URI of the resource it
//! describes. Typed accessors distinguish an absent attribute (`Ok(None)`)
//! from an attribute with an unexpected type (`Err`), so callers can skip a
//! single field and keep decoding the rest.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name attribute used by OCF devices and configuration resources
pub const NAME_KEY: &str = "n";
/// Legacy name attribute used by some bridged resources
pub const LEGACY_NAME_KEY: &str = "name";
/// URI attribute
pub const URI_KEY: &str = "uri";
/// Binary switch state attribute
pub const VALUE_KEY: &str = "value";
/// Brightness level attribute
pub const BRIGHTNESS_KEY: &str = "brightness";
/// Link collection attribute
pub const LINKS_KEY: &str = "links";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepresentationError {
    #[error("attribute `{key}` has unexpected type, expected {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("malformed link: {0}")]
    MalformedLink(String),
    #[error("representation carries no uri")]
    MissingUri,
}

/// Attribute map of a remote resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    /// URI of the resource this representation belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Attribute values
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Representation {
    /// Create an empty representation for the given URI
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            attributes: Map::new(),
        }
    }

    /// Create a representation with no URI (request bodies)
    pub fn body() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an attribute value
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    /// URI of the resource, falling back to the `uri` attribute
    pub fn resource_uri(&self) -> Result<&str, RepresentationError> {
        match self.uri.as_deref() {
            Some(uri) if !uri.is_empty() => Ok(uri),
            _ => match self.attributes.get(URI_KEY) {
                Some(Value::String(uri)) if !uri.is_empty() => Ok(uri),
                _ => Err(RepresentationError::MissingUri),
            },
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Read a boolean attribute
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, RepresentationError> {
        match self.attributes.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(wrong_type(key, "boolean")),
        }
    }

    /// Read an integer attribute; floating point values are truncated
    pub fn get_i64(&self, key: &str) -> Result<Option<i64>, RepresentationError> {
        match self.attributes.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Some)
                .ok_or_else(|| wrong_type(key, "integer")),
            Some(_) => Err(wrong_type(key, "integer")),
        }
    }

    /// Read a string attribute
    pub fn get_str(&self, key: &str) -> Result<Option<&str>, RepresentationError> {
        match self.attributes.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(wrong_type(key, "string")),
        }
    }

    /// Read a resource-type style attribute that may be a single string or an
    /// array of strings, normalized to a sequence
    pub fn get_types(&self, key: &str) -> Result<Option<Vec<String>>, RepresentationError> {
        match self.attributes.get(key) {
            None => Ok(None),
            Some(value) => normalize_types(value)
                .map(Some)
                .ok_or_else(|| wrong_type(key, "string or array of strings")),
        }
    }
}

/// Normalize a `rt`-style value into a sequence of strings
pub fn normalize_types(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

fn wrong_type(key: &str, expected: &'static str) -> RepresentationError {
    RepresentationError::WrongType {
        key: key.to_string(),
        expected,
    }
}
