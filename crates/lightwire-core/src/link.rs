//! Link graph: a resource's declared child references

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::representation::{normalize_types, Representation, RepresentationError, LINKS_KEY};

/// Href of the device self-reference, never followed during discovery
pub const DEVICE_HREF: &str = "/oic/d";

/// Relation used when a link does not declare one
pub const DEFAULT_REL: &str = "contains";

const HREF_KEY: &str = "href";
const REL_KEY: &str = "rel";
const RT_KEY: &str = "rt";

/// A reference from a parent resource to a child resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// URI of the referenced resource
    pub href: String,
    /// Relation to the parent
    pub rel: String,
    /// Resource types of the referenced resource
    pub rt: Vec<String>,
}

impl Link {
    pub fn new(href: impl Into<String>, rt: Vec<String>) -> Self {
        Self {
            href: href.into(),
            rel: DEFAULT_REL.to_string(),
            rt,
        }
    }

    /// Decode one entry of a `links` array
    pub fn from_value(value: &Value) -> Result<Self, RepresentationError> {
        let object = value
            .as_object()
            .ok_or_else(|| RepresentationError::MalformedLink("entry is not an object".into()))?;

        let href = match object.get(HREF_KEY) {
            Some(Value::String(href)) if !href.is_empty() => href.clone(),
            _ => return Err(RepresentationError::MalformedLink("missing href".into())),
        };

        let rel = match object.get(REL_KEY) {
            None => DEFAULT_REL.to_string(),
            Some(Value::String(rel)) => rel.clone(),
            Some(_) => {
                return Err(RepresentationError::MalformedLink(format!(
                    "rel of {href} is not a string"
                )))
            }
        };

        let rt = match object.get(RT_KEY) {
            None => Vec::new(),
            Some(value) => normalize_types(value).ok_or_else(|| {
                RepresentationError::MalformedLink(format!(
                    "rt of {href} is neither a string nor an array of strings"
                ))
            })?,
        };

        Ok(Self { href, rel, rt })
    }

    pub fn to_value(&self) -> Value {
        json!({
            HREF_KEY: self.href,
            REL_KEY: self.rel,
            RT_KEY: self.rt,
        })
    }

    /// Whether this link points back at the device itself
    pub fn is_device_self_reference(&self) -> bool {
        self.href == DEVICE_HREF
    }

    /// Resource type used to scope discovery of the referenced resource
    pub fn discovery_type(&self) -> Option<&str> {
        self.rt.first().map(String::as_str)
    }
}

/// Ordered list of links declared by a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links(Vec<Link>);

impl Links {
    pub fn new(links: Vec<Link>) -> Self {
        Self(links)
    }

    /// Decode the `links` attribute of a representation.
    ///
    /// Returns `Ok(None)` when the attribute is absent. Malformed entries are
    /// returned alongside the valid ones so the caller can log and skip them.
    pub fn from_representation(
        rep: &Representation,
    ) -> Result<Option<(Self, Vec<RepresentationError>)>, RepresentationError> {
        let Some(value) = rep.get(LINKS_KEY) else {
            return Ok(None);
        };
        let entries = value.as_array().ok_or_else(|| {
            RepresentationError::MalformedLink("links attribute is not an array".into())
        })?;

        let mut links = Vec::with_capacity(entries.len());
        let mut errors = Vec::new();
        for entry in entries {
            match Link::from_value(entry) {
                Ok(link) => links.push(link),
                Err(e) => errors.push(e),
            }
        }
        Ok(Some((Self(links), errors)))
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.0.iter().map(Link::to_value).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.0.iter()
    }

    pub fn hrefs(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|l| l.href.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Links that must be followed by scoped discovery
    pub fn followable(&self) -> impl Iterator<Item = &Link> {
        self.0.iter().filter(|l| !l.is_device_self_reference())
    }
}

impl std::fmt::Display for Links {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hrefs: Vec<&str> = self.hrefs().collect();
        write!(f, "[{}]", hrefs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_links_mixed_rt_shapes() {
        let rep = Representation::new("/ocf/light/1").with(
            LINKS_KEY,
            json!([
                { "href": "/ocf/switch/1", "rt": "oic.r.switch.binary" },
                {
                    "href": "/ocf/brightness/1",
                    "rel": "contains",
                    "rt": ["oic.r.light.brightness"]
                },
                { "href": "/oic/d", "rt": ["oic.wk.d", "oic.d.light"] },
            ]),
        );

        let (links, errors) = Links::from_representation(&rep).unwrap().unwrap();
        assert!(errors.is_empty());
        assert_eq!(links.len(), 3);
        assert_eq!(
            links.iter().next().unwrap().discovery_type(),
            Some("oic.r.switch.binary")
        );

        let followable: Vec<&str> = links.followable().map(|l| l.href.as_str()).collect();
        assert_eq!(followable, vec!["/ocf/switch/1", "/ocf/brightness/1"]);
    }

    #[test]
    fn test_malformed_entries_are_reported() {
        let rep = Representation::new("/ocf/light/1").with(
            LINKS_KEY,
            json!([
                { "href": "/ocf/switch/1", "rt": 12 },
                { "rt": ["oic.r.switch.binary"] },
                "not-an-object",
                { "href": "/ocf/brightness/1", "rt": [] },
            ]),
        );

        let (links, errors) = Links::from_representation(&rep).unwrap().unwrap();
        assert_eq!(errors.len(), 3);
        assert_eq!(links.len(), 1);
        assert_eq!(links.iter().next().unwrap().discovery_type(), None);
    }

    #[test]
    fn test_absent_and_non_array_links() {
        let rep = Representation::new("/a/light");
        assert_eq!(Links::from_representation(&rep), Ok(None));

        let rep = rep.with(LINKS_KEY, "nope");
        assert!(Links::from_representation(&rep).is_err());
    }
}
