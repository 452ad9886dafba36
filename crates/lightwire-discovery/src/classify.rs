//! URI prefix classification
//!
//! Vendors lay out their resources under different URI prefixes. The prefix
//! tables decide what kind of resource a URI is, whether its sub-resources
//! need append-style writes, whether the light's name lives in device
//! metadata and whether the light supports rename on the peer.

use lightwire_core::ResourceKind;
use serde::{Deserialize, Serialize};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_light() -> Vec<String> {
    strings(&["/upnp/light/", "/ocf/light/", "/a/light"])
}

fn default_switch() -> Vec<String> {
    strings(&["/upnp/switch/", "/ocf/switch/"])
}

fn default_brightness() -> Vec<String> {
    strings(&["/upnp/brightness/", "/ocf/brightness/"])
}

fn default_configuration() -> Vec<String> {
    strings(&["/ocf/light-config/"])
}

fn default_append_update() -> Vec<String> {
    strings(&["/upnp/switch/", "/upnp/brightness/"])
}

fn default_device_info() -> Vec<String> {
    strings(&["/ocf/light/", "/a/light"])
}

fn default_rename() -> Vec<String> {
    strings(&["/ocf/light/"])
}

/// Prefix tables used to classify resource URIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriPrefixes {
    #[serde(default = "default_light")]
    pub light: Vec<String>,
    /// Generic device-class resources that only declare links
    #[serde(default)]
    pub device: Vec<String>,
    #[serde(default = "default_switch")]
    pub switch: Vec<String>,
    #[serde(default = "default_brightness")]
    pub brightness: Vec<String>,
    #[serde(default = "default_configuration")]
    pub configuration: Vec<String>,
    /// Sub-resources written with POST instead of PUT
    #[serde(default = "default_append_update")]
    pub append_update: Vec<String>,
    /// Lights whose display name comes from a device-info query
    #[serde(default = "default_device_info")]
    pub device_info: Vec<String>,
    /// Lights that accept a rename through their configuration child
    #[serde(default = "default_rename")]
    pub rename: Vec<String>,
}

impl Default for UriPrefixes {
    fn default() -> Self {
        Self {
            light: default_light(),
            device: Vec::new(),
            switch: default_switch(),
            brightness: default_brightness(),
            configuration: default_configuration(),
            append_update: default_append_update(),
            device_info: default_device_info(),
            rename: default_rename(),
        }
    }
}

fn matches_any(prefixes: &[String], uri: &str) -> bool {
    prefixes.iter().any(|p| uri.starts_with(p.as_str()))
}

impl UriPrefixes {
    /// Resource kind of `uri`, or `None` when no prefix matches
    pub fn classify(&self, uri: &str) -> Option<ResourceKind> {
        // Configuration is checked before light so `/ocf/light-config/` never
        // matches a shorter light prefix
        let tables = [
            (&self.configuration, ResourceKind::Configuration),
            (&self.switch, ResourceKind::Switch),
            (&self.brightness, ResourceKind::Brightness),
            (&self.light, ResourceKind::Light),
            (&self.device, ResourceKind::Device),
        ];
        tables
            .into_iter()
            .find(|(prefixes, _)| matches_any(prefixes, uri))
            .map(|(_, kind)| kind)
    }

    pub fn requires_append_update(&self, uri: &str) -> bool {
        matches_any(&self.append_update, uri)
    }

    pub fn needs_device_info(&self, uri: &str) -> bool {
        matches_any(&self.device_info, uri)
    }

    pub fn supports_rename(&self, uri: &str) -> bool {
        matches_any(&self.rename, uri)
    }
}
