//! Device shadow snapshot types
//!
//! The snapshot is the consolidated view of every reported light, ordered by
//! name, in the shape consumed by the shadow channel. Desired-state deltas
//! flow the other way.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Reported state of one light
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSummary {
    pub name: String,
    pub uri: String,
    pub power_on: bool,
    pub brightness: u8,
}

/// Ordered collection of light summaries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowSnapshot {
    pub light_devices: Vec<LightSummary>,
}

impl ShadowSnapshot {
    /// Build a snapshot, ordering entries by case-insensitive name
    pub fn new(mut light_devices: Vec<LightSummary>) -> Self {
        light_devices.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.uri.cmp(&b.uri))
        });
        Self { light_devices }
    }

    /// Snapshot with no devices
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.light_devices.is_empty()
    }

    /// Reported-state update document sent to the shadow channel
    pub fn to_update_payload(&self) -> Value {
        json!({
            "state": {
                "reported": self,
            }
        })
    }
}

/// Desired-state change for one light
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredDelta {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<i64>,
}

impl DesiredDelta {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.power_on.is_none() && self.brightness.is_none()
    }
}

/// Receiver of shadow snapshots
pub trait ShadowSink: Send + Sync {
    /// Publish the current reported state
    fn publish(&self, snapshot: &ShadowSnapshot);

    /// Delete the shadow document
    fn clear(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str, uri: &str) -> LightSummary {
        LightSummary {
            name: name.to_string(),
            uri: uri.to_string(),
            power_on: false,
            brightness: 0,
        }
    }

    #[test]
    fn test_snapshot_sorted_case_insensitive() {
        let snapshot = ShadowSnapshot::new(vec![
            summary("porch", "/a"),
            summary("Attic", "/b"),
            summary("kitchen", "/c"),
        ]);
        let names: Vec<&str> = snapshot.light_devices.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Attic", "kitchen", "porch"]);
    }

    #[test]
    fn test_update_payload_shape() {
        let mut light = summary("Desk", "/ocf/light/1");
        light.power_on = true;
        light.brightness = 70;
        let payload = ShadowSnapshot::new(vec![light]).to_update_payload();

        assert_eq!(
            payload,
            json!({
                "state": { "reported": { "lightDevices": [
                    { "name": "Desk", "uri": "/ocf/light/1", "powerOn": true, "brightness": 70 }
                ]}}
            })
        );
    }

    #[test]
    fn test_empty_snapshot_payload() {
        let payload = ShadowSnapshot::empty().to_update_payload();
        assert_eq!(payload, json!({ "state": { "reported": { "lightDevices": [] } } }));
    }

    #[test]
    fn test_delta_deserialize_partial() {
        let delta: DesiredDelta =
            serde_json::from_value(json!({ "uri": "/ocf/light/1", "powerOn": true })).unwrap();
        assert_eq!(delta.power_on, Some(true));
        assert_eq!(delta.brightness, None);
        assert!(!delta.is_empty());
    }
}
