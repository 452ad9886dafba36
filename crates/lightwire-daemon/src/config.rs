//! Configuration loading and validation

use anyhow::Result;
use lightwire_discovery::UriPrefixes;
use lightwire_transport::SimulatedLight;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Bounds applied to the discovery interval
const MIN_DISCOVERY_INTERVAL_SECS: u64 = 1;
const MAX_DISCOVERY_INTERVAL_SECS: u64 = 60;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub names: NamesConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for web server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Seconds between discovery rounds; observations are renewed each round
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_secs: u64,
    /// Seconds between stale-entry sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Seconds a top-level resource may go without a refresh before eviction
    #[serde(default = "default_liveness_window")]
    pub liveness_window_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            discovery_interval_secs: default_discovery_interval(),
            sweep_interval_secs: default_sweep_interval(),
            liveness_window_secs: default_liveness_window(),
        }
    }
}

impl DaemonConfig {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(
            self.discovery_interval_secs
                .clamp(MIN_DISCOVERY_INTERVAL_SECS, MAX_DISCOVERY_INTERVAL_SECS),
        )
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn liveness_window(&self) -> Duration {
        Duration::from_secs(self.liveness_window_secs)
    }

    /// Warning when the liveness window cannot absorb two missed rounds
    pub fn liveness_warning(&self) -> Option<String> {
        let interval = self.discovery_interval().as_secs();
        if self.liveness_window_secs < 3 * interval {
            Some(format!(
                "liveness window of {}s is shorter than three discovery intervals ({}s); \
                 resources may be evicted after a single missed round",
                self.liveness_window_secs,
                3 * interval
            ))
        } else {
            None
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_discovery_interval() -> u64 {
    10
}

fn default_sweep_interval() -> u64 {
    10
}

fn default_liveness_window() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Resource type requested by top-level discovery
    #[serde(default = "default_type_filter")]
    pub type_filter: String,
    /// URI prefix tables
    #[serde(default)]
    pub prefixes: UriPrefixes,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            type_filter: default_type_filter(),
            prefixes: UriPrefixes::default(),
        }
    }
}

fn default_type_filter() -> String {
    "oic.d.light".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamesConfig {
    /// Path of the naming-override store
    #[serde(default = "default_names_path")]
    pub path: String,
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            path: default_names_path(),
        }
    }
}

fn default_names_path() -> String {
    "./names.json".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Simulated light peers
    #[serde(default, rename = "light")]
    pub lights: Vec<SimulatedLight>,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightwire_core::ResourceKind;
    use lightwire_transport::LightLayout;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.daemon.bind, "0.0.0.0:8080");
        assert_eq!(config.daemon.discovery_interval(), Duration::from_secs(10));
        assert_eq!(config.discovery.type_filter, "oic.d.light");
        assert!(config.simulator.lights.is_empty());
        assert!(config.daemon.liveness_warning().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lightwire.toml");
        std::fs::write(
            &path,
            r#"
[daemon]
bind = "127.0.0.1:9000"
discovery_interval_secs = 5

[discovery.prefixes]
device = ["/oic/col/"]

[names]
path = "/var/lib/lightwire/names.json"

[[simulator.light]]
name = "Desk"

[[simulator.light]]
name = "Porch"
bridged = true
power_on = true
brightness = 30

[[simulator.light]]
name = "Hall"
composite = false
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.daemon.bind, "127.0.0.1:9000");
        assert_eq!(config.daemon.liveness_window_secs, 30);
        assert_eq!(
            config.discovery.prefixes.classify("/oic/col/1"),
            Some(ResourceKind::Device)
        );
        assert_eq!(
            config.discovery.prefixes.classify("/ocf/switch/1"),
            Some(ResourceKind::Switch)
        );
        let layouts: Vec<LightLayout> =
            config.simulator.lights.iter().map(|l| l.layout()).collect();
        assert_eq!(
            layouts,
            vec![LightLayout::Composite, LightLayout::Bridged, LightLayout::Monolithic]
        );
        assert_eq!(config.simulator.lights[0].brightness, 100);
    }

    #[test]
    fn test_discovery_interval_is_clamped() {
        let mut daemon = DaemonConfig {
            discovery_interval_secs: 0,
            ..DaemonConfig::default()
        };
        assert_eq!(daemon.discovery_interval(), Duration::from_secs(1));
        daemon.discovery_interval_secs = 600;
        assert_eq!(daemon.discovery_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_short_liveness_window_warns() {
        let daemon = DaemonConfig {
            discovery_interval_secs: 20,
            liveness_window_secs: 30,
            ..DaemonConfig::default()
        };
        assert!(daemon.liveness_warning().is_some());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "[daemon\nbind = ").unwrap();
        assert!(load_config(&path).is_err());
    }
}
