//! Resource model for discovered lights and their sub-resources
//!
//! Every type here mirrors the logical state of one remote resource. Setters
//! report whether they changed anything, and `apply` decodes a peer
//! representation field by field: a field with an unexpected type is
//! reported and skipped while the remaining fields are still applied.

use serde::{Deserialize, Serialize};

use crate::link::Links;
use crate::representation::{
    Representation, RepresentationError, BRIGHTNESS_KEY, LEGACY_NAME_KEY, LINKS_KEY, NAME_KEY,
    VALUE_KEY,
};

/// Lowest brightness level
pub const BRIGHTNESS_MIN: i64 = 0;
/// Highest brightness level
pub const BRIGHTNESS_MAX: i64 = 100;

/// Clamp any brightness input into `[0, 100]`
pub fn clamp_brightness(level: i64) -> u8 {
    level.clamp(BRIGHTNESS_MIN, BRIGHTNESS_MAX) as u8
}

/// What kind of resource a URI represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Light,
    Device,
    Switch,
    Brightness,
    Configuration,
}

impl ResourceKind {
    /// Device-class resources declare links and carry a device name
    pub fn is_device_class(self) -> bool {
        matches!(self, Self::Light | Self::Device)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Device => "device",
            Self::Switch => "switch",
            Self::Brightness => "brightness",
            Self::Configuration => "configuration",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a light exposes its state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    /// State is spread across switch, brightness and configuration
    /// sub-resources reachable through links
    Composite,
    /// State is embedded directly in the light representation
    Monolithic,
}

/// Identity of a registered resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub uri: String,
    pub name: String,
    pub kind: ResourceKind,
}

/// Result of applying a representation to a resource
#[derive(Debug, Default, PartialEq)]
pub struct ApplyOutcome {
    /// Whether any tracked field changed
    pub changed: bool,
    /// Fields that were skipped
    pub errors: Vec<RepresentationError>,
}

impl ApplyOutcome {
    fn field<T>(
        &mut self,
        result: Result<Option<T>, RepresentationError>,
        apply: impl FnOnce(T) -> bool,
    ) {
        match result {
            Ok(Some(value)) => self.changed |= apply(value),
            Ok(None) => {}
            Err(e) => self.errors.push(e),
        }
    }
}

/// Read the display name, preferring the OCF `n` attribute
fn read_name(rep: &Representation) -> Result<Option<String>, RepresentationError> {
    match rep.get_str(NAME_KEY)? {
        Some(name) => Ok(Some(name.to_string())),
        None => Ok(rep.get_str(LEGACY_NAME_KEY)?.map(str::to_string)),
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// Binary power switch sub-resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    pub uri: String,
    pub parent: Option<String>,
    value: bool,
    initialized: bool,
}

impl Switch {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            parent: None,
            value: false,
            initialized: false,
        }
    }

    pub fn value(&self) -> bool {
        self.value
    }

    pub fn set_value(&mut self, value: bool) -> bool {
        replace(&mut self.value, value)
    }

    pub fn apply(&mut self, rep: &Representation) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        outcome.field(rep.get_bool(VALUE_KEY), |v| self.set_value(v));
        self.initialized = true;
        outcome
    }

    pub fn to_representation(&self) -> Representation {
        Representation::new(&self.uri).with(VALUE_KEY, self.value)
    }
}

/// Brightness sub-resource, always within `[0, 100]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brightness {
    pub uri: String,
    pub parent: Option<String>,
    level: u8,
    initialized: bool,
}

impl Brightness {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            parent: None,
            level: 0,
            initialized: false,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn set_level(&mut self, level: i64) -> bool {
        replace(&mut self.level, clamp_brightness(level))
    }

    pub fn apply(&mut self, rep: &Representation) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        outcome.field(rep.get_i64(BRIGHTNESS_KEY), |b| self.set_level(b));
        self.initialized = true;
        outcome
    }

    pub fn to_representation(&self) -> Representation {
        Representation::new(&self.uri).with(BRIGHTNESS_KEY, self.level)
    }
}

/// Configuration sub-resource holding the light's display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub uri: String,
    pub parent: Option<String>,
    name: String,
    initialized: bool,
}

impl Configuration {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            parent: None,
            name: String::new(),
            initialized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> bool {
        replace(&mut self.name, name.into())
    }

    pub fn apply(&mut self, rep: &Representation) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        outcome.field(read_name(rep), |n| self.set_name(n));
        self.initialized = true;
        outcome
    }

    pub fn to_representation(&self) -> Representation {
        Representation::new(&self.uri).with(NAME_KEY, self.name.as_str())
    }
}

/// URIs of the sub-resources attached to a composite light
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightChildren {
    pub switch: Option<String>,
    pub brightness: Option<String>,
    pub configuration: Option<String>,
}

impl LightChildren {
    /// Slot for a child of the given kind
    pub fn slot_mut(&mut self, kind: ResourceKind) -> Option<&mut Option<String>> {
        match kind {
            ResourceKind::Switch => Some(&mut self.switch),
            ResourceKind::Brightness => Some(&mut self.brightness),
            ResourceKind::Configuration => Some(&mut self.configuration),
            ResourceKind::Light | ResourceKind::Device => None,
        }
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        [&self.switch, &self.brightness, &self.configuration]
            .into_iter()
            .filter_map(|uri| uri.as_deref())
    }
}

/// A light device resource, composite or monolithic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub uri: String,
    name: String,
    power_on: bool,
    brightness: u8,
    links: Links,
    mode: Option<ResourceMode>,
    pub children: LightChildren,
    initialized: bool,
}

impl Light {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: String::new(),
            power_on: false,
            brightness: 0,
            links: Links::default(),
            mode: None,
            children: LightChildren::default(),
            initialized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> bool {
        replace(&mut self.name, name.into())
    }

    pub fn power_on(&self) -> bool {
        self.power_on
    }

    pub fn set_power_on(&mut self, power_on: bool) -> bool {
        replace(&mut self.power_on, power_on)
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn set_brightness(&mut self, level: i64) -> bool {
        replace(&mut self.brightness, clamp_brightness(level))
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    /// Mode latched by the first decoded representation
    pub fn mode(&self) -> Option<ResourceMode> {
        self.mode
    }

    pub fn is_composite(&self) -> bool {
        self.mode == Some(ResourceMode::Composite)
    }

    pub fn apply(&mut self, rep: &Representation) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        let has_links = rep.has(LINKS_KEY);
        match Links::from_representation(rep) {
            Ok(Some((links, errors))) => {
                outcome.changed |= replace(&mut self.links, links);
                outcome.errors.extend(errors);
            }
            Ok(None) => {}
            Err(e) => outcome.errors.push(e),
        }
        if self.mode.is_none() {
            self.mode = Some(if has_links {
                ResourceMode::Composite
            } else {
                ResourceMode::Monolithic
            });
        }

        outcome.field(read_name(rep), |n| self.set_name(n));
        outcome.field(rep.get_bool(VALUE_KEY), |v| self.set_power_on(v));
        outcome.field(rep.get_i64(BRIGHTNESS_KEY), |b| self.set_brightness(b));

        self.initialized = true;
        outcome
    }

    /// Full representation used when state is embedded in the light
    pub fn to_representation(&self) -> Representation {
        Representation::new(&self.uri)
            .with(NAME_KEY, self.name.as_str())
            .with(VALUE_KEY, self.power_on)
            .with(BRIGHTNESS_KEY, self.brightness)
    }
}

/// A generic device-class resource that only declares links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub uri: String,
    name: String,
    links: Links,
    initialized: bool,
}

impl Device {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: String::new(),
            links: Links::default(),
            initialized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> bool {
        replace(&mut self.name, name.into())
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    pub fn apply(&mut self, rep: &Representation) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        match Links::from_representation(rep) {
            Ok(Some((links, errors))) => {
                outcome.changed |= replace(&mut self.links, links);
                outcome.errors.extend(errors);
            }
            Ok(None) => {}
            Err(e) => outcome.errors.push(e),
        }
        outcome.field(read_name(rep), |n| self.set_name(n));
        self.initialized = true;
        outcome
    }

    pub fn to_representation(&self) -> Representation {
        Representation::new(&self.uri).with(NAME_KEY, self.name.as_str())
    }
}

/// Any tracked resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resource {
    Light(Light),
    Device(Device),
    Switch(Switch),
    Brightness(Brightness),
    Configuration(Configuration),
}

impl Resource {
    /// Create an empty resource of the given kind
    pub fn new(kind: ResourceKind, uri: impl Into<String>) -> Self {
        match kind {
            ResourceKind::Light => Self::Light(Light::new(uri)),
            ResourceKind::Device => Self::Device(Device::new(uri)),
            ResourceKind::Switch => Self::Switch(Switch::new(uri)),
            ResourceKind::Brightness => Self::Brightness(Brightness::new(uri)),
            ResourceKind::Configuration => Self::Configuration(Configuration::new(uri)),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Light(_) => ResourceKind::Light,
            Self::Device(_) => ResourceKind::Device,
            Self::Switch(_) => ResourceKind::Switch,
            Self::Brightness(_) => ResourceKind::Brightness,
            Self::Configuration(_) => ResourceKind::Configuration,
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Self::Light(r) => &r.uri,
            Self::Device(r) => &r.uri,
            Self::Switch(r) => &r.uri,
            Self::Brightness(r) => &r.uri,
            Self::Configuration(r) => &r.uri,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Light(r) => r.name(),
            Self::Device(r) => r.name(),
            Self::Configuration(r) => r.name(),
            Self::Switch(_) | Self::Brightness(_) => "",
        }
    }

    /// Set the device name of a device-class resource
    pub fn set_device_name(&mut self, name: &str) -> bool {
        match self {
            Self::Light(r) => r.set_name(name),
            Self::Device(r) => r.set_name(name),
            _ => false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        match self {
            Self::Light(r) => r.initialized,
            Self::Device(r) => r.initialized,
            Self::Switch(r) => r.initialized,
            Self::Brightness(r) => r.initialized,
            Self::Configuration(r) => r.initialized,
        }
    }

    /// Parent light of a sub-resource
    pub fn parent(&self) -> Option<&str> {
        match self {
            Self::Switch(r) => r.parent.as_deref(),
            Self::Brightness(r) => r.parent.as_deref(),
            Self::Configuration(r) => r.parent.as_deref(),
            Self::Light(_) | Self::Device(_) => None,
        }
    }

    pub fn set_parent(&mut self, parent: &str) {
        let slot = match self {
            Self::Switch(r) => &mut r.parent,
            Self::Brightness(r) => &mut r.parent,
            Self::Configuration(r) => &mut r.parent,
            Self::Light(_) | Self::Device(_) => return,
        };
        *slot = Some(parent.to_string());
    }

    /// Links declared by a device-class resource
    pub fn links(&self) -> Option<&Links> {
        match self {
            Self::Light(r) => Some(r.links()),
            Self::Device(r) => Some(r.links()),
            _ => None,
        }
    }

    pub fn apply(&mut self, rep: &Representation) -> ApplyOutcome {
        match self {
            Self::Light(r) => r.apply(rep),
            Self::Device(r) => r.apply(rep),
            Self::Switch(r) => r.apply(rep),
            Self::Brightness(r) => r.apply(rep),
            Self::Configuration(r) => r.apply(rep),
        }
    }

    pub fn to_representation(&self) -> Representation {
        match self {
            Self::Light(r) => r.to_representation(),
            Self::Device(r) => r.to_representation(),
            Self::Switch(r) => r.to_representation(),
            Self::Brightness(r) => r.to_representation(),
            Self::Configuration(r) => r.to_representation(),
        }
    }

    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef {
            uri: self.uri().to_string(),
            name: self.name().to_string(),
            kind: self.kind(),
        }
    }
}
