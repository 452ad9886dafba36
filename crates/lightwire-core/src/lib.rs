//! Lightwire Core - Resource model, link graph and shadow types
//!
//! This crate provides the foundational types for Lightwire:
//! - Representations exchanged with peers and their typed decoding
//! - Resource model for lights and their switch, brightness and configuration sub-resources
//! - Link graph used to drive recursive discovery
//! - Shadow snapshot and desired-state delta types
//! - Naming-override store

pub mod link;
pub mod names;
pub mod representation;
pub mod resource;
pub mod shadow;

pub use link::{Link, Links, DEVICE_HREF};
pub use names::{FileNameStore, MemoryNameStore, NameStore, NameStoreError};
pub use representation::{Representation, RepresentationError};
pub use resource::{
    clamp_brightness, ApplyOutcome, Brightness, Configuration, Device, Light, LightChildren,
    Resource, ResourceKind, ResourceMode, ResourceRef, Switch,
};
pub use shadow::{DesiredDelta, LightSummary, ShadowSink, ShadowSnapshot};
