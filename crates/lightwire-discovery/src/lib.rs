//! Lightwire Discovery - Resource registry, discovery pipeline and write-back
//!
//! This crate tracks the resources found on the network:
//! - URI prefix classification of found resources
//! - Registry of handles, typed resources and liveness timestamps
//! - Discovery and observation pipeline driven by transport events
//! - Reconciliation of desired state back to composite or monolithic lights
//! - Stale-entry sweeper

pub mod classify;
pub mod pipeline;
pub mod reconcile;
pub mod registry;
pub mod shadow;
pub mod sweeper;

pub use classify::UriPrefixes;
pub use pipeline::Pipeline;
pub use reconcile::{
    plan_write, Assignment, Reconciler, SkippedField, WritePlan, WriteReport, WriteStep, WriteVerb,
};
pub use registry::{ChildRegistration, Registry, RegistryEntry};
pub use shadow::ShadowPublisher;
pub use sweeper::{SweepReport, Sweeper};
