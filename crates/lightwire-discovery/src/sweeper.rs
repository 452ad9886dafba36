//! Stale-entry sweeper
//!
//! Periodically evicts top-level resources not refreshed within the
//! liveness window, together with their linked children, and keeps the
//! shadow in step with what remains.

use chrono::{DateTime, Utc};
use lightwire_transport::{ResourceHandle, ResourceTransport};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

use crate::reconcile::Reconciler;
use crate::registry::Registry;

/// Result of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// URIs evicted, children included
    pub removed: Vec<String>,
    /// Whether the sweep left no top-level resources behind
    pub emptied: bool,
}

pub struct Sweeper {
    registry: Arc<Registry>,
    transport: Arc<dyn ResourceTransport>,
    reconciler: Arc<Reconciler>,
    window: chrono::Duration,
    interval: Duration,
}

impl Sweeper {
    pub fn new(
        registry: Arc<Registry>,
        transport: Arc<dyn ResourceTransport>,
        reconciler: Arc<Reconciler>,
        window: Duration,
        interval: Duration,
    ) -> Self {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        Self {
            registry,
            transport,
            reconciler,
            window,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Sweep using the current time
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Evict every top-level resource last seen at or before `now - window`
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let Some(cutoff) = now.checked_sub_signed(self.window) else {
            return SweepReport::default();
        };
        let stale = self.registry.stale_top_level(cutoff).await;
        if stale.is_empty() {
            debug!("Sweep found no stale resources");
            return SweepReport::default();
        }

        let mut removed = Vec::new();
        for uri in stale {
            let handles = self.registry.remove_cascade_if_stale(&uri, cutoff).await;
            if !handles.is_empty() {
                info!(uri = %uri, "Evicted stale resource");
            }
            removed.extend(self.cancel_observations(handles));
        }
        if removed.is_empty() {
            return SweepReport::default();
        }
        let emptied = self.registry.top_level_count().await == 0;
        self.republish().await;
        if emptied {
            info!("No resources remain after sweep");
        }

        SweepReport { removed, emptied }
    }

    /// Remove a resource and its linked children on request
    pub async fn remove(&self, uri: &str) -> Vec<String> {
        let handles = self.registry.remove_cascade(uri).await;
        let removed = self.cancel_observations(handles);
        if !removed.is_empty() {
            self.republish().await;
        }
        removed
    }

    pub async fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs(),
            window_secs = self.window.num_seconds(),
            "Sweeper started"
        );
        let mut ticker = interval(self.interval);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = self.sweep().await;
            if !report.removed.is_empty() {
                info!(removed = report.removed.len(), emptied = report.emptied, "Sweep complete");
            }
        }
    }

    fn cancel_observations(&self, handles: Vec<ResourceHandle>) -> Vec<String> {
        for handle in &handles {
            if let Err(e) = self.transport.cancel_observe(handle) {
                debug!(uri = %handle.uri, error = %e, "Cancel observe failed");
            }
        }
        handles.into_iter().map(|h| h.uri).collect()
    }

    /// Delete the shadow document, then publish what remains so an empty
    /// registry is reported as an empty device list
    async fn republish(&self) {
        if let Some(shadow) = self.reconciler.shadow() {
            shadow.clear().await;
        }
        self.reconciler.refresh_shadow().await;
    }
}
