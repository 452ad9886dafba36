//! Discovery and observation pipeline
//!
//! Reacts to transport completions: found resources are classified,
//! registered, observed and fetched; fetched device-class resources have
//! their links followed through host-scoped discovery; observation
//! notifications re-enter the fetch path. Whether the pipeline publishes to
//! a shadow is decided by the [`Reconciler`] it is built with.

use lightwire_core::representation::NAME_KEY;
use lightwire_core::{Representation, ResourceKind};
use lightwire_transport::{
    DiscoveryScope, EventReceiver, Method, ResourceHandle, ResourceTransport, TransportEvent,
    MAX_SEQUENCE_NUMBER, OBSERVE_REGISTER,
};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::classify::UriPrefixes;
use crate::reconcile::Reconciler;
use crate::registry::{ChildRegistration, Registry};
use crate::shadow::ShadowPublisher;

/// What produced a representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// GET completion
    Fetch,
    /// PUT or POST completion
    Write,
    /// Observation notification
    Notification,
}

pub struct Pipeline {
    registry: Arc<Registry>,
    transport: Arc<dyn ResourceTransport>,
    prefixes: Arc<UriPrefixes>,
    type_filter: String,
    reconciler: Arc<Reconciler>,
}

impl Pipeline {
    /// Build a pipeline; with `shadow` set every reported change is published
    pub fn new(
        registry: Arc<Registry>,
        transport: Arc<dyn ResourceTransport>,
        prefixes: UriPrefixes,
        type_filter: impl Into<String>,
        shadow: Option<Arc<ShadowPublisher>>,
    ) -> Self {
        let prefixes = Arc::new(prefixes);
        let reconciler = Arc::new(Reconciler::new(
            registry.clone(),
            transport.clone(),
            prefixes.clone(),
            shadow,
        ));
        Self {
            registry,
            transport,
            prefixes,
            type_filter: type_filter.into(),
            reconciler,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn transport(&self) -> &Arc<dyn ResourceTransport> {
        &self.transport
    }

    /// Issue one top-level discovery round
    pub fn discover(&self) {
        info!(type_filter = %self.type_filter, "Starting discovery round");
        if let Err(e) = self
            .transport
            .discover(None, &self.type_filter, DiscoveryScope::TopLevel)
        {
            warn!(type_filter = %self.type_filter, error = %e, "Discovery request failed");
        }
    }

    /// Cancel every active observation so the next round re-establishes it
    pub async fn cancel_observations(&self) {
        for handle in self.registry.handles().await {
            if let Err(e) = self.transport.cancel_observe(&handle) {
                debug!(uri = %handle.uri, error = %e, "Cancel observe failed");
            }
        }
    }

    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::ResourceFound { scope, resource } => match scope {
                DiscoveryScope::TopLevel => self.on_found(resource).await,
                DiscoveryScope::Link { parent_uri, href } => {
                    self.on_link_found(&parent_uri, &href, resource).await
                }
            },
            TransportEvent::DiscoveryFailed { scope, error } => {
                warn!(scope = ?scope, error = %error, "Discovery failed");
            }
            TransportEvent::DeviceInfo {
                uri,
                representation,
            } => self.on_device_info(&uri, &representation).await,
            TransportEvent::Completed {
                method,
                uri,
                representation,
            } => {
                let origin = if method == Method::Get {
                    Origin::Fetch
                } else {
                    Origin::Write
                };
                self.on_representation(&uri, &representation, origin).await;
            }
            TransportEvent::Failed { method, uri, error } => {
                warn!(uri = %uri, method = %method, code = ?error.code, error = %error, "Request failed");
            }
            TransportEvent::Observe {
                uri,
                sequence,
                representation,
            } => self.on_observe(&uri, sequence, representation).await,
            TransportEvent::ObserveFailed { uri, error } => {
                warn!(uri = %uri, code = ?error.code, error = %error, "Observe failed");
            }
        }
    }

    /// Handle every event already queued, including those the handling
    /// itself produces. Returns the number of events handled.
    pub async fn drain(&self, events: &mut EventReceiver) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Handle events until the channel closes
    pub async fn run(&self, mut events: EventReceiver) {
        info!("Event loop started");
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("Event channel closed, event loop stopped");
    }

    /// Periodic discovery: discover, wait one interval, cancel observations
    pub async fn run_discovery(&self, interval: Duration) {
        info!(interval_secs = interval.as_secs(), "Discovery loop started");
        loop {
            self.discover();
            sleep(interval).await;
            self.cancel_observations().await;
        }
    }

    async fn on_found(&self, resource: ResourceHandle) {
        let Some(kind) = self.prefixes.classify(&resource.uri) else {
            debug!(uri = %resource.uri, "Ignoring resource with unrecognized prefix");
            return;
        };
        if !self.registry.register(kind, resource.clone()).await {
            debug!(uri = %resource.uri, "Resource already registered, refreshing");
        }
        self.observe_and_fetch(kind, &resource);
    }

    async fn on_link_found(&self, parent_uri: &str, href: &str, resource: ResourceHandle) {
        if !resource.uri.eq_ignore_ascii_case(href) {
            return;
        }
        let Some(kind) = self.prefixes.classify(&resource.uri) else {
            debug!(uri = %resource.uri, parent = %parent_uri, "Ignoring linked resource with unrecognized prefix");
            return;
        };
        let outcome = self
            .registry
            .register_child(parent_uri, kind, resource.clone())
            .await;
        if outcome == ChildRegistration::Existing {
            debug!(uri = %resource.uri, "Linked resource already registered");
        }
        self.observe_and_fetch(kind, &resource);
    }

    fn observe_and_fetch(&self, kind: ResourceKind, resource: &ResourceHandle) {
        if let Err(e) = self.transport.observe(resource) {
            warn!(uri = %resource.uri, error = %e, "Observe request failed");
        }
        if kind.is_device_class() && self.prefixes.needs_device_info(&resource.uri) {
            if let Err(e) = self.transport.device_info(resource) {
                warn!(uri = %resource.uri, host = %resource.host, error = %e, "Device info request failed");
            }
        }
        if let Err(e) = self.transport.get(resource) {
            warn!(uri = %resource.uri, error = %e, "Get request failed");
        }
    }

    async fn on_device_info(&self, uri: &str, representation: &Representation) {
        let name = match representation.get_str(NAME_KEY) {
            Ok(Some(name)) => name.to_string(),
            Ok(None) => {
                debug!(uri = %uri, "Device info carries no name");
                return;
            }
            Err(e) => {
                warn!(uri = %uri, error = %e, "Malformed device info");
                return;
            }
        };
        let changed = self
            .registry
            .update(uri, |resource| resource.set_device_name(&name))
            .await;
        if changed == Some(true) {
            info!(uri = %uri, name = %name, "Device name resolved");
            if self.registry.is_light_ready(uri).await {
                self.reconciler.refresh_shadow().await;
            }
        }
    }

    async fn on_observe(&self, uri: &str, sequence: u32, representation: Representation) {
        if sequence == OBSERVE_REGISTER {
            debug!(uri = %uri, "Observation registered");
            return;
        }
        if sequence > MAX_SEQUENCE_NUMBER {
            debug!(uri = %uri, sequence = sequence, "Ignoring out-of-range sequence number");
            return;
        }
        debug!(uri = %uri, sequence = sequence, "Observation notification");
        self.on_representation(uri, &representation, Origin::Notification)
            .await;
    }

    /// Decode a representation into the resource at `uri`, the resource the
    /// answered request or observation was addressed to
    async fn on_representation(
        &self,
        uri: &str,
        representation: &Representation,
        origin: Origin,
    ) {
        if let Ok(reported) = representation.resource_uri() {
            if reported != uri {
                debug!(uri = %uri, reported = %reported, "Representation reports a different uri");
            }
        }

        let Some(outcome) = self
            .registry
            .update(uri, |resource| resource.apply(representation))
            .await
        else {
            debug!(uri = %uri, "Representation for unregistered resource");
            return;
        };
        for e in &outcome.errors {
            warn!(uri = %uri, error = %e, "Skipping representation field");
        }
        self.registry.touch(uri).await;

        let Some(resource) = self.registry.resource(uri).await else {
            return;
        };
        match resource.kind() {
            ResourceKind::Light | ResourceKind::Device => {
                if origin != Origin::Write {
                    if let Some(links) = resource.links() {
                        self.follow_links(uri, links, origin).await;
                    }
                }
                if resource.kind() == ResourceKind::Light
                    && self.registry.is_light_ready(uri).await
                {
                    self.reconciler.refresh_shadow().await;
                }
            }
            ResourceKind::Switch | ResourceKind::Brightness | ResourceKind::Configuration => {
                if let Some(parent) = resource.parent() {
                    self.registry.touch(parent).await;
                    if self.registry.is_light_ready(parent).await {
                        self.reconciler.refresh_shadow().await;
                    }
                }
            }
        }
    }

    async fn follow_links(&self, parent_uri: &str, links: &lightwire_core::Links, origin: Origin) {
        let Some(parent) = self.registry.handle(parent_uri).await else {
            return;
        };
        for link in links.followable() {
            let href = link.href.as_str();
            match self.registry.resource(href).await {
                Some(child) if child.parent() == Some(parent_uri) => {
                    // Observations are dropped every round; refetch on each parent fetch
                    if origin == Origin::Fetch {
                        if let Some(handle) = self.registry.handle(href).await {
                            self.observe_and_fetch(child.kind(), &handle);
                        }
                    }
                }
                Some(child) => {
                    let Some(handle) = self.registry.handle(href).await else {
                        continue;
                    };
                    self.registry
                        .register_child(parent_uri, child.kind(), handle.clone())
                        .await;
                    self.observe_and_fetch(child.kind(), &handle);
                }
                None => {
                    let Some(resource_type) = link.discovery_type() else {
                        warn!(uri = %parent_uri, href = %href, "Link has no resource type, not followed");
                        continue;
                    };
                    debug!(uri = %parent_uri, href = %href, rt = %resource_type, "Following link");
                    let scope = DiscoveryScope::Link {
                        parent_uri: parent_uri.to_string(),
                        href: href.to_string(),
                    };
                    if let Err(e) = self
                        .transport
                        .discover(Some(&parent.host), resource_type, scope)
                    {
                        warn!(uri = %parent_uri, href = %href, error = %e, "Link discovery failed");
                    }
                }
            }
        }
    }
}
