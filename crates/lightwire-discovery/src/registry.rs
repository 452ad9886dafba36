//! Resource registry
//!
//! Three correlated tables keyed by URI: transport handle, typed resource
//! and last-seen timestamp. They live behind a single lock so every
//! operation adds or removes a key from all three at once and readers never
//! observe a partially registered resource.

use chrono::{DateTime, Utc};
use lightwire_core::{
    LightSummary, NameStore, Resource, ResourceKind, ResourceMode, ResourceRef,
};
use lightwire_transport::ResourceHandle;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Listing entry for one registered resource
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    #[serde(flatten)]
    pub resource: ResourceRef,
    pub host: String,
    pub parent: Option<String>,
    pub initialized: bool,
    pub last_seen: DateTime<Utc>,
}

/// Outcome of registering a resource found by following a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRegistration {
    /// Newly registered under the parent
    Registered,
    /// Already registered, now attached to the parent
    Adopted,
    /// Already registered under this parent
    Existing,
}

#[derive(Debug, Default)]
struct Tables {
    handles: HashMap<String, ResourceHandle>,
    resources: HashMap<String, Resource>,
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl Tables {
    fn insert(&mut self, kind: ResourceKind, handle: ResourceHandle, now: DateTime<Utc>) {
        let uri = handle.uri.clone();
        self.resources.insert(uri.clone(), Resource::new(kind, &uri));
        self.last_seen.insert(uri.clone(), now);
        self.handles.insert(uri, handle);
    }

    fn remove(&mut self, uri: &str) -> Option<(ResourceHandle, Resource)> {
        let handle = self.handles.remove(uri)?;
        self.last_seen.remove(uri);
        let resource = self.resources.remove(uri)?;
        if let Some(parent) = resource.parent() {
            if let Some(Resource::Light(light)) = self.resources.get_mut(parent) {
                if let Some(slot) = light.children.slot_mut(resource.kind()) {
                    if slot.as_deref() == Some(uri) {
                        *slot = None;
                    }
                }
            }
        }
        Some((handle, resource))
    }

    fn remove_cascade(&mut self, parent_uri: &str) -> Vec<ResourceHandle> {
        let Some(parent) = self.resources.get(parent_uri) else {
            return Vec::new();
        };

        let mut children: Vec<String> = parent
            .links()
            .map(|links| links.hrefs().map(str::to_string).collect())
            .unwrap_or_default();
        if let Resource::Light(light) = parent {
            for uri in light.children.uris() {
                if !children.iter().any(|c| c == uri) {
                    children.push(uri.to_string());
                }
            }
        }

        let mut removed = Vec::new();
        for child in children {
            if child == parent_uri {
                continue;
            }
            if let Some((handle, _)) = self.remove(&child) {
                removed.push(handle);
            }
        }
        if let Some((handle, _)) = self.remove(parent_uri) {
            removed.push(handle);
        }
        removed
    }

    /// Attach `child` to `parent`, filling the light's child slot
    fn attach(&mut self, parent_uri: &str, child_uri: &str) {
        let Some(kind) = self.resources.get(child_uri).map(Resource::kind) else {
            return;
        };
        let Some(parent) = self.resources.get_mut(parent_uri) else {
            return;
        };
        if let Resource::Light(light) = parent {
            if let Some(slot) = light.children.slot_mut(kind) {
                *slot = Some(child_uri.to_string());
            }
        }
        if let Some(child) = self.resources.get_mut(child_uri) {
            child.set_parent(parent_uri);
        }
    }

    fn is_initialized(&self, uri: Option<&str>) -> bool {
        uri.and_then(|uri| self.resources.get(uri))
            .is_some_and(Resource::is_initialized)
    }

    fn is_light_ready(&self, uri: &str) -> bool {
        let Some(Resource::Light(light)) = self.resources.get(uri) else {
            return false;
        };
        if !self.is_initialized(Some(uri)) {
            return false;
        }
        match light.mode() {
            Some(ResourceMode::Composite) => {
                self.is_initialized(light.children.switch.as_deref())
                    && self.is_initialized(light.children.brightness.as_deref())
            }
            Some(ResourceMode::Monolithic) => true,
            None => false,
        }
    }

    fn summary(&self, uri: &str, names: &dyn NameStore) -> Option<LightSummary> {
        if !self.is_light_ready(uri) {
            return None;
        }
        let Some(Resource::Light(light)) = self.resources.get(uri) else {
            return None;
        };

        let (power_on, brightness, configured_name) = if light.is_composite() {
            let power_on = match light
                .children
                .switch
                .as_deref()
                .and_then(|u| self.resources.get(u))
            {
                Some(Resource::Switch(switch)) => switch.value(),
                _ => light.power_on(),
            };
            let brightness = match light
                .children
                .brightness
                .as_deref()
                .and_then(|u| self.resources.get(u))
            {
                Some(Resource::Brightness(brightness)) => brightness.level(),
                _ => light.brightness(),
            };
            let configured_name = match light
                .children
                .configuration
                .as_deref()
                .and_then(|u| self.resources.get(u))
            {
                Some(Resource::Configuration(config)) if !config.name().is_empty() => {
                    Some(config.name().to_string())
                }
                _ => None,
            };
            (power_on, brightness, configured_name)
        } else {
            (light.power_on(), light.brightness(), None)
        };

        let name = names
            .name_for_uri(uri)
            .or(configured_name)
            .unwrap_or_else(|| light.name().to_string());

        Some(LightSummary {
            name,
            uri: uri.to_string(),
            power_on,
            brightness,
        })
    }
}

/// Registry of discovered resources
pub struct Registry {
    tables: RwLock<Tables>,
    names: Arc<dyn NameStore>,
}

impl Registry {
    pub fn new(names: Arc<dyn NameStore>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            names,
        }
    }

    /// Naming-override store used when building summaries
    pub fn names(&self) -> &Arc<dyn NameStore> {
        &self.names
    }

    /// Register a resource, returning whether it was newly inserted
    pub async fn register(&self, kind: ResourceKind, handle: ResourceHandle) -> bool {
        self.register_at(kind, handle, Utc::now()).await
    }

    pub async fn register_at(
        &self,
        kind: ResourceKind,
        handle: ResourceHandle,
        now: DateTime<Utc>,
    ) -> bool {
        let mut tables = self.tables.write().await;
        if tables.resources.contains_key(&handle.uri) {
            return false;
        }
        info!(uri = %handle.uri, kind = %kind, host = %handle.host, "Resource registered");
        tables.insert(kind, handle, now);
        true
    }

    /// Register a resource reached through a parent's link
    ///
    /// A resource already registered on its own is attached to the parent
    /// instead of being duplicated. When the parent is no longer tracked the
    /// child is registered without one.
    pub async fn register_child(
        &self,
        parent_uri: &str,
        kind: ResourceKind,
        handle: ResourceHandle,
    ) -> ChildRegistration {
        let mut tables = self.tables.write().await;
        let uri = handle.uri.clone();
        let outcome = match tables.resources.get(&uri) {
            Some(existing) if existing.parent() == Some(parent_uri) => {
                return ChildRegistration::Existing
            }
            Some(_) => ChildRegistration::Adopted,
            None => {
                tables.insert(kind, handle, Utc::now());
                ChildRegistration::Registered
            }
        };
        if tables.resources.contains_key(parent_uri) {
            tables.attach(parent_uri, &uri);
        } else {
            debug!(uri = %uri, parent = %parent_uri, "Parent no longer tracked, child kept without parent");
        }
        info!(uri = %uri, kind = %kind, parent = %parent_uri, outcome = ?outcome, "Linked resource registered");
        outcome
    }

    pub async fn lookup(&self, uri: &str) -> Option<ResourceRef> {
        self.tables.read().await.resources.get(uri).map(Resource::to_ref)
    }

    pub async fn resource(&self, uri: &str) -> Option<Resource> {
        self.tables.read().await.resources.get(uri).cloned()
    }

    pub async fn handle(&self, uri: &str) -> Option<ResourceHandle> {
        self.tables.read().await.handles.get(uri).cloned()
    }

    pub async fn contains(&self, uri: &str) -> bool {
        self.tables.read().await.resources.contains_key(uri)
    }

    pub async fn last_seen(&self, uri: &str) -> Option<DateTime<Utc>> {
        self.tables.read().await.last_seen.get(uri).copied()
    }

    /// Refresh the liveness timestamp
    pub async fn touch(&self, uri: &str) -> bool {
        self.touch_at(uri, Utc::now()).await
    }

    pub async fn touch_at(&self, uri: &str, at: DateTime<Utc>) -> bool {
        let mut tables = self.tables.write().await;
        match tables.last_seen.get_mut(uri) {
            Some(last_seen) => {
                *last_seen = at;
                true
            }
            None => false,
        }
    }

    /// Mutate a registered resource in place
    pub async fn update<R>(&self, uri: &str, f: impl FnOnce(&mut Resource) -> R) -> Option<R> {
        let mut tables = self.tables.write().await;
        tables.resources.get_mut(uri).map(f)
    }

    /// Remove one resource from all tables
    pub async fn remove(&self, uri: &str) -> bool {
        let removed = self.tables.write().await.remove(uri).is_some();
        if removed {
            info!(uri = %uri, "Resource removed");
        }
        removed
    }

    /// Remove a resource together with every resource it links to,
    /// returning the handles of everything removed
    pub async fn remove_cascade(&self, parent_uri: &str) -> Vec<ResourceHandle> {
        let removed = self.tables.write().await.remove_cascade(parent_uri);
        if !removed.is_empty() {
            info!(uri = %parent_uri, removed = removed.len(), "Resource removed with linked children");
        }
        removed
    }

    /// Cascade-remove a resource only if it is still last seen at or before
    /// `cutoff` when the write lock is held
    pub async fn remove_cascade_if_stale(
        &self,
        parent_uri: &str,
        cutoff: DateTime<Utc>,
    ) -> Vec<ResourceHandle> {
        let mut tables = self.tables.write().await;
        if tables.resources.get(parent_uri).and_then(Resource::parent).is_some() {
            debug!(uri = %parent_uri, "Resource adopted since sweep started, kept");
            return Vec::new();
        }
        match tables.last_seen.get(parent_uri) {
            Some(seen) if *seen <= cutoff => {}
            Some(_) => {
                debug!(uri = %parent_uri, "Resource refreshed since sweep started, kept");
                return Vec::new();
            }
            None => return Vec::new(),
        }
        let removed = tables.remove_cascade(parent_uri);
        info!(uri = %parent_uri, removed = removed.len(), "Stale resource removed with linked children");
        removed
    }

    /// Top-level resources last seen at or before `cutoff`
    pub async fn stale_top_level(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        let tables = self.tables.read().await;
        let mut stale: Vec<String> = tables
            .resources
            .values()
            .filter(|r| r.parent().is_none())
            .filter(|r| {
                tables
                    .last_seen
                    .get(r.uri())
                    .is_some_and(|seen| *seen <= cutoff)
            })
            .map(|r| r.uri().to_string())
            .collect();
        stale.sort();
        stale
    }

    /// Number of tracked resources without a parent
    pub async fn top_level_count(&self) -> usize {
        self.tables
            .read()
            .await
            .resources
            .values()
            .filter(|r| r.parent().is_none())
            .count()
    }

    /// Whether a light has been fetched far enough to be reported
    pub async fn is_light_ready(&self, uri: &str) -> bool {
        self.tables.read().await.is_light_ready(uri)
    }

    /// Summary of one light, if it is ready to be reported
    pub async fn light_summary(&self, uri: &str) -> Option<LightSummary> {
        self.tables.read().await.summary(uri, self.names.as_ref())
    }

    /// Summaries of every light ready to be reported
    pub async fn light_summaries(&self) -> Vec<LightSummary> {
        let tables = self.tables.read().await;
        tables
            .resources
            .values()
            .filter(|r| r.kind() == ResourceKind::Light)
            .filter_map(|r| tables.summary(r.uri(), self.names.as_ref()))
            .collect()
    }

    /// Parent recorded for a linked resource
    pub async fn parent_of(&self, uri: &str) -> Option<String> {
        let tables = self.tables.read().await;
        tables
            .resources
            .get(uri)
            .and_then(|r| r.parent().map(str::to_string))
    }

    pub async fn handles(&self) -> Vec<ResourceHandle> {
        self.tables.read().await.handles.values().cloned().collect()
    }

    /// Listing of every registered resource, ordered by URI
    pub async fn entries(&self) -> Vec<RegistryEntry> {
        let tables = self.tables.read().await;
        let mut entries: Vec<RegistryEntry> = tables
            .resources
            .values()
            .filter_map(|r| {
                let handle = tables.handles.get(r.uri())?;
                let last_seen = *tables.last_seen.get(r.uri())?;
                Some(RegistryEntry {
                    resource: r.to_ref(),
                    host: handle.host.clone(),
                    parent: r.parent().map(str::to_string),
                    initialized: r.is_initialized(),
                    last_seen,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.resource.uri.cmp(&b.resource.uri));
        entries
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.resources.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.resources.is_empty()
    }

    /// Whether all three tables hold the same key set
    pub async fn is_consistent(&self) -> bool {
        let tables = self.tables.read().await;
        tables.handles.len() == tables.resources.len()
            && tables.last_seen.len() == tables.resources.len()
            && tables
                .resources
                .keys()
                .all(|k| tables.handles.contains_key(k) && tables.last_seen.contains_key(k))
    }
}
