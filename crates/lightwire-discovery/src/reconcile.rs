//! Reconciliation and write-back
//!
//! A desired change is turned into a [`WritePlan`] by a single decision
//! function keyed on the light's latched mode: monolithic lights get one
//! PUT of their full representation, composite lights get one write per
//! affected sub-resource, using POST where the sub-resource's prefix
//! requires append-style updates. Fields whose sub-resource is missing or
//! was never fetched are skipped and reported.

use lightwire_core::{DesiredDelta, Light, Resource, ResourceMode, ShadowSnapshot};
use lightwire_transport::{Method, ResourceTransport};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classify::UriPrefixes;
use crate::registry::Registry;
use crate::shadow::ShadowPublisher;

/// How a sub-resource is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteVerb {
    /// Full replace (PUT)
    Replace,
    /// Append-style update (POST)
    Append,
}

impl WriteVerb {
    pub fn method(self) -> Method {
        match self {
            Self::Replace => Method::Put,
            Self::Append => Method::Post,
        }
    }
}

/// A field assignment carried by a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Assignment {
    PowerOn(bool),
    Brightness(i64),
    Name(String),
}

impl Assignment {
    fn field(&self) -> &'static str {
        match self {
            Self::PowerOn(_) => "powerOn",
            Self::Brightness(_) => "brightness",
            Self::Name(_) => "name",
        }
    }

    /// Apply to a resource, returning false when the resource does not
    /// carry this field
    fn apply(&self, resource: &mut Resource) -> bool {
        match (self, resource) {
            (Self::PowerOn(on), Resource::Light(light)) => {
                light.set_power_on(*on);
            }
            (Self::Brightness(level), Resource::Light(light)) => {
                light.set_brightness(*level);
            }
            (Self::Name(name), Resource::Light(light)) => {
                light.set_name(name.as_str());
            }
            (Self::PowerOn(on), Resource::Switch(switch)) => {
                switch.set_value(*on);
            }
            (Self::Brightness(level), Resource::Brightness(brightness)) => {
                brightness.set_level(*level);
            }
            (Self::Name(name), Resource::Configuration(config)) => {
                config.set_name(name.as_str());
            }
            _ => return false,
        }
        true
    }
}

/// One write to issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteStep {
    pub uri: String,
    pub verb: WriteVerb,
    pub assignments: Vec<Assignment>,
}

/// A field that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedField {
    pub field: &'static str,
    pub reason: String,
}

/// Writes required to apply a desired change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WritePlan {
    pub steps: Vec<WriteStep>,
    pub skipped: Vec<SkippedField>,
}

impl WritePlan {
    fn skip(&mut self, assignment: &Assignment, reason: impl Into<String>) {
        self.skipped.push(SkippedField {
            field: assignment.field(),
            reason: reason.into(),
        });
    }
}

/// Decide how to write `assignments` to `light`.
///
/// `child_ready` reports whether a sub-resource is registered and has been
/// fetched at least once.
pub fn plan_write(
    light: &Light,
    assignments: Vec<Assignment>,
    child_ready: impl Fn(&str) -> bool,
    prefixes: &UriPrefixes,
) -> WritePlan {
    let mut plan = WritePlan::default();

    match light.mode() {
        None => {
            for assignment in &assignments {
                plan.skip(assignment, "light has not been fetched yet");
            }
        }
        Some(ResourceMode::Monolithic) => {
            if !assignments.is_empty() {
                plan.steps.push(WriteStep {
                    uri: light.uri.clone(),
                    verb: WriteVerb::Replace,
                    assignments,
                });
            }
        }
        Some(ResourceMode::Composite) => {
            for assignment in assignments {
                let child = match &assignment {
                    Assignment::PowerOn(_) => light.children.switch.as_deref(),
                    Assignment::Brightness(_) => light.children.brightness.as_deref(),
                    Assignment::Name(_) if !prefixes.supports_rename(&light.uri) => {
                        plan.skip(&assignment, "light does not support rename");
                        continue;
                    }
                    Assignment::Name(_) => light.children.configuration.as_deref(),
                };
                match child {
                    Some(uri) if child_ready(uri) => {
                        let verb = if prefixes.requires_append_update(uri) {
                            WriteVerb::Append
                        } else {
                            WriteVerb::Replace
                        };
                        plan.steps.push(WriteStep {
                            uri: uri.to_string(),
                            verb,
                            assignments: vec![assignment],
                        });
                    }
                    Some(uri) => plan.skip(&assignment, format!("{uri} has not been fetched yet")),
                    None => plan.skip(&assignment, "sub-resource not discovered"),
                }
            }
        }
    }

    plan
}

/// Writes issued and fields skipped while applying a desired change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub issued: Vec<(Method, String)>,
    pub skipped: Vec<SkippedField>,
}

/// Applies desired state to discovered lights and refreshes the shadow
pub struct Reconciler {
    registry: Arc<Registry>,
    transport: Arc<dyn ResourceTransport>,
    prefixes: Arc<UriPrefixes>,
    shadow: Option<Arc<ShadowPublisher>>,
}

impl Reconciler {
    pub fn new(
        registry: Arc<Registry>,
        transport: Arc<dyn ResourceTransport>,
        prefixes: Arc<UriPrefixes>,
        shadow: Option<Arc<ShadowPublisher>>,
    ) -> Self {
        Self {
            registry,
            transport,
            prefixes,
            shadow,
        }
    }

    pub fn shadow(&self) -> Option<&Arc<ShadowPublisher>> {
        self.shadow.as_ref()
    }

    /// Rebuild the snapshot from the registry and publish it when a shadow
    /// is attached
    pub async fn refresh_shadow(&self) -> ShadowSnapshot {
        let snapshot = ShadowSnapshot::new(self.registry.light_summaries().await);
        if let Some(shadow) = &self.shadow {
            shadow.publish(snapshot.clone()).await;
        }
        snapshot
    }

    pub async fn apply_desired_power_and_brightness(
        &self,
        uri: &str,
        power_on: bool,
        brightness: i64,
    ) -> WriteReport {
        self.apply(
            uri,
            vec![Assignment::PowerOn(power_on), Assignment::Brightness(brightness)],
        )
        .await
    }

    /// Record the override name, then write it to the peer when the light
    /// can be renamed
    pub async fn apply_desired_name(&self, uri: &str, name: &str) -> WriteReport {
        if !matches!(self.registry.resource(uri).await, Some(Resource::Light(_))) {
            debug!(uri = %uri, "Rename requested for a resource that is not a light");
            return WriteReport::default();
        }
        if let Err(e) = self.registry.names().set_name_for_uri(uri, name) {
            warn!(uri = %uri, error = %e, "Failed to store name override");
        }
        let report = self.apply(uri, vec![Assignment::Name(name.to_string())]).await;
        self.refresh_shadow().await;
        report
    }

    /// Apply a desired-state delta against the current snapshot entry
    pub async fn apply_delta(&self, delta: &DesiredDelta) -> WriteReport {
        let Some(current) = self.registry.light_summary(&delta.uri).await else {
            debug!(uri = %delta.uri, "Delta for unknown or unready light ignored");
            return WriteReport::default();
        };

        let mut report = WriteReport::default();
        if let Some(name) = delta.name.as_deref() {
            if name != current.name {
                report = self.apply_desired_name(&delta.uri, name).await;
            }
        }

        let power_on = delta.power_on.unwrap_or(current.power_on);
        let brightness = delta
            .brightness
            .unwrap_or_else(|| i64::from(current.brightness));
        let power_changed = power_on != current.power_on;
        let brightness_changed =
            lightwire_core::clamp_brightness(brightness) != current.brightness;
        if power_changed || brightness_changed {
            let written = self
                .apply_desired_power_and_brightness(&delta.uri, power_on, brightness)
                .await;
            report.issued.extend(written.issued);
            report.skipped.extend(written.skipped);
        }
        report
    }

    async fn apply(&self, uri: &str, assignments: Vec<Assignment>) -> WriteReport {
        let Some(Resource::Light(light)) = self.registry.resource(uri).await else {
            debug!(uri = %uri, "Write-back requested for unknown light");
            return WriteReport::default();
        };

        let mut ready = Vec::new();
        for child in light.children.uris() {
            if self
                .registry
                .resource(child)
                .await
                .is_some_and(|r| r.is_initialized())
            {
                ready.push(child.to_string());
            }
        }
        let plan = plan_write(
            &light,
            assignments,
            |child| ready.iter().any(|r| r == child),
            &self.prefixes,
        );
        for skipped in &plan.skipped {
            warn!(uri = %uri, field = skipped.field, reason = %skipped.reason, "Write-back skipped");
        }

        let mut report = WriteReport {
            issued: Vec::new(),
            skipped: plan.skipped,
        };
        for step in plan.steps {
            if let Some(method) = self.execute(&step).await {
                report.issued.push((method, step.uri));
            }
        }
        report
    }

    async fn execute(&self, step: &WriteStep) -> Option<Method> {
        let handle = self.registry.handle(&step.uri).await?;
        let body = self
            .registry
            .update(&step.uri, |resource| {
                for assignment in &step.assignments {
                    if !assignment.apply(resource) {
                        warn!(uri = %step.uri, field = assignment.field(), "Field not carried by resource");
                    }
                }
                resource.to_representation()
            })
            .await?;

        let method = step.verb.method();
        let result = match method {
            Method::Post => self.transport.post(&handle, &body),
            _ => self.transport.put(&handle, &body),
        };
        match result {
            Ok(()) => {
                info!(uri = %step.uri, method = %method, "Write-back issued");
                Some(method)
            }
            Err(e) => {
                warn!(uri = %step.uri, method = %method, error = %e, "Write-back failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::shadow::testing::RecordingSink;
    use lightwire_core::representation::{BRIGHTNESS_KEY, LINKS_KEY, NAME_KEY, VALUE_KEY};
    use lightwire_core::{MemoryNameStore, NameStore, Representation};
    use lightwire_transport::sim::LIGHT_RT;
    use lightwire_transport::{
        event_channel, EventReceiver, LightLayout, SimulatedLight, SimulatedNetwork,
    };
    use serde_json::json;

    struct Harness {
        sim: Arc<SimulatedNetwork>,
        events: EventReceiver,
        pipeline: Pipeline,
        names: Arc<MemoryNameStore>,
        sink: Arc<RecordingSink>,
    }

    impl Harness {
        async fn with_light(light: SimulatedLight) -> (Self, String) {
            let (tx, events) = event_channel();
            let sim = Arc::new(SimulatedNetwork::new(tx));
            let names = Arc::new(MemoryNameStore::new());
            let registry = Arc::new(Registry::new(names.clone()));
            let sink = Arc::new(RecordingSink::default());
            let shadow = Arc::new(ShadowPublisher::new(sink.clone()));
            let pipeline = Pipeline::new(
                registry,
                sim.clone(),
                UriPrefixes::default(),
                LIGHT_RT,
                Some(shadow),
            );
            let uri = sim.add_light(&light);
            let mut harness = Self {
                sim,
                events,
                pipeline,
                names,
                sink,
            };
            harness.pipeline.discover();
            harness.settle().await;
            harness.sim.clear_requests();
            (harness, uri)
        }

        async fn settle(&mut self) {
            self.pipeline.drain(&mut self.events).await;
        }

        fn reconciler(&self) -> &Reconciler {
            self.pipeline.reconciler()
        }
    }

    fn composite(uri: &str, switch: &str, brightness: &str) -> Light {
        let mut light = Light::new(uri);
        light.apply(&Representation::new(uri).with(
            LINKS_KEY,
            json!([{ "href": switch }, { "href": brightness }]),
        ));
        light.children.switch = Some(switch.to_string());
        light.children.brightness = Some(brightness.to_string());
        light
    }

    #[test]
    fn test_plan_monolithic_single_put() {
        let mut light = Light::new("/a/light/1");
        light.apply(&Representation::new("/a/light/1").with(NAME_KEY, "Hall"));

        let plan = plan_write(
            &light,
            vec![Assignment::PowerOn(true), Assignment::Brightness(70)],
            |_| false,
            &UriPrefixes::default(),
        );
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].uri, "/a/light/1");
        assert_eq!(plan.steps[0].verb, WriteVerb::Replace);
        assert_eq!(plan.steps[0].assignments.len(), 2);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_plan_composite_per_child_verbs() {
        let light = composite("/upnp/light/1", "/upnp/switch/1", "/upnp/brightness/1");
        let plan = plan_write(
            &light,
            vec![Assignment::PowerOn(true), Assignment::Brightness(70)],
            |_| true,
            &UriPrefixes::default(),
        );
        let verbs: Vec<(&str, WriteVerb)> =
            plan.steps.iter().map(|s| (s.uri.as_str(), s.verb)).collect();
        assert_eq!(
            verbs,
            vec![
                ("/upnp/switch/1", WriteVerb::Append),
                ("/upnp/brightness/1", WriteVerb::Append),
            ]
        );

        let light = composite("/ocf/light/1", "/ocf/switch/1", "/ocf/brightness/1");
        let plan = plan_write(
            &light,
            vec![Assignment::PowerOn(true)],
            |_| true,
            &UriPrefixes::default(),
        );
        assert_eq!(plan.steps[0].verb, WriteVerb::Replace);
    }

    #[test]
    fn test_plan_partial_when_child_not_ready() {
        let light = composite("/ocf/light/1", "/ocf/switch/1", "/ocf/brightness/1");
        let plan = plan_write(
            &light,
            vec![Assignment::PowerOn(true), Assignment::Brightness(70)],
            |uri| uri == "/ocf/brightness/1",
            &UriPrefixes::default(),
        );
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].uri, "/ocf/brightness/1");
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].field, "powerOn");
    }

    #[test]
    fn test_plan_rename_policy() {
        let prefixes = UriPrefixes::default();

        let mut light = composite("/ocf/light/1", "/ocf/switch/1", "/ocf/brightness/1");
        let plan = plan_write(&light, vec![Assignment::Name("Den".into())], |_| true, &prefixes);
        assert_eq!(plan.skipped[0].reason, "sub-resource not discovered");

        light.children.configuration = Some("/ocf/light-config/1".to_string());
        let plan = plan_write(&light, vec![Assignment::Name("Den".into())], |_| true, &prefixes);
        assert_eq!(plan.steps[0].uri, "/ocf/light-config/1");

        let bridged = composite("/upnp/light/1", "/upnp/switch/1", "/upnp/brightness/1");
        let plan = plan_write(&bridged, vec![Assignment::Name("Den".into())], |_| true, &prefixes);
        assert!(plan.steps.is_empty());
        assert_eq!(plan.skipped[0].reason, "light does not support rename");
    }

    #[test]
    fn test_plan_unfetched_light_skips_everything() {
        let light = Light::new("/ocf/light/1");
        let plan = plan_write(
            &light,
            vec![Assignment::PowerOn(true)],
            |_| true,
            &UriPrefixes::default(),
        );
        assert!(plan.steps.is_empty());
        assert_eq!(plan.skipped.len(), 1);
    }

    #[tokio::test]
    async fn test_composite_end_to_end() {
        let light_config =
            SimulatedLight::new("Desk", LightLayout::Composite).with_state(false, 40);
        let (mut h, light) = Harness::with_light(light_config).await;

        let report = h.reconciler().apply_desired_power_and_brightness(&light, true, 70).await;
        assert!(report.skipped.is_empty());

        let writes = h.sim.writes();
        assert_eq!(writes.len(), 2);
        let switch = light.replace("/ocf/light/", "/ocf/switch/");
        let brightness = light.replace("/ocf/light/", "/ocf/brightness/");
        assert_eq!(writes[0].0, Method::Put);
        assert_eq!(writes[0].1, switch);
        assert_eq!(writes[0].2.get_bool(VALUE_KEY), Ok(Some(true)));
        assert_eq!(writes[1].0, Method::Put);
        assert_eq!(writes[1].1, brightness);
        assert_eq!(writes[1].2.get_i64(BRIGHTNESS_KEY), Ok(Some(70)));

        h.settle().await;
        let snapshot = h.sink.last_published().unwrap();
        assert!(snapshot.light_devices[0].power_on);
        assert_eq!(snapshot.light_devices[0].brightness, 70);
    }

    #[tokio::test]
    async fn test_bridged_children_written_with_post() {
        let (mut h, light) =
            Harness::with_light(SimulatedLight::new("Porch", LightLayout::Bridged)).await;

        let report = h.reconciler().apply_desired_power_and_brightness(&light, true, 15).await;
        assert_eq!(report.issued.len(), 2);
        assert!(h.sim.writes().iter().all(|(method, _, _)| *method == Method::Post));

        h.settle().await;
        let state = h.sim.light(&light).unwrap();
        assert!(state.power_on);
        assert_eq!(state.brightness, 15);
    }

    #[tokio::test]
    async fn test_monolithic_single_put_with_full_representation() {
        let (mut h, light) =
            Harness::with_light(SimulatedLight::new("Hall", LightLayout::Monolithic)).await;

        h.reconciler().apply_desired_power_and_brightness(&light, true, 250).await;
        let writes = h.sim.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, Method::Put);
        assert_eq!(writes[0].1, light);
        assert_eq!(writes[0].2.get_str(NAME_KEY), Ok(Some("Hall")));
        assert_eq!(writes[0].2.get_i64(BRIGHTNESS_KEY), Ok(Some(100)));

        h.settle().await;
        assert_eq!(h.sink.last_published().unwrap().light_devices[0].brightness, 100);
    }

    #[tokio::test]
    async fn test_partial_write_back_when_switch_missing() {
        let light_config =
            SimulatedLight::new("Desk", LightLayout::Composite).with_state(false, 40);
        let (mut h, light) = Harness::with_light(light_config).await;
        let switch = light.replace("/ocf/light/", "/ocf/switch/");
        h.pipeline.registry().remove(&switch).await;

        let report = h.reconciler().apply_desired_power_and_brightness(&light, true, 70).await;
        assert_eq!(report.issued.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].field, "powerOn");

        h.settle().await;
        let state = h.sim.light(&light).unwrap();
        assert!(!state.power_on);
        assert_eq!(state.brightness, 70);
    }

    #[tokio::test]
    async fn test_rename_paths() {
        let (mut h, light) =
            Harness::with_light(SimulatedLight::new("Desk", LightLayout::Composite)).await;
        h.reconciler().apply_desired_name(&light, "Study").await;
        assert_eq!(h.names.name_for_uri(&light).as_deref(), Some("Study"));
        let writes = h.sim.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].1.starts_with("/ocf/light-config/"));
        h.settle().await;
        assert_eq!(h.sim.light(&light).unwrap().name, "Study");

        let (h, light) =
            Harness::with_light(SimulatedLight::new("Porch", LightLayout::Bridged)).await;
        let report = h.reconciler().apply_desired_name(&light, "Front door").await;
        assert!(report.issued.is_empty());
        assert!(h.sim.writes().is_empty());
        let snapshot = h.sink.last_published().unwrap();
        assert_eq!(snapshot.light_devices[0].name, "Front door");
    }

    #[tokio::test]
    async fn test_rename_ignores_non_light_resources() {
        let (h, light) =
            Harness::with_light(SimulatedLight::new("Desk", LightLayout::Composite)).await;
        let switch = light.replace("/ocf/light/", "/ocf/switch/");
        assert!(h.pipeline.registry().contains(&switch).await);

        let report = h.reconciler().apply_desired_name(&switch, "Lamp").await;
        assert!(report.issued.is_empty());
        assert!(!h.names.has_uri(&switch));
        assert!(h.sim.writes().is_empty());

        let report = h.reconciler().apply_desired_name("/ocf/light/missing", "Lamp").await;
        assert!(report.issued.is_empty());
        assert!(!h.names.has_uri("/ocf/light/missing"));
    }

    #[tokio::test]
    async fn test_delta_fills_missing_fields_from_snapshot() {
        let light_config =
            SimulatedLight::new("Desk", LightLayout::Composite).with_state(true, 40);
        let (h, light) = Harness::with_light(light_config).await;

        let delta = DesiredDelta {
            uri: light.clone(),
            brightness: Some(60),
            ..DesiredDelta::default()
        };
        h.reconciler().apply_delta(&delta).await;
        let writes = h.sim.writes();
        let switch_write = writes
            .iter()
            .find(|(_, uri, _)| uri.starts_with("/ocf/switch/"))
            .unwrap();
        assert_eq!(switch_write.2.get_bool(VALUE_KEY), Ok(Some(true)));

        h.sim.clear_requests();
        let unknown = DesiredDelta {
            uri: "/ocf/light/unknown".to_string(),
            power_on: Some(false),
            ..DesiredDelta::default()
        };
        assert_eq!(h.reconciler().apply_delta(&unknown).await, WriteReport::default());
        assert!(h.sim.writes().is_empty());
    }
}
