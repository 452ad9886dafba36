//! In-process simulated peer network
//!
//! Each simulated peer hosts one light in one of three layouts:
//! - composite: `/ocf/light/<id>` linking to configuration, switch and
//!   brightness sub-resources plus the `/oic/d` self-reference
//! - bridged: `/upnp/light/<id>` whose sub-resources only accept POST
//! - monolithic: `/a/light/<id>` carrying name, power and brightness itself
//!
//! Requests are answered synchronously on the event channel, observers are
//! notified with an increasing sequence number, and the most recent
//! requests are recorded so tests can assert on the exact writes issued.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lightwire_core::representation::{
    BRIGHTNESS_KEY, LEGACY_NAME_KEY, LINKS_KEY, NAME_KEY, VALUE_KEY,
};
use lightwire_core::{clamp_brightness, Link, Links, Representation, DEVICE_HREF};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::transport::{
    DiscoveryScope, EventSender, Method, ResourceHandle, ResourceTransport, TransportError,
    TransportErrorCode, TransportEvent, MAX_SEQUENCE_NUMBER,
};

pub const LIGHT_RT: &str = "oic.d.light";
pub const COLLECTION_RT: &str = "oic.wk.col";
pub const DEVICE_RT: &str = "oic.wk.d";
pub const SWITCH_RT: &str = "oic.r.switch.binary";
pub const BRIGHTNESS_RT: &str = "oic.r.light.brightness";
pub const CONFIGURATION_RT: &str = "oic.wk.con";

/// Requests kept for inspection
const REQUEST_LOG_CAPACITY: usize = 1024;

fn default_true() -> bool {
    true
}

fn default_brightness() -> i64 {
    100
}

/// How a simulated light lays out its resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightLayout {
    Composite,
    Bridged,
    Monolithic,
}

/// Description of a simulated light
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedLight {
    pub name: String,
    /// Expose state through linked sub-resources
    #[serde(default = "default_true")]
    pub composite: bool,
    /// Use bridged URIs whose sub-resources only accept POST
    #[serde(default)]
    pub bridged: bool,
    #[serde(default)]
    pub power_on: bool,
    #[serde(default = "default_brightness")]
    pub brightness: i64,
}

impl SimulatedLight {
    pub fn new(name: impl Into<String>, layout: LightLayout) -> Self {
        Self {
            name: name.into(),
            composite: layout != LightLayout::Monolithic,
            bridged: layout == LightLayout::Bridged,
            power_on: false,
            brightness: default_brightness(),
        }
    }

    pub fn with_state(mut self, power_on: bool, brightness: i64) -> Self {
        self.power_on = power_on;
        self.brightness = brightness;
        self
    }

    pub fn layout(&self) -> LightLayout {
        if self.bridged {
            LightLayout::Bridged
        } else if self.composite {
            LightLayout::Composite
        } else {
            LightLayout::Monolithic
        }
    }
}

/// A request received by the simulated network
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedRequest {
    Discover {
        host: Option<String>,
        type_filter: String,
    },
    DeviceInfo {
        host: String,
    },
    Get {
        uri: String,
    },
    Put {
        uri: String,
        body: Representation,
    },
    Post {
        uri: String,
        body: Representation,
    },
    Observe {
        uri: String,
    },
    CancelObserve {
        uri: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Light,
    Switch,
    Brightness,
    Configuration,
    Device,
}

#[derive(Debug)]
struct Peer {
    id: String,
    host: String,
    layout: LightLayout,
    name: String,
    power_on: bool,
    brightness: u8,
    online: bool,
}

impl Peer {
    fn light_uri(&self) -> String {
        match self.layout {
            LightLayout::Composite => format!("/ocf/light/{}", self.id),
            LightLayout::Bridged => format!("/upnp/light/{}", self.id),
            LightLayout::Monolithic => format!("/a/light/{}", self.id),
        }
    }

    fn part_uri(&self, part: Part) -> Option<String> {
        match (self.layout, part) {
            (_, Part::Light) => Some(self.light_uri()),
            (_, Part::Device) => Some(DEVICE_HREF.to_string()),
            (LightLayout::Composite, Part::Switch) => Some(format!("/ocf/switch/{}", self.id)),
            (LightLayout::Composite, Part::Brightness) => {
                Some(format!("/ocf/brightness/{}", self.id))
            }
            (LightLayout::Composite, Part::Configuration) => {
                Some(format!("/ocf/light-config/{}", self.id))
            }
            (LightLayout::Bridged, Part::Switch) => Some(format!("/upnp/switch/{}", self.id)),
            (LightLayout::Bridged, Part::Brightness) => {
                Some(format!("/upnp/brightness/{}", self.id))
            }
            _ => None,
        }
    }

    fn parts(&self) -> Vec<(Part, String)> {
        [
            Part::Light,
            Part::Switch,
            Part::Brightness,
            Part::Configuration,
            Part::Device,
        ]
        .into_iter()
        .filter_map(|part| self.part_uri(part).map(|uri| (part, uri)))
        .collect()
    }

    /// Part served at `uri`; the device self-reference is only reachable by host
    fn part_at(&self, uri: &str) -> Option<Part> {
        self.parts()
            .into_iter()
            .find(|(part, candidate)| *part != Part::Device && candidate == uri)
            .map(|(part, _)| part)
    }

    fn resource_types(&self, part: Part) -> Vec<String> {
        let types: &[&str] = match part {
            Part::Light if self.layout == LightLayout::Monolithic => &[LIGHT_RT],
            Part::Light => &[LIGHT_RT, COLLECTION_RT],
            Part::Switch => &[SWITCH_RT],
            Part::Brightness => &[BRIGHTNESS_RT],
            Part::Configuration => &[CONFIGURATION_RT],
            Part::Device => &[DEVICE_RT, LIGHT_RT],
        };
        types.iter().map(|t| t.to_string()).collect()
    }

    fn handle(&self, part: Part, uri: String) -> ResourceHandle {
        ResourceHandle::new(uri, self.host.clone(), self.resource_types(part))
    }

    fn links(&self) -> Links {
        let mut links: Vec<Link> = [Part::Configuration, Part::Switch, Part::Brightness]
            .into_iter()
            .filter_map(|part| {
                self.part_uri(part)
                    .map(|uri| Link::new(uri, self.resource_types(part)))
            })
            .collect();
        if self.layout == LightLayout::Composite {
            links.push(Link::new(DEVICE_HREF, self.resource_types(Part::Device)));
        }
        Links::new(links)
    }

    fn representation(&self, part: Part) -> Representation {
        let uri = self.part_uri(part).unwrap_or_default();
        let rep = Representation::new(uri);
        match (part, self.layout) {
            (Part::Light, LightLayout::Monolithic) => rep
                .with(NAME_KEY, self.name.as_str())
                .with(VALUE_KEY, self.power_on)
                .with(BRIGHTNESS_KEY, self.brightness),
            (Part::Light, LightLayout::Bridged) => rep
                .with(LEGACY_NAME_KEY, self.name.as_str())
                .with(LINKS_KEY, self.links().to_value()),
            (Part::Light, LightLayout::Composite) => rep.with(LINKS_KEY, self.links().to_value()),
            (Part::Switch, _) => rep.with(VALUE_KEY, self.power_on),
            (Part::Brightness, _) => rep.with(BRIGHTNESS_KEY, self.brightness),
            (Part::Configuration, _) | (Part::Device, _) => rep.with(NAME_KEY, self.name.as_str()),
        }
    }

    /// Whether `method` may write `part`
    fn accepts(&self, part: Part, method: Method) -> bool {
        match (part, self.layout) {
            (Part::Device, _) => false,
            (Part::Light, LightLayout::Monolithic) => true,
            (Part::Light, _) => false,
            (_, LightLayout::Bridged) => method == Method::Post,
            _ => true,
        }
    }

    /// Apply a written body, returning the parts whose state changed
    fn apply(&mut self, part: Part, body: &Representation) -> Vec<Part> {
        let mut changed = Vec::new();
        if matches!(part, Part::Light | Part::Configuration) {
            if let Ok(Some(name)) = body.get_str(NAME_KEY) {
                if self.name != name {
                    self.name = name.to_string();
                    changed.push(Part::Configuration);
                }
            }
        }
        if matches!(part, Part::Light | Part::Switch) {
            if let Ok(Some(value)) = body.get_bool(VALUE_KEY) {
                if self.power_on != value {
                    self.power_on = value;
                    changed.push(Part::Switch);
                }
            }
        }
        if matches!(part, Part::Light | Part::Brightness) {
            if let Ok(Some(level)) = body.get_i64(BRIGHTNESS_KEY) {
                let level = clamp_brightness(level);
                if self.brightness != level {
                    self.brightness = level;
                    changed.push(Part::Brightness);
                }
            }
        }
        changed
    }

    /// URIs whose representation reflects the given state changes
    fn affected_uris(&self, changed: &[Part]) -> Vec<String> {
        let mut uris: Vec<String> = Vec::new();
        for part in changed {
            let target = match self.layout {
                LightLayout::Monolithic => Part::Light,
                LightLayout::Bridged if *part == Part::Configuration => Part::Light,
                _ => *part,
            };
            if let Some(uri) = self.part_uri(target) {
                if !uris.contains(&uri) {
                    uris.push(uri);
                }
            }
        }
        uris
    }

    fn snapshot(&self) -> SimulatedLight {
        SimulatedLight::new(self.name.clone(), self.layout)
            .with_state(self.power_on, i64::from(self.brightness))
    }
}

#[derive(Debug, Default)]
struct SimState {
    peers: Vec<Peer>,
    observers: HashSet<String>,
    sequence: u32,
    requests: VecDeque<RecordedRequest>,
}

impl SimState {
    /// Record a request, dropping the oldest once the log is full
    fn record(&mut self, request: RecordedRequest) {
        if self.requests.len() == REQUEST_LOG_CAPACITY {
            self.requests.pop_front();
        }
        self.requests.push_back(request);
    }

    fn peer_for_uri(&self, uri: &str) -> Option<(usize, Part)> {
        self.peers
            .iter()
            .enumerate()
            .find_map(|(idx, peer)| peer.part_at(uri).map(|part| (idx, part)))
    }

    fn peer_for_host(&self, host: &str) -> Option<&Peer> {
        self.peers.iter().find(|peer| peer.host == host)
    }

    fn next_sequence(&mut self) -> u32 {
        self.sequence = if self.sequence >= MAX_SEQUENCE_NUMBER {
            1
        } else {
            self.sequence + 1
        };
        self.sequence
    }
}

/// Simulated network of light peers implementing [`ResourceTransport`]
pub struct SimulatedNetwork {
    state: Mutex<SimState>,
    events: EventSender,
}

impl SimulatedNetwork {
    pub fn new(events: EventSender) -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    /// Add a light peer, returning the URI of its light resource
    pub fn add_light(&self, light: &SimulatedLight) -> String {
        let mut state = self.lock();
        let host = format!("192.168.7.{}", 10 + state.peers.len());
        let peer = Peer {
            id: Uuid::new_v4().simple().to_string(),
            host,
            layout: light.layout(),
            name: light.name.clone(),
            power_on: light.power_on,
            brightness: clamp_brightness(light.brightness),
            online: true,
        };
        let uri = peer.light_uri();
        debug!(uri = %uri, host = %peer.host, layout = ?peer.layout, "Simulated light added");
        state.peers.push(peer);
        uri
    }

    /// Take a light peer offline or bring it back
    pub fn set_online(&self, light_uri: &str, online: bool) -> bool {
        let mut state = self.lock();
        match state.peers.iter_mut().find(|p| p.light_uri() == light_uri) {
            Some(peer) => {
                peer.online = online;
                true
            }
            None => false,
        }
    }

    /// Change a light's state locally, as if actuated on the device itself
    pub fn push_state(&self, light_uri: &str, power_on: bool, brightness: i64) -> bool {
        let mut state = self.lock();
        let Some(idx) = state.peers.iter().position(|p| p.light_uri() == light_uri) else {
            return false;
        };
        let body = Representation::body()
            .with(VALUE_KEY, power_on)
            .with(BRIGHTNESS_KEY, brightness);
        let changed = state.peers[idx].apply(Part::Light, &body);
        let uris = state.peers[idx].affected_uris(&changed);
        self.notify(&mut state, idx, &uris);
        true
    }

    /// Current state of a light peer
    pub fn light(&self, light_uri: &str) -> Option<SimulatedLight> {
        self.lock()
            .peers
            .iter()
            .find(|p| p.light_uri() == light_uri)
            .map(Peer::snapshot)
    }

    /// URIs of every resource hosted by the light peer
    pub fn resource_uris(&self, light_uri: &str) -> Vec<String> {
        self.lock()
            .peers
            .iter()
            .find(|p| p.light_uri() == light_uri)
            .map(|p| {
                p.parts()
                    .into_iter()
                    .filter(|(part, _)| *part != Part::Device)
                    .map(|(_, uri)| uri)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Most recent requests, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.iter().cloned().collect()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    /// PUT and POST requests received so far
    pub fn writes(&self) -> Vec<(Method, String, Representation)> {
        self.lock()
            .requests
            .iter()
            .filter_map(|request| match request {
                RecordedRequest::Put { uri, body } => {
                    Some((Method::Put, uri.clone(), body.clone()))
                }
                RecordedRequest::Post { uri, body } => {
                    Some((Method::Post, uri.clone(), body.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// URIs currently observed
    pub fn observed(&self) -> Vec<String> {
        let mut observed: Vec<String> = self.lock().observers.iter().cloned().collect();
        observed.sort();
        observed
    }

    fn notify(&self, state: &mut SimState, idx: usize, uris: &[String]) {
        for uri in uris {
            if !state.observers.contains(uri) {
                continue;
            }
            let Some(part) = state.peers[idx].part_at(uri) else {
                continue;
            };
            let sequence = state.next_sequence();
            let representation = state.peers[idx].representation(part);
            self.emit(TransportEvent::Observe {
                uri: uri.clone(),
                sequence,
                representation,
            });
        }
    }

    fn write(&self, method: Method, resource: &ResourceHandle, body: &Representation) {
        let mut state = self.lock();
        let uri = resource.uri.clone();
        let request = match method {
            Method::Put => RecordedRequest::Put {
                uri: uri.clone(),
                body: body.clone(),
            },
            _ => RecordedRequest::Post {
                uri: uri.clone(),
                body: body.clone(),
            },
        };
        state.record(request);

        let Some((idx, part)) = state.peer_for_uri(&uri) else {
            self.emit(failed(method, &uri, TransportErrorCode::NotFound));
            return;
        };
        if !state.peers[idx].online {
            self.emit(failed(method, &uri, TransportErrorCode::Unreachable));
            return;
        }
        if !state.peers[idx].accepts(part, method) {
            self.emit(failed(method, &uri, TransportErrorCode::MethodNotAllowed));
            return;
        }

        let changed = state.peers[idx].apply(part, body);
        let representation = state.peers[idx].representation(part);
        self.emit(TransportEvent::Completed {
            method,
            uri,
            representation,
        });
        let uris = state.peers[idx].affected_uris(&changed);
        self.notify(&mut state, idx, &uris);
    }
}

fn failed(method: Method, uri: &str, code: TransportErrorCode) -> TransportEvent {
    TransportEvent::Failed {
        method,
        uri: uri.to_string(),
        error: TransportError::new(code, format!("{method} {uri}")),
    }
}

impl ResourceTransport for SimulatedNetwork {
    fn discover(
        &self,
        host: Option<&str>,
        type_filter: &str,
        scope: DiscoveryScope,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.record(RecordedRequest::Discover {
            host: host.map(str::to_string),
            type_filter: type_filter.to_string(),
        });

        if let Some(host) = host {
            if !state.peer_for_host(host).is_some_and(|p| p.online) {
                self.emit(TransportEvent::DiscoveryFailed {
                    scope,
                    error: TransportError::new(TransportErrorCode::Unreachable, host),
                });
                return Ok(());
            }
        }

        let found: Vec<ResourceHandle> = state
            .peers
            .iter()
            .filter(|peer| peer.online && host.map_or(true, |h| peer.host == h))
            .flat_map(|peer| {
                peer.parts()
                    .into_iter()
                    .filter(|(part, _)| peer.resource_types(*part).iter().any(|t| t == type_filter))
                    .map(|(part, uri)| peer.handle(part, uri))
                    .collect::<Vec<_>>()
            })
            .collect();
        for resource in found {
            self.emit(TransportEvent::ResourceFound {
                scope: scope.clone(),
                resource,
            });
        }
        Ok(())
    }

    fn device_info(&self, resource: &ResourceHandle) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.record(RecordedRequest::DeviceInfo {
            host: resource.host.clone(),
        });
        match state.peer_for_host(&resource.host) {
            Some(peer) if peer.online => self.emit(TransportEvent::DeviceInfo {
                uri: resource.uri.clone(),
                representation: peer.representation(Part::Device),
            }),
            Some(_) => self.emit(failed(Method::Get, DEVICE_HREF, TransportErrorCode::Unreachable)),
            None => self.emit(failed(Method::Get, DEVICE_HREF, TransportErrorCode::NotFound)),
        }
        Ok(())
    }

    fn get(&self, resource: &ResourceHandle) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.record(RecordedRequest::Get {
            uri: resource.uri.clone(),
        });
        let event = match state.peer_for_uri(&resource.uri) {
            Some((idx, part)) if state.peers[idx].online => TransportEvent::Completed {
                method: Method::Get,
                uri: resource.uri.clone(),
                representation: state.peers[idx].representation(part),
            },
            Some(_) => failed(Method::Get, &resource.uri, TransportErrorCode::Unreachable),
            None => failed(Method::Get, &resource.uri, TransportErrorCode::NotFound),
        };
        self.emit(event);
        Ok(())
    }

    fn put(&self, resource: &ResourceHandle, body: &Representation) -> Result<(), TransportError> {
        self.write(Method::Put, resource, body);
        Ok(())
    }

    fn post(&self, resource: &ResourceHandle, body: &Representation) -> Result<(), TransportError> {
        self.write(Method::Post, resource, body);
        Ok(())
    }

    fn observe(&self, resource: &ResourceHandle) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.record(RecordedRequest::Observe {
            uri: resource.uri.clone(),
        });
        let event = match state.peer_for_uri(&resource.uri) {
            Some((idx, part)) if state.peers[idx].online => {
                state.observers.insert(resource.uri.clone());
                TransportEvent::Observe {
                    uri: resource.uri.clone(),
                    sequence: crate::transport::OBSERVE_REGISTER,
                    representation: state.peers[idx].representation(part),
                }
            }
            Some(_) => TransportEvent::ObserveFailed {
                uri: resource.uri.clone(),
                error: TransportError::new(TransportErrorCode::Unreachable, &resource.uri),
            },
            None => TransportEvent::ObserveFailed {
                uri: resource.uri.clone(),
                error: TransportError::new(TransportErrorCode::NotFound, &resource.uri),
            },
        };
        self.emit(event);
        Ok(())
    }

    fn cancel_observe(&self, resource: &ResourceHandle) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.record(RecordedRequest::CancelObserve {
            uri: resource.uri.clone(),
        });
        state.observers.remove(&resource.uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{event_channel, EventReceiver, OBSERVE_REGISTER};

    fn drain(rx: &mut EventReceiver) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn found_uris(events: &[TransportEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::ResourceFound { resource, .. } => Some(resource.uri.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_top_level_discovery() {
        let (tx, mut rx) = event_channel();
        let sim = SimulatedNetwork::new(tx);
        let composite = sim.add_light(&SimulatedLight::new("Desk", LightLayout::Composite));
        let mono = sim.add_light(&SimulatedLight::new("Hall", LightLayout::Monolithic));

        sim.discover(None, LIGHT_RT, DiscoveryScope::TopLevel).unwrap();
        let uris = found_uris(&drain(&mut rx));

        assert!(uris.contains(&composite));
        assert!(uris.contains(&mono));
        assert!(uris.iter().any(|u| u == DEVICE_HREF));
        assert!(!uris.iter().any(|u| u.starts_with("/ocf/switch/")));
    }

    #[test]
    fn test_scoped_discovery_by_host() {
        let (tx, mut rx) = event_channel();
        let sim = SimulatedNetwork::new(tx);
        let first = sim.add_light(&SimulatedLight::new("A", LightLayout::Composite));
        sim.add_light(&SimulatedLight::new("B", LightLayout::Composite));

        let scope = DiscoveryScope::Link {
            parent_uri: first.clone(),
            href: first.replace("/ocf/light/", "/ocf/switch/"),
        };
        sim.discover(Some("192.168.7.10"), SWITCH_RT, scope.clone()).unwrap();
        let events = drain(&mut rx);

        assert_eq!(events.len(), 1);
        match &events[0] {
            TransportEvent::ResourceFound { scope: s, resource } => {
                assert_eq!(s, &scope);
                assert_eq!(resource.uri, first.replace("/ocf/light/", "/ocf/switch/"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_bridged_sub_resources_reject_put() {
        let (tx, mut rx) = event_channel();
        let sim = SimulatedNetwork::new(tx);
        let light = sim.add_light(&SimulatedLight::new("Porch", LightLayout::Bridged));
        let switch = light.replace("/upnp/light/", "/upnp/switch/");
        let handle = ResourceHandle::new(&switch, "192.168.7.10", vec![SWITCH_RT.to_string()]);
        let body = Representation::body().with(VALUE_KEY, true);

        sim.put(&handle, &body).unwrap();
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [TransportEvent::Failed { error, .. }]
                if error.code == TransportErrorCode::MethodNotAllowed
        ));

        sim.post(&handle, &body).unwrap();
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [TransportEvent::Completed { method: Method::Post, .. }]
        ));
        assert_eq!(sim.light(&light).map(|l| l.power_on), Some(true));
    }

    #[test]
    fn test_observe_ack_then_notifications() {
        let (tx, mut rx) = event_channel();
        let sim = SimulatedNetwork::new(tx);
        let light = sim.add_light(&SimulatedLight::new("Desk", LightLayout::Composite));
        let brightness = light.replace("/ocf/light/", "/ocf/brightness/");
        let handle =
            ResourceHandle::new(&brightness, "192.168.7.10", vec![BRIGHTNESS_RT.to_string()]);

        sim.observe(&handle).unwrap();
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [TransportEvent::Observe { sequence: OBSERVE_REGISTER, .. }]
        ));

        sim.push_state(&light, false, 40);
        sim.push_state(&light, false, 45);
        let sequences: Vec<u32> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::Observe { sequence, .. } => Some(sequence),
                _ => None,
            })
            .collect();
        assert_eq!(sequences, vec![1, 2]);

        sim.cancel_observe(&handle).unwrap();
        sim.push_state(&light, false, 50);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_offline_peer() {
        let (tx, mut rx) = event_channel();
        let sim = SimulatedNetwork::new(tx);
        let light = sim.add_light(&SimulatedLight::new("Desk", LightLayout::Monolithic));
        assert!(sim.set_online(&light, false));

        sim.discover(None, LIGHT_RT, DiscoveryScope::TopLevel).unwrap();
        assert!(drain(&mut rx).is_empty());

        let handle = ResourceHandle::new(&light, "192.168.7.10", vec![LIGHT_RT.to_string()]);
        sim.get(&handle).unwrap();
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [TransportEvent::Failed { error, .. }] if error.code == TransportErrorCode::Unreachable
        ));
        assert_eq!(sim.requests().len(), 2);
    }

    #[test]
    fn test_request_log_is_bounded() {
        let (tx, _rx) = event_channel();
        let sim = SimulatedNetwork::new(tx);
        for n in 0..REQUEST_LOG_CAPACITY + 10 {
            let handle = ResourceHandle::new(format!("/a/light/{n}"), "192.168.7.10", Vec::new());
            sim.get(&handle).unwrap();
        }

        let requests = sim.requests();
        assert_eq!(requests.len(), REQUEST_LOG_CAPACITY);
        assert_eq!(requests[0], RecordedRequest::Get { uri: "/a/light/10".to_string() });
        assert_eq!(
            requests.last(),
            Some(&RecordedRequest::Get {
                uri: format!("/a/light/{}", REQUEST_LOG_CAPACITY + 9)
            })
        );
    }
}
