//! Application state management

use anyhow::{Context, Result};
use lightwire_core::{FileNameStore, ShadowSink, ShadowSnapshot};
use lightwire_discovery::{Pipeline, Registry, ShadowPublisher, Sweeper};
use lightwire_transport::{event_channel, EventReceiver, SimulatedNetwork};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::Config;

/// Shadow change forwarded to WebSocket clients
#[derive(Debug, Clone)]
pub enum ShadowEvent {
    /// New reported state
    Updated(ShadowSnapshot),
    /// Shadow document deleted
    Cleared,
}

/// Shadow sink that broadcasts to every connected client
pub struct BroadcastSink {
    events: broadcast::Sender<ShadowEvent>,
}

impl ShadowSink for BroadcastSink {
    fn publish(&self, snapshot: &ShadowSnapshot) {
        debug!(lights = snapshot.light_devices.len(), "Broadcasting shadow update");
        let _ = self.events.send(ShadowEvent::Updated(snapshot.clone()));
    }

    fn clear(&self) {
        let _ = self.events.send(ShadowEvent::Cleared);
    }
}

/// Shared application state
pub struct AppState {
    /// Discovery and observation pipeline
    pub pipeline: Arc<Pipeline>,
    /// Stale-entry sweeper
    pub sweeper: Arc<Sweeper>,
    /// Simulated peers answering discovery
    pub network: Arc<SimulatedNetwork>,
    /// Configuration
    pub config: Config,
    /// Shadow broadcast for WebSocket clients
    pub events: broadcast::Sender<ShadowEvent>,
}

impl AppState {
    /// Create new application state, returning it with the transport event
    /// receiver the pipeline's event loop must drain
    pub async fn new(config: Config) -> Result<(Arc<Self>, EventReceiver)> {
        let names = FileNameStore::open(&config.names.path)
            .with_context(|| format!("opening name store {}", config.names.path))?;
        info!(path = %names.path().display(), "Name store opened");

        let (tx, rx) = event_channel();
        let network = Arc::new(SimulatedNetwork::new(tx));
        for light in &config.simulator.lights {
            let uri = network.add_light(light);
            info!(uri = %uri, name = %light.name, layout = ?light.layout(), "Simulated light configured");
        }

        let (events, _) = broadcast::channel(100);
        let sink = Arc::new(BroadcastSink {
            events: events.clone(),
        });
        let shadow = Arc::new(ShadowPublisher::new(sink));

        let registry = Arc::new(Registry::new(Arc::new(names)));
        let pipeline = Arc::new(Pipeline::new(
            registry.clone(),
            network.clone(),
            config.discovery.prefixes.clone(),
            config.discovery.type_filter.clone(),
            Some(shadow),
        ));
        let sweeper = Arc::new(Sweeper::new(
            registry,
            network.clone(),
            pipeline.reconciler().clone(),
            config.daemon.liveness_window(),
            config.daemon.sweep_interval(),
        ));

        let state = Arc::new(Self {
            pipeline,
            sweeper,
            network,
            config,
            events,
        });
        Ok((state, rx))
    }

    /// Subscribe to shadow events
    pub fn subscribe(&self) -> broadcast::Receiver<ShadowEvent> {
        self.events.subscribe()
    }

    /// Current snapshot built from the registry
    pub async fn snapshot(&self) -> ShadowSnapshot {
        ShadowSnapshot::new(self.pipeline.registry().light_summaries().await)
    }
}
