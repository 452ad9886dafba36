//! Shadow publisher
//!
//! Wraps the external shadow sink and suppresses snapshots identical to the
//! last one published.

use lightwire_core::{ShadowSink, ShadowSnapshot};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct ShadowPublisher {
    sink: Arc<dyn ShadowSink>,
    last: Mutex<Option<ShadowSnapshot>>,
}

impl ShadowPublisher {
    pub fn new(sink: Arc<dyn ShadowSink>) -> Self {
        Self {
            sink,
            last: Mutex::new(None),
        }
    }

    /// Publish `snapshot` unless it matches the previous one.
    /// Returns whether the sink was called.
    pub async fn publish(&self, snapshot: ShadowSnapshot) -> bool {
        let mut last = self.last.lock().await;
        if last.as_ref() == Some(&snapshot) {
            debug!("Shadow unchanged, skipping publish");
            return false;
        }
        debug!(lights = snapshot.light_devices.len(), "Publishing shadow");
        self.sink.publish(&snapshot);
        *last = Some(snapshot);
        true
    }

    /// Delete the shadow document; the next snapshot is always published
    pub async fn clear(&self) {
        let mut last = self.last.lock().await;
        info!("Clearing shadow document");
        self.sink.clear();
        *last = None;
    }

    /// Last snapshot handed to the sink
    pub async fn last(&self) -> Option<ShadowSnapshot> {
        self.last.lock().await.clone()
    }
}
