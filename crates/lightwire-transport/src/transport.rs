//! Resource I/O capability consumed by the discovery pipeline
//!
//! Every request is fire-and-forget: the call returns as soon as the request
//! is issued and its outcome arrives later as a [`TransportEvent`] on the
//! channel handed to the transport at construction.

use lightwire_core::Representation;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Sequence number of an observation registration acknowledgement
pub const OBSERVE_REGISTER: u32 = 0;

/// Largest observation sequence number treated as a notification
pub const MAX_SEQUENCE_NUMBER: u32 = 0x00FF_FFFF;

/// Sender half used by transports to deliver completions
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiver half drained by the pipeline
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create the completion channel shared by a transport and the pipeline
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Transport-level handle of a discovered resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// Resource URI
    pub uri: String,
    /// Address of the peer hosting the resource
    pub host: String,
    /// Resource types advertised during discovery
    pub resource_types: Vec<String>,
}

impl ResourceHandle {
    pub fn new(
        uri: impl Into<String>,
        host: impl Into<String>,
        resource_types: Vec<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            host: host.into(),
            resource_types,
        }
    }
}

/// Resource I/O verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Put,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
        };
        f.write_str(verb)
    }
}

/// Which discovery request a found resource answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryScope {
    /// Network-wide discovery by type filter
    TopLevel,
    /// Host-scoped discovery issued to follow one link of a parent
    Link { parent_uri: String, href: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorCode {
    Unreachable,
    NotFound,
    MethodNotAllowed,
    Timeout,
    Internal,
}

impl std::fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Self::Unreachable => "unreachable",
            Self::NotFound => "not found",
            Self::MethodNotAllowed => "method not allowed",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        };
        f.write_str(code)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct TransportError {
    pub code: TransportErrorCode,
    pub message: String,
}

impl TransportError {
    pub fn new(code: TransportErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Completion delivered for an earlier request
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A discovery request found a resource
    ResourceFound {
        scope: DiscoveryScope,
        resource: ResourceHandle,
    },
    /// A discovery request failed
    DiscoveryFailed {
        scope: DiscoveryScope,
        error: TransportError,
    },
    /// Device metadata answered for the resource at `uri`
    DeviceInfo {
        uri: String,
        representation: Representation,
    },
    /// A GET, PUT or POST on `uri` completed
    Completed {
        method: Method,
        uri: String,
        representation: Representation,
    },
    /// A GET, PUT or POST failed
    Failed {
        method: Method,
        uri: String,
        error: TransportError,
    },
    /// Observation notification or registration acknowledgement
    Observe {
        uri: String,
        sequence: u32,
        representation: Representation,
    },
    /// Observation could not be established
    ObserveFailed { uri: String, error: TransportError },
}

/// Discovery and resource I/O capability
pub trait ResourceTransport: Send + Sync {
    /// Discover resources of `type_filter`, network-wide or on one host
    fn discover(
        &self,
        host: Option<&str>,
        type_filter: &str,
        scope: DiscoveryScope,
    ) -> Result<(), TransportError>;

    /// Query the device metadata of the host serving `resource`
    fn device_info(&self, resource: &ResourceHandle) -> Result<(), TransportError>;

    fn get(&self, resource: &ResourceHandle) -> Result<(), TransportError>;

    fn put(&self, resource: &ResourceHandle, body: &Representation) -> Result<(), TransportError>;

    fn post(&self, resource: &ResourceHandle, body: &Representation) -> Result<(), TransportError>;

    fn observe(&self, resource: &ResourceHandle) -> Result<(), TransportError>;

    fn cancel_observe(&self, resource: &ResourceHandle) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::new(TransportErrorCode::MethodNotAllowed, "PUT /upnp/switch/1");
        assert_eq!(err.to_string(), "method not allowed: PUT /upnp/switch/1");
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Post.to_string(), "POST");
        assert_eq!(serde_json::to_string(&Method::Put).unwrap(), "\"PUT\"");
    }
}
