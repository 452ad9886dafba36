//! Lightwire Transport - Discovery and resource I/O capability
//!
//! This crate defines the capability the discovery pipeline consumes:
//! resource handles, completion events and the [`ResourceTransport`] trait,
//! together with an in-process simulated peer network.

pub mod sim;
pub mod transport;

pub use sim::{LightLayout, RecordedRequest, SimulatedLight, SimulatedNetwork};
pub use transport::{
    event_channel, DiscoveryScope, EventReceiver, EventSender, Method, ResourceHandle,
    ResourceTransport, TransportError, TransportErrorCode, TransportEvent, MAX_SEQUENCE_NUMBER,
    OBSERVE_REGISTER,
};
