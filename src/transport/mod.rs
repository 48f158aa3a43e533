//! # Transport Layer
//!
//! Boundary between a connection and the message bus that carries property
//! requests, replies and events between services.
//!
//! A [`Transport`] registers endpoints under an optional service name,
//! routes property requests to the endpoint owning a service, hands replies
//! back to the waiting requester and broadcasts events. Inbound frames land
//! on the endpoint's queue as bincode-encoded [`Message`] values, which the
//! connection drains in its receive loop.
//!
//! ## Implementations
//! - [`local::LocalBus`]: in-process bus over tokio channels
//!
//! [`Message`]: crate::protocol::message::Message

use bytes::Bytes;
use futures::future::BoxFuture;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::MAX_SERVICE_NAME_LEN;
use crate::core::value::Value;
use crate::error::{LipcError, Result};
use crate::protocol::message::{EventMessage, PropertyReply, PropertyRequest};

pub mod local;

/// Bus-assigned endpoint identifier
pub type EndpointId = u64;

/// A registered endpoint and its inbound frame queue
pub struct Endpoint {
    pub id: EndpointId,
    pub service: Option<String>,
    pub inbound: mpsc::UnboundedReceiver<Bytes>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("service", &self.service)
            .finish()
    }
}

/// Message bus used by connections
pub trait Transport: Send + Sync + fmt::Debug {
    /// Register an endpoint, optionally claiming a service name
    fn connect(&self, service: Option<&str>) -> Result<Endpoint>;

    /// Remove an endpoint and release its service name
    fn disconnect(&self, id: EndpointId) -> Result<()>;

    /// Send a property request to `target` and wait up to `timeout` for the
    /// reply. The remote outcome is relayed unchanged.
    fn send_property_request(
        &self,
        from: EndpointId,
        target: &str,
        request: PropertyRequest,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<Option<Value>>>;

    /// Route a reply back to the requester
    fn send_reply(&self, reply: PropertyReply) -> Result<()>;

    /// Broadcast an event to every endpoint but the sender; returns how many
    /// endpoints it was queued for
    fn send_event(&self, from: EndpointId, event: &EventMessage) -> Result<usize>;
}

/// Service names are dot-separated identifiers with at least two elements,
/// at most 255 bytes long.
pub fn validate_service_name(name: &str) -> Result<()> {
    if name.len() > MAX_SERVICE_NAME_LEN {
        return Err(LipcError::ServiceNameTooLong(name.len()));
    }

    let mut elements = 0;
    for element in name.split('.') {
        let valid = element
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && element
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(LipcError::invalid_arg(format!(
                "service name {name:?} has an invalid element {element:?}"
            )));
        }
        elements += 1;
    }

    if elements < 2 {
        return Err(LipcError::invalid_arg(format!(
            "service name {name:?} needs at least two elements"
        )));
    }
    Ok(())
}
