//! # Bus Messages
//!
//! Messages exchanged between connections over a [`Transport`]. They are
//! bincode-encoded on the way in and out, so nothing crosses the boundary by
//! reference.
//!
//! [`Transport`]: crate::transport::Transport

use serde::{Deserialize, Serialize};

use crate::core::value::Value;
use crate::error::{LipcCode, Result};
use crate::protocol::property::PropertyKind;

/// Requested property operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyOp {
    /// Read a property of the given kind
    Get(PropertyKind),
    /// Write a value
    Set(Value),
}

/// Property request addressed to a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRequest {
    pub property: String,
    pub op: PropertyOp,
}

/// Outcome of a property request: the read value for `Get`, nothing for `Set`
pub type PropertyOutcome = std::result::Result<Option<Value>, LipcCode>;

/// Event as it travels between connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    pub source: String,
    pub name: String,
    pub params: Vec<Value>,
}

/// Frame delivered to a connection's inbound queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Incoming property request; the reply goes back under `id`
    PropertyRequest { id: u64, request: PropertyRequest },
    /// Event emitted by another connection
    Event(EventMessage),
}

impl Message {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Reply to a property request, routed back by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyReply {
    pub id: u64,
    pub outcome: PropertyOutcome,
}

impl PropertyReply {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
