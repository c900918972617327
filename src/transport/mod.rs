//! The `transport` module is the seam between the client and the MQTT v5
//! engine that actually talks to a broker.
//!
//! The client never speaks the wire protocol itself. It drives an
//! implementation of [`Transport`] and registers an [`InboundHandler`] that the
//! engine calls once per received PUBLISH. Two engines ship with the crate:
//!
//! - [`rumqtt::RumqttTransport`]: backed by `rumqttc`'s v5 client.
//! - [`memory::MemoryTransport`]: records calls and lets callers inject
//!   inbound messages; used by the tests and handy for embedding.

pub mod memory;
pub mod rumqtt;

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::protocol::Properties;
use crate::utils::Error;

pub use memory::MemoryTransport;
pub use rumqtt::RumqttTransport;

/// MQTT delivery guarantee requested for a publish or subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(Error::InvalidArgument(format!("qos must be 0, 1 or 2, got {other}"))),
        }
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Message the broker publishes on our behalf if we vanish without a
/// clean disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl LastWill {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>, qos: QoS, retain: bool) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        }
    }
}

/// The engine refused an operation. `op` names the call, `reason` is the
/// engine's own description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{op} failed: {reason}")]
pub struct TransportError {
    pub op: &'static str,
    pub reason: String,
}

impl TransportError {
    pub fn new(op: &'static str, reason: impl fmt::Display) -> Self {
        Self {
            op,
            reason: reason.to_string(),
        }
    }
}

/// Receives every inbound PUBLISH from the engine's network thread.
pub trait InboundHandler: Send + Sync {
    fn on_message(&self, topic: &str, payload: &[u8], properties: Option<&Properties>);
}

/// Operations the client needs from an MQTT v5 engine.
///
/// All methods take `&self`; engines keep whatever state they need behind
/// their own synchronization so a single instance can be shared between the
/// application threads and the network thread.
pub trait Transport: Send + Sync {
    /// Registers the sink for inbound messages. Called once, when the client
    /// is constructed.
    fn set_handler(&self, handler: Arc<dyn InboundHandler>);

    fn set_will(&self, will: &LastWill) -> Result<(), TransportError>;

    fn clear_will(&self);

    fn connect(&self, host: &str, port: u16) -> Result<(), TransportError>;

    fn disconnect(&self) -> Result<(), TransportError>;

    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
        properties: Option<&Properties>,
    ) -> Result<(), TransportError>;

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), TransportError>;

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Starts the background network loop that feeds the handler.
    fn start(&self) -> Result<(), TransportError>;

    /// Stops the network loop. With `force` the loop is abandoned without
    /// waiting for a graceful disconnect.
    fn stop(&self, force: bool) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests;
