//! In-process transport.
//!
//! Nothing leaves the process: every call is recorded, publishes are kept
//! for inspection, and inbound traffic is injected with
//! [`MemoryTransport::deliver`], which runs the registered handler on the
//! calling thread just as a network thread would. Individual operations can
//! be made to fail to exercise error paths.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::protocol::Properties;
use crate::transport::{InboundHandler, LastWill, QoS, Transport, TransportError};

/// A publish as the transport saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    pub properties: Option<Properties>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetWill(LastWill),
    ClearWill,
    Connect { host: String, port: u16 },
    Disconnect,
    Publish(Published),
    Subscribe { topic: String, qos: QoS },
    Unsubscribe { topic: String },
    Start,
    Stop { force: bool },
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    failing: HashSet<&'static str>,
    will: Option<LastWill>,
    connected: bool,
    running: bool,
}

#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
    handler: RwLock<Option<Arc<dyn InboundHandler>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call to `op` ("connect", "publish", "subscribe",
    /// ...) fail until [`recover`](Self::recover) is called.
    pub fn fail(&self, op: &'static str) {
        self.state.lock().failing.insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.state.lock().failing.remove(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn published(&self) -> Vec<Published> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Publish(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn will(&self) -> Option<LastWill> {
        self.state.lock().will.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Feeds an inbound message to the registered handler. Returns `false`
    /// when no handler is registered.
    pub fn deliver(&self, topic: &str, payload: &[u8], properties: Option<&Properties>) -> bool {
        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => {
                handler.on_message(topic, payload, properties);
                true
            }
            None => false,
        }
    }

    /// Delivers a recorded publish back in, as a broker would to a
    /// subscriber of its topic.
    pub fn redeliver(&self, published: &Published) -> bool {
        self.deliver(&published.topic, &published.payload, published.properties.as_ref())
    }

    /// Logs the call, then fails it if `op` was marked failing. On success
    /// the state lock is handed back so the caller can apply the effect.
    fn record(&self, op: &'static str, call: Call) -> Result<MutexGuard<'_, State>, TransportError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.failing.contains(op) {
            return Err(TransportError::new(op, "injected failure"));
        }
        Ok(state)
    }
}

impl Transport for MemoryTransport {
    fn set_handler(&self, handler: Arc<dyn InboundHandler>) {
        *self.handler.write() = Some(handler);
    }

    fn set_will(&self, will: &LastWill) -> Result<(), TransportError> {
        let mut state = self.record("set_will", Call::SetWill(will.clone()))?;
        state.will = Some(will.clone());
        Ok(())
    }

    fn clear_will(&self) {
        let mut state = self.state.lock();
        state.calls.push(Call::ClearWill);
        state.will = None;
    }

    fn connect(&self, host: &str, port: u16) -> Result<(), TransportError> {
        let call = Call::Connect {
            host: host.to_string(),
            port,
        };
        let mut state = self.record("connect", call)?;
        state.connected = true;
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.record("disconnect", Call::Disconnect)?;
        if !state.connected {
            return Err(TransportError::new("disconnect", "no connection"));
        }
        state.connected = false;
        Ok(())
    }

    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
        properties: Option<&Properties>,
    ) -> Result<(), TransportError> {
        let call = Call::Publish(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain,
            properties: properties.cloned(),
        });
        self.record("publish", call).map(drop)
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), TransportError> {
        let call = Call::Subscribe {
            topic: topic.to_string(),
            qos,
        };
        self.record("subscribe", call).map(drop)
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        let call = Call::Unsubscribe {
            topic: topic.to_string(),
        };
        self.record("unsubscribe", call).map(drop)
    }

    fn start(&self) -> Result<(), TransportError> {
        let mut state = self.record("start", Call::Start)?;
        state.running = true;
        Ok(())
    }

    fn stop(&self, force: bool) -> Result<(), TransportError> {
        let mut state = self.record("stop", Call::Stop { force })?;
        state.running = false;
        Ok(())
    }
}
