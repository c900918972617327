//! Dispatch engine
//!
//! Walks the registry for every inbound message and invokes each matching
//! subscriber exactly once, in subscribe order.
//!
//! The whole walk runs under the registry's re-entrant lock. Callbacks run
//! on the same thread and may subscribe or unsubscribe, including removing
//! their own subscription; the registry keeps the cursor consistent so the
//! next entry is neither skipped nor visited twice.

use std::sync::Arc;

use tracing::{error, trace};

use crate::protocol::{Properties, reply};
use crate::routing::registry::{Iteration, SharedRegistry};
use crate::routing::topic;
use crate::transport::InboundHandler;
use crate::utils::Result;

#[derive(Clone)]
pub struct Dispatcher {
    registry: SharedRegistry,
}

impl Dispatcher {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    pub fn into_handler(self) -> Arc<dyn InboundHandler> {
        Arc::new(self)
    }

    /// Delivers one inbound message and returns how many callbacks ran.
    ///
    /// A topic matcher failure aborts the walk with [`Error::Protocol`];
    /// callbacks already invoked for this message stay invoked.
    ///
    /// [`Error::Protocol`]: crate::utils::Error::Protocol
    pub fn dispatch(
        &self,
        topic: &str,
        payload: &[u8],
        properties: Option<&Properties>,
    ) -> Result<usize> {
        let guard = self.registry.lock();
        let iteration = Iteration::begin(&guard);
        let mut delivered = 0;

        while let Some(subscription) = iteration.current() {
            if topic::matches(&subscription.topic, topic)? {
                let msg = reply::decode(topic, properties);
                trace!(topic = %topic, id = %subscription.id, len = payload.len(), "delivering");
                subscription.invoke(&msg, topic, payload);
                delivered += 1;
            }
            iteration.advance();
        }

        Ok(delivered)
    }
}

impl InboundHandler for Dispatcher {
    fn on_message(&self, topic: &str, payload: &[u8], properties: Option<&Properties>) {
        if let Err(e) = self.dispatch(topic, payload, properties) {
            error!(topic = %topic, error = %e, "topic comparator error");
        }
    }
}
