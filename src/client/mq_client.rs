//! Client representation
//!
//! `Client` pairs a transport with the registry its dispatcher walks. The
//! dispatcher is handed to the transport at construction, so inbound
//! messages reach subscribers without the transport knowing about the client.
//!
//! Registry mutations and the transport calls that follow them happen under
//! the registry lock. When the transport rejects a subscribe or unsubscribe
//! the local change is kept: a failed subscribe still leaves its entry in the
//! registry and a failed unsubscribe does not bring the entry back.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::Settings;
use crate::protocol::reply;
use crate::routing::{Dispatcher, Message, Registry, SharedRegistry, SubscriptionId, UserData, topic};
use crate::transport::{LastWill, QoS, RumqttTransport, Transport};
use crate::utils::{Error, Result};

pub struct Client<T: Transport> {
    id: String,
    registry: SharedRegistry,
    transport: Arc<T>,
}

impl<T: Transport> Client<T> {
    /// Creates a client over `transport` and registers its dispatcher as the
    /// transport's inbound handler.
    pub fn new(id: impl Into<String>, transport: T) -> Self {
        let registry = Registry::shared();
        transport.set_handler(Dispatcher::new(registry.clone()).into_handler());
        Self {
            id: id.into(),
            registry,
            transport: Arc::new(transport),
        }
    }

    /// Client identifier presented to the broker.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The engine this client drives.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Dispatcher over this client's registry, for feeding messages in by
    /// hand.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.registry.clone())
    }

    /// Registers `last_will` (skipped when absent or its topic is empty) and
    /// connects.
    pub fn connect(&self, host: &str, port: u16, last_will: Option<&LastWill>) -> Result<()> {
        if let Some(will) = last_will.filter(|w| !w.topic.is_empty()) {
            self.transport
                .set_will(will)
                .inspect_err(|e| error!(client = %self.id, error = %e, "will registration failed"))?;
        }

        self.transport.connect(host, port)?;
        info!(client = %self.id, host = %host, port, "connect requested");
        Ok(())
    }

    /// Disconnects and clears any last will so the next connect starts
    /// without one. The will is cleared even when the disconnect fails.
    pub fn disconnect(&self) -> Result<()> {
        let result = self.transport.disconnect();
        self.transport.clear_will();
        result?;
        info!(client = %self.id, "disconnected");
        Ok(())
    }

    /// Starts the transport's network loop, which feeds inbound messages to
    /// the subscribers.
    pub fn start(&self) -> Result<()> {
        Ok(self.transport.start()?)
    }

    /// Stops the network loop. `force` drops the connection instead of
    /// disconnecting cleanly.
    pub fn stop(&self, force: bool) -> Result<()> {
        Ok(self.transport.stop(force)?)
    }

    /// Publishes `payload` to `topic` without reply metadata.
    pub fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<()> {
        self.transport.publish(topic, payload, qos, retain, None)?;
        Ok(())
    }

    /// Publishes a request whose replies should go to `reply_topic`, tagged
    /// with `correlation`.
    pub fn publish_with_reply(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
        reply_topic: &str,
        correlation: &[u8],
    ) -> Result<()> {
        let props = reply::encode_request(reply_topic, correlation);
        self.transport.publish(topic, payload, qos, retain, Some(&props))?;
        Ok(())
    }

    /// Replies to `request` on its response topic, carrying its correlation,
    /// sequence number and end-of-sequence flag.
    pub fn send_reply(&self, request: &Message, payload: &[u8], qos: QoS, retain: bool) -> Result<()> {
        let Some(response_topic) = request.response_topic.as_deref().filter(|t| !t.is_empty()) else {
            return Err(Error::InvalidArgument(format!(
                "message on {} has no response topic",
                request.topic
            )));
        };

        let props = reply::encode_reply(request.correlation(), request.sequence, request.is_end_sequence);
        self.transport.publish(response_topic, payload, qos, retain, Some(&props))?;
        Ok(())
    }

    /// Adds a subscription and asks the broker for `topic`.
    ///
    /// Returns the handle for [`Client::unsubscribe`]. A malformed filter is
    /// refused before anything changes; a transport rejection is reported
    /// after the entry has been added.
    pub fn subscribe<F>(
        &self,
        topic: &str,
        callback: F,
        userdata: Option<UserData>,
        qos: QoS,
    ) -> Result<SubscriptionId>
    where
        F: Fn(&Message, &str, &[u8], Option<&UserData>) + Send + Sync + 'static,
    {
        if !topic::is_valid_filter(topic) {
            return Err(Error::InvalidArgument(format!("invalid topic filter {topic:?}")));
        }

        let guard = self.registry.lock();
        let id = guard
            .borrow_mut()
            .insert(topic, qos, Arc::new(callback), userdata);

        self.transport.subscribe(topic, qos)?;
        debug!(id = %id, topic = %topic, qos = %qos, "subscribe request sent");
        Ok(id)
    }

    /// Removes a subscription and returns its user data.
    ///
    /// Safe to call from inside any subscriber callback, including the
    /// callback of the subscription being removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<Option<UserData>> {
        let guard = self.registry.lock();
        let removed = guard.borrow_mut().remove(id);
        let Some(subscription) = removed else {
            debug!(id = %id, "subscription not found");
            return Err(Error::NotFound(id));
        };

        self.transport.unsubscribe(&subscription.topic)?;
        debug!(id = %id, topic = %subscription.topic, "unsubscribe request sent");
        Ok(subscription.userdata().cloned())
    }

    /// Whether `right` is covered by the filter `left`.
    pub fn compare_topic(&self, left: &str, right: &str) -> Result<bool> {
        topic::matches(left, right)
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registry.lock().borrow().len()
    }

    /// Subscribed filters in delivery order.
    pub fn topics(&self) -> Vec<String> {
        self.registry.lock().borrow().topics()
    }
}

impl Client<RumqttTransport> {
    /// Builds a `rumqttc`-backed client from configuration. Without a
    /// configured id a random `replymq-<uuid>` is used.
    pub fn from_settings(settings: &Settings) -> Self {
        let id = settings
            .client
            .id
            .clone()
            .unwrap_or_else(|| format!("replymq-{}", Uuid::new_v4()));

        let transport = RumqttTransport::new(
            &id,
            settings.mqtt.clean_session,
            Duration::from_secs(settings.mqtt.keep_alive_secs),
            settings.mqtt.channel_capacity,
        );
        Self::new(id, transport)
    }
}
