//! `rumqttc`-backed transport.
//!
//! `connect` builds the engine's client and event loop; `start` moves the
//! event loop onto a dedicated network thread, which drives it on a
//! current-thread tokio runtime and hands each inbound PUBLISH to the
//! registered handler. After a network error the loop backs off and polls
//! again, which makes `rumqttc` reconnect.
//!
//! Requests go through the engine's bounded channel with the non-blocking
//! `try_*` calls. Subscriber callbacks run on the network thread, so a
//! blocking send from a callback (a reply, say) could wait on a channel only
//! that same thread drains. A full channel is reported as a transport error.
//!
//! The loop is steered through a `watch` channel:
//! - `Closing` (disconnect or graceful stop): inbound messages are dropped
//!   and the loop ends once DISCONNECT is on the wire, or on the next error.
//!   It never reconnects.
//! - `Abort` (forced stop): the loop ends at once, closing the socket.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rumqttc::Outgoing;
use rumqttc::v5::mqttbytes::QoS as MqttQoS;
use rumqttc::v5::mqttbytes::v5::{LastWill as MqttLastWill, Packet, Publish, PublishProperties};
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::protocol::Properties;
use crate::transport::{InboundHandler, LastWill, QoS, Transport, TransportError};

const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// What the network loop should be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Closing,
    Abort,
}

#[derive(Default)]
struct Inner {
    will: Option<LastWill>,
    client: Option<AsyncClient>,
    // parked here between connect and start
    eventloop: Option<EventLoop>,
    worker: Option<JoinHandle<()>>,
    // one channel per run; replacing it ends any loop still on the old one
    control: Option<watch::Sender<Control>>,
}

impl Inner {
    fn signal(&self, control: Control) {
        if let Some(tx) = &self.control {
            tx.send_replace(control);
        }
    }
}

pub struct RumqttTransport {
    client_id: String,
    clean_session: bool,
    keep_alive: Duration,
    capacity: usize,
    inner: Mutex<Inner>,
    handler: RwLock<Option<Arc<dyn InboundHandler>>>,
}

impl RumqttTransport {
    /// Creates an unconnected engine. `capacity` bounds the request channel
    /// shared by publish, subscribe and unsubscribe.
    pub fn new(client_id: &str, clean_session: bool, keep_alive: Duration, capacity: usize) -> Self {
        Self {
            client_id: client_id.to_string(),
            clean_session,
            keep_alive,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
            handler: RwLock::new(None),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn options(&self, host: &str, port: u16, will: Option<&LastWill>) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), host, port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_start(self.clean_session);
        if let Some(will) = will {
            options.set_last_will(MqttLastWill::new(
                will.topic.clone(),
                will.payload.clone(),
                to_mqtt_qos(will.qos),
                will.retain,
                None,
            ));
        }
        options
    }

    fn with_client<F>(&self, op: &'static str, f: F) -> Result<(), TransportError>
    where
        F: FnOnce(&AsyncClient) -> Result<(), rumqttc::v5::ClientError>,
    {
        let inner = self.inner.lock();
        let client = inner
            .client
            .as_ref()
            .ok_or_else(|| TransportError::new(op, "no connection"))?;
        f(client).map_err(|e| TransportError::new(op, e))
    }
}

impl Transport for RumqttTransport {
    fn set_handler(&self, handler: Arc<dyn InboundHandler>) {
        *self.handler.write() = Some(handler);
    }

    fn set_will(&self, will: &LastWill) -> Result<(), TransportError> {
        if will.topic.is_empty() {
            return Err(TransportError::new("set_will", "empty will topic"));
        }
        self.inner.lock().will = Some(will.clone());
        Ok(())
    }

    fn clear_will(&self) {
        self.inner.lock().will = None;
    }

    fn connect(&self, host: &str, port: u16) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if inner.worker.as_ref().is_some_and(|w| !w.is_finished()) {
            return Err(TransportError::new("connect", "network loop is running"));
        }
        // a loop that ended after disconnect is reaped here
        if let Some(worker) = inner.worker.take() {
            let _ = worker.join();
        }

        let options = self.options(host, port, inner.will.as_ref());
        let (client, eventloop) = AsyncClient::new(options, self.capacity);
        inner.client = Some(client);
        inner.eventloop = Some(eventloop);
        debug!(client = %self.client_id, host = %host, port, "mqtt client created");
        Ok(())
    }

    /// Queues DISCONNECT and retires the client. The network loop exits once
    /// the packet is sent, so the engine cannot reconnect with the options
    /// (and last will) it was built with.
    fn disconnect(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        let client = inner
            .client
            .take()
            .ok_or_else(|| TransportError::new("disconnect", "no connection"))?;

        if inner.eventloop.take().is_some() {
            debug!(client = %self.client_id, "disconnected before the network loop started");
            return Ok(());
        }

        inner.signal(Control::Closing);
        if let Err(e) = client.try_disconnect() {
            inner.signal(Control::Abort);
            return Err(TransportError::new("disconnect", e));
        }
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
        let qos = to_mqtt_qos(qos);
        match properties {
            Some(props) => self.with_client("publish", |client| {
                client.try_publish_with_properties(topic, qos, retain, payload.to_vec(), to_publish_properties(props))
            }),
            None => self.with_client("publish", |client| client.try_publish(topic, qos, retain, payload.to_vec())),
        }
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), TransportError> {
        self.with_client("subscribe", |client| client.try_subscribe(topic, to_mqtt_qos(qos)))
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.with_client("unsubscribe", |client| client.try_unsubscribe(topic))
    }

    fn start(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if inner.worker.as_ref().is_some_and(|w| !w.is_finished()) {
            return Err(TransportError::new("start", "network loop already running"));
        }
        let eventloop = inner
            .eventloop
            .take()
            .ok_or_else(|| TransportError::new("start", "no connection"))?;

        let handler = self.handler.read().clone();
        let (tx, control) = watch::channel(Control::Run);

        let worker = thread::Builder::new()
            .name(format!("{}-net", self.client_id))
            .spawn(move || run_network_thread(eventloop, handler, control))
            .map_err(|e| TransportError::new("start", e))?;
        inner.worker = Some(worker);
        inner.control = Some(tx);
        info!(client = %self.client_id, "network loop started");
        Ok(())
    }

    /// Stops the network loop.
    ///
    /// A graceful stop sends DISCONNECT and waits for the loop to finish,
    /// except when called from a subscriber callback: the loop runs on that
    /// very thread, so it is left to finish on its own. A forced stop drops
    /// the connection without waiting; no message reaches the handler after
    /// it returns.
    fn stop(&self, force: bool) -> Result<(), TransportError> {
        let worker = {
            let mut inner = self.inner.lock();
            let Some(worker) = inner.worker.take() else {
                return Err(TransportError::new("stop", "network loop is not running"));
            };

            if force {
                inner.signal(Control::Abort);
            } else {
                inner.signal(Control::Closing);
                let sent = inner.client.as_ref().map(|client| client.try_disconnect());
                if !matches!(sent, Some(Ok(()))) {
                    debug!(client = %self.client_id, "no disconnect queued, aborting the loop");
                    inner.signal(Control::Abort);
                }
            }
            inner.client = None;
            worker
        };

        if force {
            info!(client = %self.client_id, "network loop detached");
            return Ok(());
        }
        if worker.thread().id() == thread::current().id() {
            info!(client = %self.client_id, "stop requested from the network thread, loop ends after this callback");
            return Ok(());
        }

        worker
            .join()
            .map_err(|_| TransportError::new("stop", "network thread panicked"))?;
        info!(client = %self.client_id, "network loop stopped");
        Ok(())
    }
}

fn run_network_thread(
    eventloop: EventLoop,
    handler: Option<Arc<dyn InboundHandler>>,
    control: watch::Receiver<Control>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build the network runtime");
            return;
        }
    };
    runtime.block_on(run_network_loop(eventloop, handler, control));
    debug!("network loop exited");
}

async fn run_network_loop(
    mut eventloop: EventLoop,
    handler: Option<Arc<dyn InboundHandler>>,
    mut control: watch::Receiver<Control>,
) {
    // set after a connection error; polling again would reconnect
    let mut offline = false;

    loop {
        if offline && *control.borrow() != Control::Run {
            debug!("closing while offline");
            break;
        }

        // only an abort may cut a poll short; a cancelled connect would
        // just be retried on a fresh socket
        let event = tokio::select! {
            _ = aborted(&mut control) => break,
            event = eventloop.poll() => event,
        };
        let state = *control.borrow();

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) if state == Control::Run => {
                offline = false;
                forward(&publish, handler.as_deref());
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                trace!(topic = %String::from_utf8_lossy(&publish.topic), "inbound message dropped while closing");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("disconnect sent");
                break;
            }
            Ok(event) => {
                offline = false;
                trace!(?event, "mqtt event");
            }
            Err(e) if state != Control::Run => {
                debug!(error = %e, "connection closed while closing");
                break;
            }
            Err(e) => {
                error!(error = %e, "mqtt connection error");
                offline = true;
                tokio::select! {
                    _ = control.wait_for(|c| *c != Control::Run) => {}
                    _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                }
            }
        }
    }
}

/// Resolves once the loop is told to abort or the transport is dropped.
async fn aborted(control: &mut watch::Receiver<Control>) {
    let _ = control.wait_for(|c| *c == Control::Abort).await;
}

fn forward(publish: &Publish, handler: Option<&dyn InboundHandler>) {
    let Some(handler) = handler else {
        warn!("inbound message dropped, no handler registered");
        return;
    };
    let topic = String::from_utf8_lossy(&publish.topic);
    let properties = publish.properties.as_ref().map(from_publish_properties);
    handler.on_message(&topic, &publish.payload, properties.as_ref());
}

fn to_mqtt_qos(qos: QoS) -> MqttQoS {
    match qos {
        QoS::AtMostOnce => MqttQoS::AtMostOnce,
        QoS::AtLeastOnce => MqttQoS::AtLeastOnce,
        QoS::ExactlyOnce => MqttQoS::ExactlyOnce,
    }
}

fn to_publish_properties(props: &Properties) -> PublishProperties {
    PublishProperties {
        response_topic: props.response_topic.clone(),
        correlation_data: props.correlation_data.clone().map(Into::into),
        user_properties: props.user_properties.clone(),
        ..Default::default()
    }
}

fn from_publish_properties(props: &PublishProperties) -> Properties {
    Properties {
        response_topic: props.response_topic.clone(),
        correlation_data: props.correlation_data.as_ref().map(|data| data.to_vec()),
        user_properties: props.user_properties.clone(),
    }
}
