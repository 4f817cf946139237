//! MQTT messenger: periodic per-topic producers, per-topic consumers, and `tell/<whom>` messages.
//!
//! A `Messenger` is built up with producers and consumers, then `start`ed. Starting spawns two
//! tasks on the current tokio runtime: the MQTT event loop (dispatching inbound messages) and a
//! publisher that polls every producer once per second. `RunningMessenger::stop` cancels both.

use std::collections::HashMap;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Broker used when none is given.
pub const DEFAULT_BROKER: &str = "bill";
pub const DEFAULT_PORT: u16 = 1883;

const PUBLISH_INTERVAL: Duration = Duration::from_secs(1);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const REQUEST_CAPACITY: usize = 64;

/// Called once per publish interval; `Some` payloads are published on the producer's topic.
pub type Producer = Box<dyn FnMut() -> Option<String> + Send>;
/// Called with (topic, payload) for each message on the consumer's topic.
pub type Consumer = Box<dyn FnMut(&str, &[u8]) + Send>;

#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("mqtt request failed: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("messenger task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub struct Messenger {
    client_id: String,
    broker: String,
    port: u16,
    producers: HashMap<String, Producer>,
    consumers: HashMap<String, Consumer>,
}

impl Messenger {
    /// Client id is `<hostname>-<service_name>`.
    pub fn new(service_name: &str) -> Self {
        Self {
            client_id: client_id(&crate::hostconfig::hostname(), service_name),
            broker: DEFAULT_BROKER.to_string(),
            port: DEFAULT_PORT,
            producers: HashMap::new(),
            consumers: HashMap::new(),
        }
    }

    pub fn with_broker(mut self, host: impl Into<String>, port: u16) -> Self {
        self.broker = host.into();
        self.port = port;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Publish whatever `producer` returns on `topic`, every second, for as long as running.
    /// Replaces any producer already registered for the topic.
    pub fn publish_forever<F>(&mut self, topic: impl Into<String>, producer: F)
    where
        F: FnMut() -> Option<String> + Send + 'static,
    {
        self.producers.insert(topic.into(), Box::new(producer));
    }

    /// Subscribe to `topic` and hand each message to `consumer`.
    pub fn subscribe<F>(&mut self, topic: impl Into<String>, consumer: F)
    where
        F: FnMut(&str, &[u8]) + Send + 'static,
    {
        self.consumers.insert(topic.into(), Box::new(consumer));
    }

    /// Spawn the event loop and publisher. Must be called within a tokio runtime.
    /// Connection happens in the background and is retried until `stop`.
    pub fn start(self) -> RunningMessenger {
        let options = MqttOptions::new(self.client_id.clone(), self.broker.clone(), self.port);
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tracing::info!(client_id = %self.client_id, broker = %self.broker, port = self.port, "starting messenger");

        let events = tokio::spawn(event_loop(
            eventloop,
            client.clone(),
            self.consumers,
            shutdown_rx.clone(),
        ));
        let publisher = tokio::spawn(publish_loop(client.clone(), self.producers, shutdown_rx));
        RunningMessenger {
            client,
            shutdown: shutdown_tx,
            events,
            publisher,
        }
    }
}

pub struct RunningMessenger {
    client: AsyncClient,
    shutdown: watch::Sender<bool>,
    events: JoinHandle<()>,
    publisher: JoinHandle<()>,
}

impl RunningMessenger {
    pub async fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> Result<(), MessengerError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await?;
        Ok(())
    }

    /// Send `what` to `tell/<whom>`.
    pub async fn tell(&self, whom: &str, what: impl Into<Vec<u8>>) -> Result<(), MessengerError> {
        self.publish(&tell_topic(whom), what).await
    }

    /// Cancel the publisher and event loop, disconnecting from the broker, and wait for both.
    pub async fn stop(self) -> Result<(), MessengerError> {
        let _ = self.shutdown.send(true);
        self.publisher.await?;
        self.events.await?;
        tracing::info!("messenger stopped");
        Ok(())
    }
}

fn client_id(hostname: &str, service_name: &str) -> String {
    format!("{}-{}", hostname, service_name)
}

fn tell_topic(whom: &str) -> String {
    format!("tell/{}", whom)
}

/// Run every producer once; keep the payloads that are present.
fn collect_due(producers: &mut HashMap<String, Producer>) -> Vec<(String, String)> {
    producers
        .iter_mut()
        .filter_map(|(topic, producer)| producer().map(|payload| (topic.clone(), payload)))
        .collect()
}

/// Route one inbound message. Returns false (and logs) when nobody subscribed to the topic.
fn dispatch(consumers: &mut HashMap<String, Consumer>, topic: &str, payload: &[u8]) -> bool {
    match consumers.get_mut(topic) {
        Some(consumer) => {
            consumer(topic, payload);
            true
        }
        None => {
            tracing::warn!(topic, "message on unexpected topic");
            false
        }
    }
}

/// True if shutdown was signalled within `wait`.
async fn shutdown_within(shutdown: &mut watch::Receiver<bool>, wait: Duration) -> bool {
    tokio::time::timeout(wait, shutdown.changed()).await.is_ok()
}

async fn publish_loop(
    client: AsyncClient,
    mut producers: HashMap<String, Producer>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(PUBLISH_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        for (topic, payload) in collect_due(&mut producers) {
            // Never block here: a disconnected broker must not stall shutdown.
            if let Err(e) = client.try_publish(topic.as_str(), QoS::AtMostOnce, false, payload) {
                tracing::warn!(topic = %topic, error = %e, "dropping periodic publish");
            }
        }
    }
}

async fn event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    mut consumers: HashMap<String, Consumer>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            event = eventloop.poll() => event,
            _ = shutdown.changed() => break,
        };
        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("connected to broker");
                // Subscriptions don't survive a clean-session reconnect.
                for topic in consumers.keys() {
                    if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                        tracing::warn!(topic = %topic, error = %e, "subscribe failed");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                dispatch(&mut consumers, &publish.topic, &publish.payload);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "broker connection failed, retrying");
                if shutdown_within(&mut shutdown, RECONNECT_DELAY).await {
                    break;
                }
            }
        }
    }

    if client.try_disconnect().is_ok() {
        let _ = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
    }
}
