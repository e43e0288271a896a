//! MQTT transport for movement events.
//!
//! # How the client is split (for beginners)
//!
//! `rumqttc` hands back two halves:
//!
//! - an [`AsyncClient`] that *queues* requests (publish, subscribe) on a
//!   bounded channel, and
//! - an [`EventLoop`] that owns the TCP connection, drains that channel, and
//!   reconnects when the broker goes away.
//!
//! The control loop runs on a blocking thread and must never wait on the
//! network, so [`MqttEventPublisher`] only ever calls
//! [`AsyncClient::try_publish`], which either queues immediately or fails.
//! The event loop runs as its own Tokio task (see [`spawn_event_loop`]).
//!
//! Events are published with QoS 1 (at least once) and are not retained.
//!
//! At exit, [`MqttEventPublisher::close`] queues a disconnect behind the last
//! events and gives the event loop a bounded grace period to flush them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use laser_core::MovementEvent;
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::control_loop::EventPublisher;
use crate::infrastructure::storage::config::MqttConfig;

/// Outgoing requests buffered while the broker is unreachable.
const REQUEST_CAPACITY: usize = 64;

/// Pause between reconnect attempts after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Error type for a single publish.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode movement event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("MQTT client rejected publish: {0}")]
    Transport(#[from] ClientError),
}

/// Builds connection options from the `[mqtt]` config section.
pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let client_id = config
        .client_id
        .clone()
        .unwrap_or_else(|| format!("laser-controller-{}", Uuid::new_v4().simple()));
    let mut options = MqttOptions::new(client_id, config.broker.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(config.keepalive_secs));
    options
}

/// Counts publishes queued by the client and written out by the event loop.
#[derive(Debug, Default)]
struct Backlog {
    queued: AtomicU64,
    sent: AtomicU64,
}

impl Backlog {
    fn pending(&self) -> u64 {
        self.queued
            .load(Ordering::SeqCst)
            .saturating_sub(self.sent.load(Ordering::SeqCst))
    }
}

/// The network half of the client; hand it to [`spawn_event_loop`].
pub struct MqttConnection {
    eventloop: EventLoop,
    backlog: Arc<Backlog>,
}

/// Fire-and-forget [`EventPublisher`] over MQTT.
#[derive(Clone)]
pub struct MqttEventPublisher {
    client: AsyncClient,
    topic: String,
    backlog: Arc<Backlog>,
}

impl MqttEventPublisher {
    /// Creates the publisher and the connection that must be driven for any
    /// message to leave the process.
    pub fn new(config: &MqttConfig) -> (Self, MqttConnection) {
        Self::with_capacity(config, REQUEST_CAPACITY)
    }

    fn with_capacity(config: &MqttConfig, capacity: usize) -> (Self, MqttConnection) {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config), capacity);
        let backlog = Arc::new(Backlog::default());
        let publisher = Self {
            client,
            topic: config.topic.clone(),
            backlog: Arc::clone(&backlog),
        };
        (publisher, MqttConnection { eventloop, backlog })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Events accepted by [`try_send`](Self::try_send) that the event loop has
    /// not yet written to the broker.
    pub fn pending(&self) -> u64 {
        self.backlog.pending()
    }

    /// Queues a disconnect behind any pending events and waits up to `grace`
    /// for the event loop in `task` to flush them and stop.
    ///
    /// The task is aborted when the grace period runs out.  Events that never
    /// left the process are reported with a warning.
    pub async fn close(&self, mut task: JoinHandle<()>, grace: Duration) {
        if let Err(e) = self.client.try_disconnect() {
            debug!("MQTT disconnect not queued: {e}");
        }
        if tokio::time::timeout(grace, &mut task).await.is_err() {
            task.abort();
        }
        match self.pending() {
            0 => info!("MQTT publisher closed"),
            pending => warn!(pending, "movement events discarded at shutdown"),
        }
    }

    /// Encodes and queues one event without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Transport`] when the request queue is full or
    /// the event loop has gone away.
    pub fn try_send(&self, event: &MovementEvent) -> Result<(), PublishError> {
        let payload = event.to_json()?;
        self.client
            .try_publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload)?;
        self.backlog.queued.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl EventPublisher for MqttEventPublisher {
    fn publish(&self, event: MovementEvent) {
        match self.try_send(&event) {
            Ok(()) => debug!(seq = event.sequence, x = event.x, y = event.y, "movement queued"),
            Err(e) => warn!(seq = event.sequence, error = %e, "movement event dropped"),
        }
    }
}

/// Drives the MQTT connection until a disconnect is sent or the task is
/// aborted.
///
/// Connection errors are logged once per outage; the loop then waits
/// [`RECONNECT_DELAY`] and lets `rumqttc` reconnect on the next poll.
pub fn spawn_event_loop(connection: MqttConnection) -> JoinHandle<()> {
    let MqttConnection {
        mut eventloop,
        backlog,
    } = connection;
    tokio::spawn(async move {
        let mut connected = false;
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("MQTT broker connected");
                    connected = true;
                }
                Ok(Event::Outgoing(Outgoing::Publish(_))) => {
                    backlog.sent.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!("MQTT disconnect sent");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    if connected {
                        warn!("MQTT connection lost: {e}");
                    } else {
                        debug!("MQTT broker unreachable: {e}");
                    }
                    connected = false;
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
