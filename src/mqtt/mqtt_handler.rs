//! rumqttc backed [`MqttClient`] with a statum driven event loop worker
//!
//! Parameters are recorded by the setters and turned into [`MqttOptions`] on
//! every connect. The rumqttc [`EventLoop`] runs in its own tokio task and
//! reports back through an unbounded channel that the UI thread drains.
//!
//! # Worker State Machine
//!
//! ```text
//! Configured ──► Polling ──► Stopped
//!                   │           ▲
//!                   └───────────┘
//!     (first error, DISCONNECT, broker close or cancel)
//! ```
//!
//! The worker stops on the first connection error instead of letting rumqttc
//! reconnect, so a failed attempt always surfaces as `Disconnected`.

use super::{ClientError, ClientEvent, ConnectionState, MqttClient};
use crate::persistence::{generate_client_id, ProtocolVersion, QosLevel};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Parameters mirrored from the UI, applied on the next connect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub keep_alive_secs: u16,
    pub clean_session: bool,
    pub protocol_version: ProtocolVersion,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: String::new(),
            username: String::new(),
            password: String::new(),
            keep_alive_secs: 60,
            clean_session: true,
            protocol_version: ProtocolVersion::default(),
        }
    }
}

impl ConnectionParams {
    /// Builds rumqttc options. rumqttc rejects empty client ids and ids with a
    /// leading space, those are replaced by a generated one.
    pub fn to_options(&self) -> MqttOptions {
        let client_id = if self.client_id.is_empty() || self.client_id.starts_with(' ') {
            let generated = generate_client_id();
            warn!(
                "Client id {:?} is not usable, connecting as {}",
                self.client_id, generated
            );
            generated
        } else {
            self.client_id.clone()
        };

        if self.protocol_version == ProtocolVersion::V3_1 {
            warn!("MQTT v3.1 is not available, connecting with v3.1.1");
        }

        let mut options = MqttOptions::new(client_id, self.host.clone(), self.port);
        options
            .set_keep_alive(Duration::from_secs(u64::from(self.keep_alive_secs)))
            .set_clean_session(self.clean_session);
        if !self.username.is_empty() {
            options.set_credentials(self.username.clone(), self.password.clone());
        }
        options
    }
}

fn to_rumqttc_qos(qos: QosLevel) -> QoS {
    match qos {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}

/// Shared between the client handle and its worker.
#[derive(Clone)]
pub struct Reporter {
    state: Arc<watch::Sender<ConnectionState>>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl Reporter {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("MQTT state {} -> {}", previous, state);
            self.emit(ClientEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped, discarding client event");
        }
    }
}

/// States for the event loop worker
#[state]
#[derive(Debug, Clone)]
pub enum WorkerState {
    Configured, // event loop created, nothing polled yet
    Polling,    // driving the connection
    Stopped,    // connection closed
}

#[machine]
pub struct ConnectionWorker<S: WorkerState> {
    event_loop: EventLoop,
    reporter: Reporter,
    cancel: CancellationToken,
    host: String,
}

impl ConnectionWorker<Configured> {
    fn create(
        event_loop: EventLoop,
        reporter: Reporter,
        cancel: CancellationToken,
        host: String,
    ) -> Self {
        Self::new(event_loop, reporter, cancel, host)
    }

    fn start(self) -> ConnectionWorker<Polling> {
        info!("Connecting to {}", self.host);
        self.transition()
    }
}

impl ConnectionWorker<Polling> {
    /// Polls until the connection ends for any reason.
    async fn run_until_closed(mut self) -> ConnectionWorker<Stopped> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Connection to {} cancelled", self.host);
                    break;
                }
                event = self.event_loop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        if ack.code == ConnectReturnCode::Success {
                            info!("Connected to {}", self.host);
                            self.reporter.set_state(ConnectionState::Connected);
                        } else {
                            warn!("Broker {} refused connection: {:?}", self.host, ack.code);
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        trace!("Received message on {}", publish.topic);
                        self.reporter.emit(ClientEvent::MessageReceived {
                            topic: publish.topic.clone(),
                            payload: publish.payload.to_vec(),
                        });
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        info!("Broker {} closed the session", self.host);
                        break;
                    }
                    Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                        self.reporter.emit(ClientEvent::MessageSent(pkid));
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        info!("Disconnected from {}", self.host);
                        break;
                    }
                    Ok(other) => trace!("MQTT event: {:?}", other),
                    Err(e) => {
                        error!("Connection to {} failed: {}", self.host, e);
                        break;
                    }
                },
            }
        }
        self.transition()
    }
}

impl ConnectionWorker<Stopped> {
    fn finish(self) {
        self.reporter.set_state(ConnectionState::Disconnected);
    }
}

/// Production [`MqttClient`] on top of rumqttc.
pub struct RumqttcClient {
    params: ConnectionParams,
    runtime: Handle,
    request_capacity: usize,
    client: Option<AsyncClient>,
    cancel: Option<CancellationToken>,
    reporter: Reporter,
    events: mpsc::UnboundedReceiver<ClientEvent>,
}

impl RumqttcClient {
    /// `runtime` hosts the event loop tasks, `request_capacity` bounds the
    /// rumqttc request queue.
    pub fn new(runtime: Handle, request_capacity: usize) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            params: ConnectionParams::default(),
            runtime,
            request_capacity,
            client: None,
            cancel: None,
            reporter: Reporter {
                state: Arc::new(state_tx),
                events: events_tx,
            },
            events: events_rx,
        }
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    fn connected_client(&self) -> Result<&AsyncClient, ClientError> {
        match (&self.client, self.reporter.state()) {
            (Some(client), ConnectionState::Connected) => Ok(client),
            _ => Err(ClientError::NotConnected),
        }
    }
}

impl MqttClient for RumqttcClient {
    fn set_hostname(&mut self, host: &str) {
        self.params.host = host.to_string();
    }

    fn set_port(&mut self, port: u16) {
        self.params.port = port;
    }

    fn set_client_id(&mut self, client_id: &str) {
        self.params.client_id = client_id.to_string();
    }

    fn set_username(&mut self, username: &str) {
        self.params.username = username.to_string();
    }

    fn set_password(&mut self, password: &str) {
        self.params.password = password.to_string();
    }

    fn set_keep_alive(&mut self, seconds: u16) {
        self.params.keep_alive_secs = seconds;
    }

    fn set_clean_session(&mut self, clean: bool) {
        self.params.clean_session = clean;
    }

    fn set_protocol_version(&mut self, version: ProtocolVersion) {
        self.params.protocol_version = version;
    }

    fn connect_to_host(&mut self) {
        if self.reporter.state() != ConnectionState::Disconnected {
            debug!("Connect requested while {}, ignoring", self.reporter.state());
            return;
        }

        let (client, event_loop) = AsyncClient::new(self.params.to_options(), self.request_capacity);
        let cancel = CancellationToken::new();
        self.reporter.set_state(ConnectionState::Connecting);

        let worker = ConnectionWorker::create(
            event_loop,
            self.reporter.clone(),
            cancel.clone(),
            format!("{}:{}", self.params.host, self.params.port),
        );
        self.runtime.spawn(async move {
            worker.start().run_until_closed().await.finish();
        });

        self.client = Some(client);
        self.cancel = Some(cancel);
    }

    fn disconnect_from_host(&mut self) {
        match self.reporter.state() {
            ConnectionState::Disconnected => debug!("Already disconnected"),
            ConnectionState::Connecting => {
                if let Some(cancel) = &self.cancel {
                    cancel.cancel();
                }
            }
            ConnectionState::Connected => {
                let sent = self
                    .client
                    .as_ref()
                    .map(|client| client.try_disconnect())
                    .unwrap_or(Ok(()));
                if let Err(e) = sent {
                    warn!("Graceful disconnect failed ({}), dropping connection", e);
                    if let Some(cancel) = &self.cancel {
                        cancel.cancel();
                    }
                }
            }
        }
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QosLevel,
        retain: bool,
    ) -> Result<(), ClientError> {
        self.connected_client()?
            .try_publish(topic, to_rumqttc_qos(qos), retain, payload.to_vec())
            .map_err(|e| ClientError::Rejected(e.to_string()))
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.connected_client()?
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| ClientError::Rejected(e.to_string()))
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.connected_client()?
            .try_unsubscribe(topic)
            .map_err(|e| ClientError::Rejected(e.to_string()))
    }

    fn state(&self) -> ConnectionState {
        self.reporter.state()
    }

    fn poll_event(&mut self) -> Option<ClientEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for RumqttcClient {
    fn drop(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }
}
