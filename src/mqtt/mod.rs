//! # MQTT Integration Module
//!
//! Provides the broker connection used by the session controller. Everything
//! protocol related (handshake, keep-alive, QoS acknowledgements, topic
//! matching) is handled by `rumqttc`; this module only adapts it to the
//! capability the rest of MClient expects.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── mod.rs            - MqttClient capability, events and connection state
//! └── mqtt_handler.rs   - rumqttc implementation and event loop worker
//! ```
//!
//! ## Event Flow
//!
//! The client never calls back into the UI. Connection state changes and
//! message notifications are queued as [`ClientEvent`]s and drained by the
//! dispatcher on the UI thread through [`MqttClient::poll_event`].

pub mod mqtt_handler;

use crate::persistence::{ProtocolVersion, QosLevel};
use std::fmt;
use thiserror::Error;

/// Connection lifecycle as reported by the client.
///
/// There is no separate failure state: a failed attempt or a dropped
/// connection is reported as a return to `Disconnected`.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        };
        write!(f, "{}", text)
    }
}

/// Notifications emitted by an [`MqttClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    StateChanged(ConnectionState),
    /// An outgoing publish left the client, identified by its packet id
    MessageSent(u16),
    MessageReceived { topic: String, payload: Vec<u8> },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Client is not connected")]
    NotConnected,

    #[error("Request rejected by MQTT client: {0}")]
    Rejected(String),
}

/// Capability of an MQTT client as used by the session controller.
///
/// Setters only record parameters; they take effect on the next
/// [`MqttClient::connect_to_host`].
pub trait MqttClient {
    fn set_hostname(&mut self, host: &str);
    fn set_port(&mut self, port: u16);
    fn set_client_id(&mut self, client_id: &str);
    fn set_username(&mut self, username: &str);
    fn set_password(&mut self, password: &str);
    fn set_keep_alive(&mut self, seconds: u16);
    fn set_clean_session(&mut self, clean: bool);
    fn set_protocol_version(&mut self, version: ProtocolVersion);

    /// Starts a connection attempt. Ignored unless disconnected.
    fn connect_to_host(&mut self);

    /// Closes the connection or aborts a pending attempt.
    fn disconnect_from_host(&mut self);

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QosLevel,
        retain: bool,
    ) -> Result<(), ClientError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), ClientError>;

    fn unsubscribe(&mut self, topic: &str) -> Result<(), ClientError>;

    fn state(&self) -> ConnectionState;

    /// Next queued event, if any. Never blocks.
    fn poll_event(&mut self) -> Option<ClientEvent>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording client for controller and dispatcher tests.

    use super::*;
    use std::collections::VecDeque;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Call {
        Hostname(String),
        Port(u16),
        ClientId(String),
        Username(String),
        Password(String),
        KeepAlive(u16),
        CleanSession(bool),
        ProtocolVersion(ProtocolVersion),
        Connect,
        Disconnect,
        Publish {
            topic: String,
            payload: Vec<u8>,
            qos: QosLevel,
            retain: bool,
        },
        Subscribe(String),
        Unsubscribe(String),
    }

    /// Accepts requests only while its state is `Connected`.
    #[derive(Default)]
    pub struct RecordingClient {
        pub calls: Vec<Call>,
        pub state: ConnectionState,
        pub queued: VecDeque<ClientEvent>,
    }

    impl RecordingClient {
        pub fn subscribes(&self) -> Vec<String> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Subscribe(t) => Some(t.clone()),
                    _ => None,
                })
                .collect()
        }

        /// Simulates the broker side of a state change.
        pub fn emit_state(&mut self, state: ConnectionState) {
            self.state = state;
            self.queued.push_back(ClientEvent::StateChanged(state));
        }
    }

    impl MqttClient for RecordingClient {
        fn set_hostname(&mut self, host: &str) {
            self.calls.push(Call::Hostname(host.to_string()));
        }
        fn set_port(&mut self, port: u16) {
            self.calls.push(Call::Port(port));
        }
        fn set_client_id(&mut self, client_id: &str) {
            self.calls.push(Call::ClientId(client_id.to_string()));
        }
        fn set_username(&mut self, username: &str) {
            self.calls.push(Call::Username(username.to_string()));
        }
        fn set_password(&mut self, password: &str) {
            self.calls.push(Call::Password(password.to_string()));
        }
        fn set_keep_alive(&mut self, seconds: u16) {
            self.calls.push(Call::KeepAlive(seconds));
        }
        fn set_clean_session(&mut self, clean: bool) {
            self.calls.push(Call::CleanSession(clean));
        }
        fn set_protocol_version(&mut self, version: ProtocolVersion) {
            self.calls.push(Call::ProtocolVersion(version));
        }

        fn connect_to_host(&mut self) {
            self.calls.push(Call::Connect);
            if self.state == ConnectionState::Disconnected {
                self.emit_state(ConnectionState::Connecting);
            }
        }

        fn disconnect_from_host(&mut self) {
            self.calls.push(Call::Disconnect);
            if self.state != ConnectionState::Disconnected {
                self.emit_state(ConnectionState::Disconnected);
            }
        }

        fn publish(
            &mut self,
            topic: &str,
            payload: &[u8],
            qos: QosLevel,
            retain: bool,
        ) -> Result<(), ClientError> {
            self.calls.push(Call::Publish {
                topic: topic.to_string(),
                payload: payload.to_vec(),
                qos,
                retain,
            });
            match self.state {
                ConnectionState::Connected => Ok(()),
                _ => Err(ClientError::NotConnected),
            }
        }

        fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
            self.calls.push(Call::Subscribe(topic.to_string()));
            match self.state {
                ConnectionState::Connected => Ok(()),
                _ => Err(ClientError::NotConnected),
            }
        }

        fn unsubscribe(&mut self, topic: &str) -> Result<(), ClientError> {
            self.calls.push(Call::Unsubscribe(topic.to_string()));
            match self.state {
                ConnectionState::Connected => Ok(()),
                _ => Err(ClientError::NotConnected),
            }
        }

        fn state(&self) -> ConnectionState {
            self.state
        }

        fn poll_event(&mut self) -> Option<ClientEvent> {
            self.queued.pop_front()
        }
    }
}
