//! Session Controller - owner of the live profile and the connection handle
//!
//! Every field edit is pushed into the client immediately, so a connect always
//! uses what the user currently sees. Connection state is only ever changed
//! by events coming back from the client.
//!
//! # State Machine
//!
//! ```text
//! Disconnected ──connect──► Connecting ──success──► Connected
//!      ▲                        │                       │
//!      └────────disconnect / failure / broker close─────┘
//! ```
//!
//! Entering `Connected` re-subscribes every saved topic except the sentinel.

use super::console::Console;
use super::{status_line, Affordances};
use crate::mqtt::{ConnectionState, MqttClient};
use crate::persistence::{Profile, ProtocolVersion, QosLevel};
use thiserror::Error;
use tracing::{debug, info, warn};

/// A single edited form field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldChange {
    ProfileName(String),
    Address(String),
    Port(u16),
    KeepAlive(u16),
    CleanSession(bool),
    ProtocolVersion(ProtocolVersion),
    ClientId(String),
    Username(String),
    Password(String),
    PublishTopic(String),
    PublishMessage(String),
    Qos(QosLevel),
    Retained(bool),
    SubscribeTopic(String),
}

impl FieldChange {
    /// Whether the field is a connection parameter, locked while not disconnected.
    fn is_connection_param(&self) -> bool {
        matches!(
            self,
            FieldChange::Address(_)
                | FieldChange::Port(_)
                | FieldChange::KeepAlive(_)
                | FieldChange::CleanSession(_)
                | FieldChange::ProtocolVersion(_)
                | FieldChange::ClientId(_)
                | FieldChange::Username(_)
                | FieldChange::Password(_)
                | FieldChange::ProfileName(_)
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("Could not publish message.")]
    NotConnected,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("Could not subscribe. Is there a valid connection?")]
    NoConnection,
}

pub struct SessionController<C: MqttClient> {
    client: C,
    profile: Profile,
    state: ConnectionState,
    console: Console,
    /// Selected row of the subscribed-topics list, never the sentinel
    selected_subscription: Option<usize>,
}

impl<C: MqttClient> SessionController<C> {
    pub fn new(client: C, profile: Profile, console: Console) -> Self {
        let state = client.state();
        let mut controller = Self {
            client,
            profile,
            state,
            console,
            selected_subscription: None,
        };
        controller.push_connection_params();
        controller
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn selected_subscription(&self) -> Option<usize> {
        self.selected_subscription
    }

    pub fn status_line(&self) -> String {
        status_line(self.state, &self.profile.address)
    }

    pub fn affordances(&self, stored_profile_selected: bool) -> Affordances {
        Affordances::for_state(
            self.state,
            !self.profile.name.is_empty(),
            stored_profile_selected,
            self.selected_subscription.is_some(),
        )
    }

    /// Appends a line to the on-screen log and mirrors it to tracing.
    pub fn log(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!("{}", text);
        self.console.push(text);
    }

    pub fn clear_log(&mut self) {
        self.console.clear();
    }

    /// Replaces the live profile and hands all of its parameters to the client.
    pub fn load_profile(&mut self, profile: Profile) {
        self.profile = profile;
        self.selected_subscription = None;
        self.push_connection_params();
    }

    fn push_connection_params(&mut self) {
        let p = &self.profile;
        self.client.set_hostname(&p.address);
        self.client.set_port(p.port);
        self.client.set_keep_alive(p.keep_alive_secs);
        self.client.set_client_id(&p.client_id);
        self.client.set_clean_session(p.clean_session);
        self.client.set_username(&p.username);
        self.client.set_password(&p.password);
        self.client.set_protocol_version(p.protocol_version);
    }

    /// Applies one field edit to the profile and, for connection parameters,
    /// to the client.
    pub fn apply_field(&mut self, change: FieldChange) {
        if change.is_connection_param() && self.state != ConnectionState::Disconnected {
            debug!("Ignoring {:?} while {}", change, self.state);
            return;
        }

        let p = &mut self.profile;
        match change {
            FieldChange::ProfileName(name) => p.name = name,
            FieldChange::Address(host) => {
                self.client.set_hostname(&host);
                p.address = host;
            }
            FieldChange::Port(port) => {
                self.client.set_port(port);
                p.port = port;
            }
            FieldChange::KeepAlive(secs) => {
                self.client.set_keep_alive(secs);
                p.keep_alive_secs = secs;
            }
            FieldChange::CleanSession(clean) => {
                self.client.set_clean_session(clean);
                p.clean_session = clean;
            }
            FieldChange::ProtocolVersion(version) => {
                self.client.set_protocol_version(version);
                p.protocol_version = version;
            }
            FieldChange::ClientId(id) => {
                self.client.set_client_id(&id);
                p.client_id = id;
            }
            FieldChange::Username(user) => {
                self.client.set_username(&user);
                p.username = user;
            }
            FieldChange::Password(pw) => {
                self.client.set_password(&pw);
                p.password = pw;
            }
            FieldChange::PublishTopic(topic) => p.publish_topic = topic,
            FieldChange::PublishMessage(message) => p.publish_message = message,
            FieldChange::Qos(qos) => p.qos = qos,
            FieldChange::Retained(retained) => p.retained = retained,
            FieldChange::SubscribeTopic(topic) => p.subscribe_topic_draft = topic,
        }
    }

    /// Connects when disconnected, otherwise disconnects or cancels.
    pub fn toggle_connection(&mut self) {
        match self.state {
            ConnectionState::Disconnected => self.client.connect_to_host(),
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.client.disconnect_from_host()
            }
        }
    }

    /// Reacts to a state reported by the client.
    pub fn on_state_changed(&mut self, state: ConnectionState) {
        let previous = self.state;
        self.state = state;

        match state {
            ConnectionState::Connecting => {
                let line = format!("Connecting to {}...", self.profile.address);
                self.log(line);
            }
            ConnectionState::Connected => {
                if previous != ConnectionState::Connected {
                    self.resubscribe_saved_topics();
                }
                self.log("Connected");
            }
            ConnectionState::Disconnected => {
                self.selected_subscription = None;
                self.log("Disconnected");
            }
        }
    }

    fn resubscribe_saved_topics(&mut self) {
        let topics = self.profile.subscriptions().to_vec();
        for topic in topics {
            if let Err(e) = self.client.subscribe(&topic) {
                warn!("Re-subscribing {} failed: {}", topic, e);
                self.log(format!("Could not subscribe to {}.", topic));
            }
        }
    }

    /// One publish attempt, no retry and no queueing.
    pub fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QosLevel,
        retained: bool,
    ) -> Result<(), PublishError> {
        match self.client.publish(topic, payload, qos, retained) {
            Ok(()) => {
                self.log("Publish message successful.");
                Ok(())
            }
            Err(e) => {
                warn!("Publish to {} failed: {}", topic, e);
                let err = PublishError::NotConnected;
                self.log(err.to_string());
                Err(err)
            }
        }
    }

    /// Publishes the topic, message, QoS and retain flag of the live profile.
    pub fn publish_current(&mut self) -> Result<(), PublishError> {
        let p = &self.profile;
        let (topic, payload, qos, retained) = (
            p.publish_topic.clone(),
            p.publish_message.clone().into_bytes(),
            p.qos,
            p.retained,
        );
        self.publish(&topic, &payload, qos, retained)
    }

    /// Subscribes `topic` and lists it once registered.
    pub fn subscribe(&mut self, topic: &str) -> Result<(), SubscribeError> {
        if let Err(e) = self.client.subscribe(topic) {
            warn!("Subscribe to {} failed: {}", topic, e);
            let err = SubscribeError::NoConnection;
            self.log(err.to_string());
            return Err(err);
        }
        if self.profile.add_subscription(topic) {
            debug!("Added {} to subscribed topics", topic);
        }
        Ok(())
    }

    /// Selects a row of the topic list. The sentinel row clears the selection.
    pub fn select_subscription(&mut self, index: usize) {
        match self.profile.subscribed_topics().get(index) {
            Some(topic) if index > 0 => {
                self.profile.subscribe_topic_draft = topic.clone();
                self.selected_subscription = Some(index);
            }
            _ => self.selected_subscription = None,
        }
    }

    /// Removes the row at `index` and unsubscribes its topic. Index 0 is the
    /// sentinel and is left alone.
    pub fn unsubscribe(&mut self, index: usize) {
        let Some(topic) = self.profile.remove_subscription(index) else {
            debug!("Unsubscribe ignored for row {}", index);
            return;
        };
        self.selected_subscription = None;
        if let Err(e) = self.client.unsubscribe(&topic) {
            warn!("Unsubscribe from {} failed: {}", topic, e);
        }
    }

    pub fn on_message_sent(&mut self, id: u16) {
        self.log(format!("Message sent: {}", id));
    }

    pub fn on_message_received(&mut self, topic: &str, payload: &[u8]) {
        self.log(format!(
            "Received Topic: {} Message: {}",
            topic,
            String::from_utf8_lossy(payload)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::testing::{Call, RecordingClient};
    use crate::persistence::SUBSCRIBED_SENTINEL;

    fn controller_with(topics: &[&str]) -> SessionController<RecordingClient> {
        let mut profile = Profile::named("test");
        profile.set_subscribed_topics(topics.iter().copied());
        SessionController::new(RecordingClient::default(), profile, Console::new(100))
    }

    /// Drives the fake client through connect and success.
    fn connect(controller: &mut SessionController<RecordingClient>) {
        controller.toggle_connection();
        controller.on_state_changed(ConnectionState::Connecting);
        controller.client_mut().state = ConnectionState::Connected;
        controller.on_state_changed(ConnectionState::Connected);
    }

    #[test]
    fn construction_pushes_profile_into_client() {
        let controller = controller_with(&[]);
        let calls = &controller.client().calls;
        assert!(calls.contains(&Call::Hostname("127.0.0.1".into())));
        assert!(calls.contains(&Call::Port(1883)));
        assert!(calls.contains(&Call::ProtocolVersion(ProtocolVersion::V3_1_1)));
    }

    #[test]
    fn field_edits_reach_the_client_immediately() {
        let mut controller = controller_with(&[]);
        controller.client_mut().calls.clear();

        controller.apply_field(FieldChange::Address("10.1.1.1".into()));
        controller.apply_field(FieldChange::Port(1999));
        controller.apply_field(FieldChange::PublishTopic("t".into()));

        assert_eq!(
            controller.client().calls,
            [Call::Hostname("10.1.1.1".into()), Call::Port(1999)]
        );
        assert_eq!(controller.profile().address, "10.1.1.1");
        assert_eq!(controller.profile().publish_topic, "t");
    }

    #[test]
    fn connection_fields_are_locked_while_connected() {
        let mut controller = controller_with(&[]);
        connect(&mut controller);

        controller.apply_field(FieldChange::Address("elsewhere".into()));
        controller.apply_field(FieldChange::PublishMessage("still editable".into()));
        assert_eq!(controller.profile().address, "127.0.0.1");
        assert_eq!(controller.profile().publish_message, "still editable");
    }

    #[test]
    fn connecting_then_connected_subscribes_each_saved_topic_once() {
        let mut controller = controller_with(&["sensors/#", "alerts"]);
        connect(&mut controller);

        assert_eq!(controller.client().subscribes(), ["sensors/#", "alerts"]);
        assert!(!controller.client().subscribes().contains(&SUBSCRIBED_SENTINEL.to_string()));
        assert!(controller.affordances(false).publish);
        assert!(controller.affordances(false).subscribe);

        // a repeated Connected report does not subscribe again
        controller.on_state_changed(ConnectionState::Connected);
        assert_eq!(controller.client().subscribes().len(), 2);
    }

    #[test]
    fn state_changes_are_logged() {
        let mut controller = controller_with(&[]);
        controller.on_state_changed(ConnectionState::Connecting);
        assert_eq!(
            controller.console().last().map(|e| e.text.as_str()),
            Some("Connecting to 127.0.0.1...")
        );
        controller.on_state_changed(ConnectionState::Disconnected);
        assert_eq!(
            controller.console().last().map(|e| e.text.as_str()),
            Some("Disconnected")
        );
    }

    #[test]
    fn publish_failure_is_reported_not_retried() {
        let mut controller = controller_with(&[]);
        let result = controller.publish("a/b", b"hi", QosLevel::AtLeastOnce, true);
        assert_eq!(result, Err(PublishError::NotConnected));
        assert_eq!(
            controller.console().last().map(|e| e.text.as_str()),
            Some("Could not publish message.")
        );
        let publishes = controller
            .client()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Publish { .. }))
            .count();
        assert_eq!(publishes, 1);
    }

    #[test]
    fn publish_current_uses_profile_fields() {
        let mut controller = controller_with(&[]);
        connect(&mut controller);
        controller.apply_field(FieldChange::PublishTopic("lights/kitchen".into()));
        controller.apply_field(FieldChange::PublishMessage("on".into()));
        controller.apply_field(FieldChange::Qos(QosLevel::ExactlyOnce));
        controller.apply_field(FieldChange::Retained(true));

        assert_eq!(controller.publish_current(), Ok(()));
        assert_eq!(
            controller.client().calls.last(),
            Some(&Call::Publish {
                topic: "lights/kitchen".into(),
                payload: b"on".to_vec(),
                qos: QosLevel::ExactlyOnce,
                retain: true,
            })
        );
        assert_eq!(
            controller.console().last().map(|e| e.text.as_str()),
            Some("Publish message successful.")
        );
    }

    #[test]
    fn subscribe_twice_lists_topic_once() {
        let mut controller = controller_with(&[]);
        connect(&mut controller);

        assert_eq!(controller.subscribe("home/+/temp"), Ok(()));
        assert_eq!(controller.subscribe("home/+/temp"), Ok(()));
        assert_eq!(
            controller.profile().subscribed_topics(),
            [SUBSCRIBED_SENTINEL, "home/+/temp"]
        );
    }

    #[test]
    fn subscribe_without_connection_fails_and_leaves_list() {
        let mut controller = controller_with(&[]);
        assert_eq!(controller.subscribe("x"), Err(SubscribeError::NoConnection));
        assert_eq!(controller.profile().subscribed_topics(), [SUBSCRIBED_SENTINEL]);
        assert_eq!(
            controller.console().last().map(|e| e.text.as_str()),
            Some("Could not subscribe. Is there a valid connection?")
        );
    }

    #[test]
    fn unsubscribe_sentinel_is_noop() {
        let mut controller = controller_with(&["a"]);
        connect(&mut controller);
        controller.client_mut().calls.clear();

        controller.unsubscribe(0);
        controller.unsubscribe(9);
        assert!(controller.client().calls.is_empty());
        assert_eq!(controller.profile().subscribed_topics(), [SUBSCRIBED_SENTINEL, "a"]);
    }

    #[test]
    fn selecting_and_unsubscribing_a_row() {
        let mut controller = controller_with(&["a", "b"]);
        connect(&mut controller);

        controller.select_subscription(0);
        assert_eq!(controller.selected_subscription(), None);
        assert!(!controller.affordances(false).unsubscribe);

        controller.select_subscription(2);
        assert_eq!(controller.selected_subscription(), Some(2));
        assert_eq!(controller.profile().subscribe_topic_draft, "b");
        assert!(controller.affordances(false).unsubscribe);

        controller.unsubscribe(2);
        assert_eq!(controller.client().calls.last(), Some(&Call::Unsubscribe("b".into())));
        assert_eq!(controller.profile().subscribed_topics(), [SUBSCRIBED_SENTINEL, "a"]);
        assert_eq!(controller.selected_subscription(), None);
    }

    #[test]
    fn received_messages_are_logged_lossily() {
        let mut controller = controller_with(&[]);
        controller.on_message_received("t/1", &[b'o', b'k', 0xff]);
        assert_eq!(
            controller.console().last().map(|e| e.text.as_str()),
            Some("Received Topic: t/1 Message: ok\u{fffd}")
        );
        controller.on_message_sent(7);
        assert_eq!(
            controller.console().last().map(|e| e.text.as_str()),
            Some("Message sent: 7")
        );
    }
}
