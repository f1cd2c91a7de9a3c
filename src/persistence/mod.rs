//! # Persistence Module
//!
//! ## Why This Module Exists
//! MClient lets users keep several broker setups side by side (a local test
//! broker, the home automation broker, a customer's staging system). This module
//! defines the [`Profile`] bundle that captures one such setup and the storage
//! layers that save, load and delete profiles between application runs.
//!
//! ## Key Abstractions
//! - **Profile**: a complete snapshot of connection, session, publish and
//!   subscribe parameters. A profile is always written as a whole, never patched.
//! - **KeyValueStore**: the grouped key-value backend ([`kv_store`]).
//! - **SettingsStore**: maps profile names onto store groups ([`settings_store`]).
//!
//! ## Design Philosophy
//! Missing or unreadable values degrade to defaults field by field instead of
//! preventing a profile from loading, so the client stays usable even with a
//! hand-edited or partially written settings file.

pub mod kv_store;
pub mod settings_store;

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Placeholder occupying index 0 of every subscribed-topics list.
pub const SUBSCRIBED_SENTINEL: &str = "------- Subscribed -------";

/// Length of generated client identifiers (hex characters).
const CLIENT_ID_LEN: usize = 32;

/// Generates a random client identifier.
///
/// A fresh UUID is hashed and hex encoded so every identifier has the same
/// length and character set regardless of the UUID formatting.
pub fn generate_client_id() -> String {
    let digest = Sha256::digest(Uuid::new_v4().to_string().as_bytes());
    let mut id = format!("{:x}", digest);
    id.truncate(CLIENT_ID_LEN);
    id
}

/// MQTT protocol revision requested from the broker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V3_1,
    #[default]
    V3_1_1,
}

impl ProtocolVersion {
    pub const ALL: [ProtocolVersion; 2] = [ProtocolVersion::V3_1, ProtocolVersion::V3_1_1];

    /// Label used both in the UI and in the settings file.
    pub fn label(&self) -> &'static str {
        match self {
            ProtocolVersion::V3_1 => "v3.1",
            ProtocolVersion::V3_1_1 => "v3.1.1",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "v3.1" | "3.1" => Ok(ProtocolVersion::V3_1),
            "v3.1.1" | "3.1.1" => Ok(ProtocolVersion::V3_1_1),
            other => Err(format!("unknown protocol version: {}", other)),
        }
    }
}

/// Delivery guarantee for published messages.
///
/// The discriminant is the index persisted in the settings file and shown in
/// the QoS selector.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum QosLevel {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl QosLevel {
    pub const ALL: [QosLevel; 3] = [
        QosLevel::AtMostOnce,
        QosLevel::AtLeastOnce,
        QosLevel::ExactlyOnce,
    ];

    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(QosLevel::AtMostOnce),
            1 => Some(QosLevel::AtLeastOnce),
            2 => Some(QosLevel::ExactlyOnce),
            _ => None,
        }
    }
}

impl fmt::Display for QosLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Named bundle of connection, session, publish and subscribe parameters.
///
/// ## Invariants
/// `subscribed_topics[0]` is always [`SUBSCRIBED_SENTINEL`]. The field is kept
/// private so the invariant can only be changed through the methods below.
///
/// ## Usage Context
/// The session controller owns exactly one live `Profile`; the UI renders it
/// each frame and the settings store persists it on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Store key; empty means "New setting" and is never persisted
    pub name: String,
    pub address: String,
    pub port: u16,
    pub keep_alive_secs: u16,
    pub clean_session: bool,
    pub protocol_version: ProtocolVersion,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub publish_topic: String,
    pub publish_message: String,
    pub qos: QosLevel,
    pub retained: bool,
    /// Contents of the subscribe topic input
    pub subscribe_topic_draft: String,
    subscribed_topics: Vec<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::new(),
            address: "127.0.0.1".to_string(),
            port: 1883,
            keep_alive_secs: 60,
            clean_session: true,
            protocol_version: ProtocolVersion::default(),
            client_id: generate_client_id(),
            username: String::new(),
            password: String::new(),
            publish_topic: String::new(),
            publish_message: String::new(),
            qos: QosLevel::default(),
            retained: false,
            subscribe_topic_draft: String::new(),
            subscribed_topics: vec![SUBSCRIBED_SENTINEL.to_string()],
        }
    }
}

impl Profile {
    /// Default profile carrying the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Full list including the sentinel at index 0.
    pub fn subscribed_topics(&self) -> &[String] {
        &self.subscribed_topics
    }

    /// Real subscriptions, i.e. everything after the sentinel.
    pub fn subscriptions(&self) -> &[String] {
        self.subscribed_topics.get(1..).unwrap_or(&[])
    }

    /// Replaces the list. The sentinel is re-inserted at index 0 and empty
    /// entries are dropped.
    pub fn set_subscribed_topics<I, T>(&mut self, topics: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut list = vec![SUBSCRIBED_SENTINEL.to_string()];
        list.extend(
            topics
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.is_empty() && t != SUBSCRIBED_SENTINEL),
        );
        self.subscribed_topics = list;
    }

    /// Appends `topic` unless it is already listed. Returns whether it was added.
    pub fn add_subscription(&mut self, topic: &str) -> bool {
        if self.subscribed_topics.iter().any(|t| t == topic) {
            return false;
        }
        self.subscribed_topics.push(topic.to_string());
        true
    }

    /// Removes the entry at `index`. The sentinel can't be removed.
    pub fn remove_subscription(&mut self, index: usize) -> Option<String> {
        if index == 0 || index >= self.subscribed_topics.len() {
            return None;
        }
        Some(self.subscribed_topics.remove(index))
    }

    /// Comma separated form used by the settings file.
    ///
    /// Lossy for topics containing `,`: such a topic comes back from
    /// [`Profile::set_joined_topics`] as separate entries.
    pub fn joined_topics(&self) -> String {
        self.subscribed_topics.join(",")
    }

    /// Parses the comma separated form, see [`Profile::set_subscribed_topics`].
    pub fn set_joined_topics(&mut self, joined: &str) {
        self.set_subscribed_topics(joined.split(','));
    }
}
