//! # Settings Store
//!
//! Maps profile names onto groups of a [`KeyValueStore`]. Saving always writes
//! the complete field set, loading falls back to defaults key by key.
//!
//! ## Stored Layout
//! ```text
//! [home]
//! address = "10.0.0.5"
//! port = 1884
//! version = "v3.1.1"
//! clientid = "..."
//! keep_alive = 60
//! clean_session = true
//! qos = 0
//! retained = false
//! pub_topic = ""
//! pub_message = ""
//! sub_topic = ""
//! sub_topics = "------- Subscribed -------,sensors/#"
//! ```

use super::kv_store::{KeyValueStore, StoreError};
use super::{Profile, QosLevel};
use thiserror::Error;
use toml::{Table, Value};
use tracing::{debug, info, warn};

mod keys {
    pub const ADDRESS: &str = "address";
    pub const PORT: &str = "port";
    pub const VERSION: &str = "version";
    pub const CLIENT_ID: &str = "clientid";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const KEEP_ALIVE: &str = "keep_alive";
    pub const CLEAN_SESSION: &str = "clean_session";
    pub const QOS: &str = "qos";
    pub const RETAINED: &str = "retained";
    pub const PUB_TOPIC: &str = "pub_topic";
    pub const PUB_MESSAGE: &str = "pub_message";
    pub const SUB_TOPIC: &str = "sub_topic";
    pub const SUB_TOPICS: &str = "sub_topics";
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Settings store is not writable")]
    NotWritable,

    #[error("Profile name is empty")]
    EmptyName,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SettingsStore<S: KeyValueStore> {
    backend: S,
}

impl<S: KeyValueStore> SettingsStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    /// Stored profile names in store enumeration order.
    pub fn list_profiles(&self) -> Vec<String> {
        self.backend.child_groups()
    }

    /// Loads `name`, or the default profile when the name is empty or unknown.
    ///
    /// Each missing or mistyped key falls back to its default individually.
    /// A defaulted client id is freshly generated on every call.
    pub fn load_profile(&self, name: &str) -> Profile {
        let defaults = Profile::named(name);

        let group = if name.is_empty() {
            None
        } else {
            self.backend.group(name)
        };
        let Some(group) = group else {
            debug!("No stored profile {:?}, using defaults", name);
            return defaults;
        };

        let reader = GroupReader { name, group };
        let mut profile = Profile {
            name: name.to_string(),
            address: reader.string(keys::ADDRESS).unwrap_or(defaults.address),
            port: reader.u16(keys::PORT).unwrap_or(defaults.port),
            keep_alive_secs: reader
                .u16(keys::KEEP_ALIVE)
                .unwrap_or(defaults.keep_alive_secs),
            clean_session: reader
                .bool(keys::CLEAN_SESSION)
                .unwrap_or(defaults.clean_session),
            protocol_version: reader
                .string(keys::VERSION)
                .and_then(|v| v.parse().map_err(|e| warn!("{}: {}", name, e)).ok())
                .unwrap_or(defaults.protocol_version),
            client_id: reader.string(keys::CLIENT_ID).unwrap_or(defaults.client_id),
            username: reader.string(keys::USERNAME).unwrap_or(defaults.username),
            password: reader.string(keys::PASSWORD).unwrap_or(defaults.password),
            publish_topic: reader
                .string(keys::PUB_TOPIC)
                .unwrap_or(defaults.publish_topic),
            publish_message: reader
                .string(keys::PUB_MESSAGE)
                .unwrap_or(defaults.publish_message),
            qos: reader
                .integer(keys::QOS)
                .and_then(QosLevel::from_index)
                .unwrap_or(defaults.qos),
            retained: reader.bool(keys::RETAINED).unwrap_or(defaults.retained),
            subscribe_topic_draft: reader
                .string(keys::SUB_TOPIC)
                .unwrap_or(defaults.subscribe_topic_draft),
            ..defaults
        };

        if let Some(joined) = reader.string(keys::SUB_TOPICS) {
            profile.set_joined_topics(&joined);
        }

        info!("Loaded profile {}", name);
        profile
    }

    /// Persists every field of `profile`, replacing any group of the same name.
    pub fn save_profile(&mut self, profile: &Profile) -> Result<(), SaveError> {
        if !self.backend.is_writable() {
            warn!("Settings store is read-only, profile {} not saved", profile.name);
            return Err(SaveError::NotWritable);
        }
        if profile.name.is_empty() {
            debug!("Ignoring save request without a profile name");
            return Err(SaveError::EmptyName);
        }

        let mut group = Table::new();
        group.insert(keys::ADDRESS.into(), Value::from(profile.address.as_str()));
        group.insert(keys::PORT.into(), Value::from(i64::from(profile.port)));
        group.insert(
            keys::VERSION.into(),
            Value::from(profile.protocol_version.label()),
        );
        group.insert(keys::CLIENT_ID.into(), Value::from(profile.client_id.as_str()));
        group.insert(keys::USERNAME.into(), Value::from(profile.username.as_str()));
        group.insert(keys::PASSWORD.into(), Value::from(profile.password.as_str()));
        group.insert(
            keys::KEEP_ALIVE.into(),
            Value::from(i64::from(profile.keep_alive_secs)),
        );
        group.insert(keys::CLEAN_SESSION.into(), Value::from(profile.clean_session));
        group.insert(keys::QOS.into(), Value::from(i64::from(profile.qos.index())));
        group.insert(keys::RETAINED.into(), Value::from(profile.retained));
        group.insert(
            keys::PUB_TOPIC.into(),
            Value::from(profile.publish_topic.as_str()),
        );
        group.insert(
            keys::PUB_MESSAGE.into(),
            Value::from(profile.publish_message.as_str()),
        );
        group.insert(
            keys::SUB_TOPIC.into(),
            Value::from(profile.subscribe_topic_draft.as_str()),
        );
        group.insert(keys::SUB_TOPICS.into(), Value::from(profile.joined_topics()));

        self.backend.replace_group(&profile.name, group)?;
        info!("Profile {} saved", profile.name);
        Ok(())
    }

    /// Removes `name` entirely. Absent profiles are ignored.
    pub fn delete_profile(&mut self, name: &str) -> Result<(), StoreError> {
        self.backend.remove_group(name)?;
        info!("Profile {} deleted", name);
        Ok(())
    }
}

/// Typed access to one group, logging keys whose value has the wrong type.
struct GroupReader<'a> {
    name: &'a str,
    group: &'a Table,
}

impl GroupReader<'_> {
    fn typed<T>(&self, key: &str, convert: impl FnOnce(&Value) -> Option<T>) -> Option<T> {
        let value = self.group.get(key)?;
        let converted = convert(value);
        if converted.is_none() {
            warn!(
                "Profile {}: ignoring {} = {} (unexpected type or range)",
                self.name, key, value
            );
        }
        converted
    }

    fn string(&self, key: &str) -> Option<String> {
        self.typed(key, |v| v.as_str().map(str::to_string))
    }

    fn integer(&self, key: &str) -> Option<i64> {
        self.typed(key, Value::as_integer)
    }

    fn u16(&self, key: &str) -> Option<u16> {
        self.typed(key, |v| v.as_integer().and_then(|i| u16::try_from(i).ok()))
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.typed(key, Value::as_bool)
    }
}
