//! # Dispatcher
//!
//! Single entry point for everything that changes the session: widget
//! interactions collected by the UI and notifications queued by the MQTT
//! client both arrive as a [`SessionEvent`] and are handled in
//! [`Dispatcher::dispatch`].
//!
//! Profile management (select, save, delete) lives here because it needs the
//! settings store as well as the live session.

use super::console::Console;
use super::controller::{FieldChange, SessionController};
use super::Affordances;
use crate::mqtt::{ClientEvent, ConnectionState, MqttClient};
use crate::persistence::kv_store::KeyValueStore;
use crate::persistence::settings_store::{SaveError, SettingsStore};
use crate::persistence::Profile;
use std::fmt;
use tracing::{debug, error, trace, warn};

/// Entry of the profile selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProfileChoice {
    New,
    Stored(String),
}

impl fmt::Display for ProfileChoice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProfileChoice::New => write!(f, "New setting"),
            ProfileChoice::Stored(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    FieldChanged(FieldChange),
    ConnectClicked,
    PublishClicked,
    SubscribeClicked,
    UnsubscribeClicked,
    SubscriptionSelected(usize),
    ProfileSelected(ProfileChoice),
    SaveClicked,
    /// Only sent once the user confirmed the deletion
    DeleteClicked,
    ClearLog,
    ConnectionStateChanged(ConnectionState),
    MessageReceived { topic: String, payload: Vec<u8> },
    MessageSent(u16),
}

impl From<ClientEvent> for SessionEvent {
    fn from(event: ClientEvent) -> Self {
        match event {
            ClientEvent::StateChanged(state) => SessionEvent::ConnectionStateChanged(state),
            ClientEvent::MessageSent(id) => SessionEvent::MessageSent(id),
            ClientEvent::MessageReceived { topic, payload } => {
                SessionEvent::MessageReceived { topic, payload }
            }
        }
    }
}

pub struct Dispatcher<C: MqttClient, S: KeyValueStore> {
    session: SessionController<C>,
    store: SettingsStore<S>,
    profiles: Vec<String>,
    selected_profile: ProfileChoice,
}

impl<C: MqttClient, S: KeyValueStore> Dispatcher<C, S> {
    /// Starts on "New setting" with a default profile.
    pub fn new(client: C, store: SettingsStore<S>, console: Console) -> Self {
        let profile = store.load_profile("");
        let profiles = store.list_profiles();
        Self {
            session: SessionController::new(client, profile, console),
            store,
            profiles,
            selected_profile: ProfileChoice::New,
        }
    }

    pub fn session(&self) -> &SessionController<C> {
        &self.session
    }

    pub fn profile(&self) -> &Profile {
        self.session.profile()
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn console(&self) -> &Console {
        self.session.console()
    }

    pub fn selected_profile(&self) -> &ProfileChoice {
        &self.selected_profile
    }

    /// "New setting" followed by the stored profiles.
    pub fn profile_choices(&self) -> Vec<ProfileChoice> {
        std::iter::once(ProfileChoice::New)
            .chain(self.profiles.iter().cloned().map(ProfileChoice::Stored))
            .collect()
    }

    pub fn affordances(&self) -> Affordances {
        self.session
            .affordances(matches!(self.selected_profile, ProfileChoice::Stored(_)))
    }

    pub fn status_line(&self) -> String {
        self.session.status_line()
    }

    /// Feeds every queued client notification through [`Self::dispatch`].
    pub fn pump_client_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.session.client_mut().poll_event() {
            self.dispatch(event.into());
            handled += 1;
        }
        handled
    }

    pub fn dispatch(&mut self, event: SessionEvent) {
        trace!("Dispatching {:?}", event);
        match event {
            SessionEvent::FieldChanged(change) => self.session.apply_field(change),
            SessionEvent::ConnectClicked => self.session.toggle_connection(),
            SessionEvent::PublishClicked => {
                // failures are already on the console
                let _ = self.session.publish_current();
            }
            SessionEvent::SubscribeClicked => {
                let topic = self.session.profile().subscribe_topic_draft.clone();
                let _ = self.session.subscribe(&topic);
            }
            SessionEvent::UnsubscribeClicked => {
                if let Some(index) = self.session.selected_subscription() {
                    self.session.unsubscribe(index);
                }
            }
            SessionEvent::SubscriptionSelected(index) => self.session.select_subscription(index),
            SessionEvent::ProfileSelected(choice) => self.select_profile(choice),
            SessionEvent::SaveClicked => self.save_profile(),
            SessionEvent::DeleteClicked => self.delete_profile(),
            SessionEvent::ClearLog => self.session.clear_log(),
            SessionEvent::ConnectionStateChanged(state) => self.session.on_state_changed(state),
            SessionEvent::MessageReceived { topic, payload } => {
                self.session.on_message_received(&topic, &payload)
            }
            SessionEvent::MessageSent(id) => self.session.on_message_sent(id),
        }
    }

    fn select_profile(&mut self, choice: ProfileChoice) {
        if self.session.state() != ConnectionState::Disconnected {
            debug!("Profile selection ignored while {}", self.session.state());
            return;
        }

        match &choice {
            ProfileChoice::New => {
                let defaults = self.store.load_profile("");
                self.session.load_profile(defaults);
            }
            ProfileChoice::Stored(name) => {
                if !self.profiles.contains(name) {
                    warn!("Selected profile {} is not stored", name);
                }
                let profile = self.store.load_profile(name);
                self.session.load_profile(profile);
                self.session.log(format!("Load setting: {}", name));
            }
        }
        self.selected_profile = choice;
    }

    fn save_profile(&mut self) {
        if !self.affordances().save_profile {
            debug!("Save not available right now");
            return;
        }

        match self.store.save_profile(self.session.profile()) {
            Ok(()) => {
                self.session.log("Settings saved.");
                self.refresh_profiles();
                self.selected_profile = ProfileChoice::Stored(self.session.profile().name.clone());
            }
            Err(SaveError::EmptyName) => {}
            Err(SaveError::NotWritable) => self.session.log("Save failure."),
            Err(SaveError::Store(e)) => {
                error!("Writing profile failed: {}", e);
                self.session.log("Save failure.");
            }
        }
    }

    fn delete_profile(&mut self) {
        if !self.affordances().delete_profile {
            debug!("Delete not available right now");
            return;
        }
        let ProfileChoice::Stored(name) = self.selected_profile.clone() else {
            return;
        };

        if let Err(e) = self.store.delete_profile(&name) {
            error!("Deleting profile {} failed: {}", name, e);
            self.session.log("Delete failure.");
            return;
        }
        self.session.log("Settings deleted.");
        self.refresh_profiles();
        self.select_profile(ProfileChoice::New);
    }

    fn refresh_profiles(&mut self) {
        self.profiles = self.store.list_profiles();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::testing::{Call, RecordingClient};
    use crate::persistence::kv_store::TomlFileStore;
    use crate::persistence::SUBSCRIBED_SENTINEL;
    use tempfile::TempDir;

    fn dispatcher(dir: &TempDir) -> Dispatcher<RecordingClient, TomlFileStore> {
        let backend = TomlFileStore::open(dir.path().join("settings.toml")).unwrap();
        Dispatcher::new(
            RecordingClient::default(),
            SettingsStore::new(backend),
            Console::new(100),
        )
    }

    fn last_line(d: &Dispatcher<RecordingClient, TomlFileStore>) -> Option<String> {
        d.console().last().map(|e| e.text.clone())
    }

    fn edit(d: &mut Dispatcher<RecordingClient, TomlFileStore>, change: FieldChange) {
        d.dispatch(SessionEvent::FieldChanged(change));
    }

    /// Connect click plus the broker accepting, as the real client reports it.
    fn connect(d: &mut Dispatcher<RecordingClient, TomlFileStore>) {
        d.dispatch(SessionEvent::ConnectClicked);
        d.pump_client_events();
        d.session.client_mut().emit_state(ConnectionState::Connected);
        d.pump_client_events();
    }

    #[test]
    fn starts_on_new_setting_with_defaults() {
        let dir = TempDir::new().unwrap();
        let d = dispatcher(&dir);
        assert_eq!(d.selected_profile(), &ProfileChoice::New);
        assert_eq!(d.profile_choices(), [ProfileChoice::New]);
        assert_eq!(d.profile().address, "127.0.0.1");
        assert_eq!(ProfileChoice::New.to_string(), "New setting");
    }

    #[test]
    fn save_refreshes_list_and_selects_saved_profile() {
        let dir = TempDir::new().unwrap();
        let mut d = dispatcher(&dir);
        edit(&mut d, FieldChange::ProfileName("home".into()));
        edit(&mut d, FieldChange::Address("10.0.0.5".into()));
        edit(&mut d, FieldChange::Port(1884));

        d.dispatch(SessionEvent::SaveClicked);

        assert_eq!(last_line(&d).as_deref(), Some("Settings saved."));
        assert_eq!(
            d.profile_choices(),
            [ProfileChoice::New, ProfileChoice::Stored("home".into())]
        );
        assert_eq!(d.selected_profile(), &ProfileChoice::Stored("home".into()));
        assert!(d.affordances().delete_profile);
    }

    #[test]
    fn save_without_name_does_nothing() {
        let dir = TempDir::new().unwrap();
        let mut d = dispatcher(&dir);
        d.dispatch(SessionEvent::SaveClicked);
        assert!(d.console().is_empty());
        assert_eq!(d.profile_choices(), [ProfileChoice::New]);
    }

    #[test]
    fn selecting_stored_profile_loads_it_into_client() {
        let dir = TempDir::new().unwrap();
        let mut d = dispatcher(&dir);
        edit(&mut d, FieldChange::ProfileName("lab".into()));
        edit(&mut d, FieldChange::Address("lab.local".into()));
        d.dispatch(SessionEvent::SaveClicked);

        d.dispatch(SessionEvent::ProfileSelected(ProfileChoice::New));
        assert_eq!(d.profile().name, "");
        assert_eq!(d.profile().address, "127.0.0.1");

        d.session.client_mut().calls.clear();
        d.dispatch(SessionEvent::ProfileSelected(ProfileChoice::Stored("lab".into())));
        assert_eq!(d.profile().name, "lab");
        assert_eq!(d.profile().address, "lab.local");
        assert_eq!(last_line(&d).as_deref(), Some("Load setting: lab"));
        assert!(d
            .session()
            .client()
            .calls
            .contains(&Call::Hostname("lab.local".into())));
    }

    #[test]
    fn delete_returns_to_new_setting() {
        let dir = TempDir::new().unwrap();
        let mut d = dispatcher(&dir);
        edit(&mut d, FieldChange::ProfileName("old".into()));
        d.dispatch(SessionEvent::SaveClicked);

        d.dispatch(SessionEvent::DeleteClicked);

        assert_eq!(last_line(&d).as_deref(), Some("Settings deleted."));
        assert_eq!(d.profile_choices(), [ProfileChoice::New]);
        assert_eq!(d.selected_profile(), &ProfileChoice::New);
        assert_eq!(d.profile().name, "");
    }

    #[test]
    fn delete_without_stored_selection_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut d = dispatcher(&dir);
        d.dispatch(SessionEvent::DeleteClicked);
        assert!(d.console().is_empty());
    }

    #[test]
    fn profile_selection_is_locked_while_connected() {
        let dir = TempDir::new().unwrap();
        let mut d = dispatcher(&dir);
        edit(&mut d, FieldChange::ProfileName("p".into()));
        edit(&mut d, FieldChange::Address("p.example".into()));
        d.dispatch(SessionEvent::SaveClicked);
        connect(&mut d);

        d.dispatch(SessionEvent::ProfileSelected(ProfileChoice::New));
        assert_eq!(d.profile().name, "p");
        assert_eq!(d.selected_profile(), &ProfileChoice::Stored("p".into()));
    }

    #[test]
    fn save_while_connected_stores_live_subscriptions() {
        let dir = TempDir::new().unwrap();
        let mut d = dispatcher(&dir);
        edit(&mut d, FieldChange::ProfileName("live".into()));
        connect(&mut d);
        edit(&mut d, FieldChange::SubscribeTopic("sensors/#".into()));
        d.dispatch(SessionEvent::SubscribeClicked);

        assert!(d.affordances().save_profile);
        d.dispatch(SessionEvent::SaveClicked);

        assert_eq!(last_line(&d).as_deref(), Some("Settings saved."));
        assert_eq!(
            d.profile_choices(),
            [ProfileChoice::New, ProfileChoice::Stored("live".into())]
        );
        let reloaded = dispatcher(&dir);
        assert_eq!(
            reloaded.store.load_profile("live").subscribed_topics(),
            [SUBSCRIBED_SENTINEL, "sensors/#"]
        );
    }

    #[test]
    fn client_events_flow_through_dispatch() {
        let dir = TempDir::new().unwrap();
        let mut d = dispatcher(&dir);
        d.dispatch(SessionEvent::ConnectClicked);
        assert_eq!(d.pump_client_events(), 1);
        assert_eq!(d.state(), ConnectionState::Connecting);
        assert_eq!(d.status_line(), "Connecting to 127.0.0.1...");
        assert_eq!(d.affordances().connect_label, "Cancel");

        d.session.client_mut().emit_state(ConnectionState::Connected);
        d.session.client_mut().queued.push_back(ClientEvent::MessageReceived {
            topic: "a".into(),
            payload: b"b".to_vec(),
        });
        assert_eq!(d.pump_client_events(), 2);
        assert_eq!(d.state(), ConnectionState::Connected);
        assert_eq!(last_line(&d).as_deref(), Some("Received Topic: a Message: b"));

        // Disconnect click while connected
        d.dispatch(SessionEvent::ConnectClicked);
        d.pump_client_events();
        assert_eq!(d.state(), ConnectionState::Disconnected);
        assert_eq!(last_line(&d).as_deref(), Some("Disconnected"));
    }

    #[test]
    fn subscribe_and_unsubscribe_via_selection() {
        let dir = TempDir::new().unwrap();
        let mut d = dispatcher(&dir);
        connect(&mut d);

        edit(&mut d, FieldChange::SubscribeTopic("sensors/#".into()));
        d.dispatch(SessionEvent::SubscribeClicked);
        assert_eq!(d.profile().subscribed_topics(), [SUBSCRIBED_SENTINEL, "sensors/#"]);

        // no selection yet
        d.dispatch(SessionEvent::UnsubscribeClicked);
        assert_eq!(d.profile().subscribed_topics().len(), 2);

        d.dispatch(SessionEvent::SubscriptionSelected(1));
        d.dispatch(SessionEvent::UnsubscribeClicked);
        assert_eq!(d.profile().subscribed_topics(), [SUBSCRIBED_SENTINEL]);
    }

    #[test]
    fn saved_topics_are_resubscribed_after_reload() {
        let dir = TempDir::new().unwrap();
        let mut d = dispatcher(&dir);
        edit(&mut d, FieldChange::ProfileName("home".into()));
        connect(&mut d);
        edit(&mut d, FieldChange::SubscribeTopic("sensors/#".into()));
        d.dispatch(SessionEvent::SubscribeClicked);
        d.dispatch(SessionEvent::ConnectClicked);
        d.pump_client_events();
        d.dispatch(SessionEvent::SaveClicked);

        let mut fresh = dispatcher(&dir);
        fresh.dispatch(SessionEvent::ProfileSelected(ProfileChoice::Stored("home".into())));
        connect(&mut fresh);
        assert_eq!(fresh.session().client().subscribes(), ["sensors/#"]);
    }

    #[test]
    fn clear_log_empties_console() {
        let dir = TempDir::new().unwrap();
        let mut d = dispatcher(&dir);
        d.dispatch(SessionEvent::MessageSent(3));
        assert_eq!(last_line(&d).as_deref(), Some("Message sent: 3"));
        d.dispatch(SessionEvent::ClearLog);
        assert!(d.console().is_empty());
    }
}
