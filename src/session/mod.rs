//! # Session Module
//!
//! Ties the live [`Profile`](crate::persistence::Profile) to the broker
//! connection and to the settings store.
//!
//! ## Module Architecture
//!
//! ```text
//! session/
//! ├── console.rs      - bounded on-screen log
//! ├── controller.rs   - live profile, connection handle, publish/subscribe
//! └── dispatcher.rs   - single entry point for UI and client events
//! ```
//!
//! ## Affordances
//! Which fields and actions are enabled is never toggled incrementally. It is
//! recomputed from the connection state on every frame by
//! [`Affordances::for_state`], so the UI can't drift out of sync.

pub mod console;
pub mod controller;
pub mod dispatcher;

use crate::mqtt::ConnectionState;

/// Enabled state of every interactive control, derived from session state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Affordances {
    /// Host, port, keep-alive, client id, credentials, clean session, version
    pub edit_connection: bool,
    /// Profile selector and profile name field
    pub manage_profiles: bool,
    pub save_profile: bool,
    pub delete_profile: bool,
    pub publish: bool,
    pub subscribe: bool,
    pub unsubscribe: bool,
    pub connect_label: &'static str,
}

impl Affordances {
    /// * `has_profile_name` - the profile name field is non-empty
    /// * `stored_profile_selected` - a saved profile (not "New setting") is selected
    /// * `subscription_selected` - a non-sentinel row of the topic list is selected
    pub fn for_state(
        state: ConnectionState,
        has_profile_name: bool,
        stored_profile_selected: bool,
        subscription_selected: bool,
    ) -> Self {
        match state {
            ConnectionState::Disconnected => Self {
                edit_connection: true,
                manage_profiles: true,
                save_profile: has_profile_name,
                delete_profile: stored_profile_selected,
                publish: false,
                subscribe: false,
                unsubscribe: false,
                connect_label: "Connect",
            },
            ConnectionState::Connecting => Self {
                edit_connection: false,
                manage_profiles: false,
                save_profile: false,
                delete_profile: false,
                publish: false,
                subscribe: false,
                unsubscribe: false,
                connect_label: "Cancel",
            },
            ConnectionState::Connected => Self {
                edit_connection: false,
                manage_profiles: false,
                save_profile: has_profile_name,
                delete_profile: false,
                publish: true,
                subscribe: true,
                unsubscribe: subscription_selected,
                connect_label: "Disconnect",
            },
        }
    }
}

/// Status bar text for `state`.
pub fn status_line(state: ConnectionState, host: &str) -> String {
    match state {
        ConnectionState::Disconnected => "Disconnected".to_string(),
        ConnectionState::Connecting => format!("Connecting to {}...", host),
        ConnectionState::Connected => "Connected".to_string(),
    }
}
