//! Shared styling helpers for the MClient panels.

use crate::mqtt::ConnectionState;
use crate::session::controller::FieldChange;
use crate::session::dispatcher::SessionEvent;
use eframe::egui::{Color32, Frame, Stroke, TextEdit, Ui};

/// Dark theme palette used by every panel.
pub struct UiColors;

impl UiColors {
    /// Panel background (RGB: 30, 30, 30)
    pub const MAIN_BG: Color32 = Color32::from_rgb(30, 30, 30);

    /// Nested group background (RGB: 25, 25, 25)
    pub const INNER_BG: Color32 = Color32::from_rgb(25, 25, 25);

    /// Log background (RGB: 20, 20, 20)
    pub const EXTREME_BG: Color32 = Color32::from_rgb(20, 20, 20);

    pub const BORDER: Color32 = Color32::from_rgb(60, 60, 60);

    /// Connected (green)
    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);

    /// Connecting (amber)
    pub const PENDING: Color32 = Color32::from_rgb(220, 160, 20);

    /// Disconnected (red)
    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);
}

pub fn create_frame(bg_color: Color32, border_color: Color32) -> Frame {
    Frame::new()
        .stroke(Stroke::new(1.0, border_color))
        .fill(bg_color)
        .inner_margin(4)
        .outer_margin(2)
}

pub fn state_color(state: ConnectionState) -> Color32 {
    match state {
        ConnectionState::Disconnected => UiColors::INACTIVE,
        ConnectionState::Connecting => UiColors::PENDING,
        ConnectionState::Connected => UiColors::ACTIVE,
    }
}

pub fn status_dot(ui: &mut Ui, state: ConnectionState) {
    ui.colored_label(state_color(state), "\u{2B24}");
}

/// Single line edit that reports its new value as a [`FieldChange`].
pub fn text_field(
    ui: &mut Ui,
    value: &mut String,
    hint: &str,
    password: bool,
    change: fn(String) -> FieldChange,
    events: &mut Vec<SessionEvent>,
) {
    let edit = TextEdit::singleline(value).hint_text(hint).password(password);
    if ui.add(edit).changed() {
        events.push(SessionEvent::FieldChanged(change(value.clone())));
    }
}
