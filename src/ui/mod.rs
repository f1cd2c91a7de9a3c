//! # MClient User Interface Module
//!
//! eframe/egui front end of the MQTT client.
//!
//! ## Why This Module Exists
//!
//! The UI is a thin layer over the [`Dispatcher`]. It never changes session
//! state on its own: every frame it renders the live profile and the current
//! [`Affordances`](crate::session::Affordances), collects what the user did as
//! [`SessionEvent`]s and hands them to the dispatcher once the frame is built.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────── menu bar (File / Help) ─────────────┐
//! │ profile +      │ publish      │ subscribe        │
//! │ connection     ├──────────────┴──────────────────┤
//! │ form           │ log                     [Clear] │
//! ├────────────────┴─────────────────────────────────┤
//! │ ● status line                             [Quit] │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Frame Rate
//! Requests a repaint every 100 ms so client events are drained even while
//! the window has no input.

pub mod common;
pub mod connection_panel;
pub mod console_panel;
pub mod dialogs;
pub mod messaging_panel;

use eframe::egui::{self, Context, Layout};
use std::time::Duration;
use tracing::debug;

use crate::mqtt::mqtt_handler::RumqttcClient;
use crate::persistence::kv_store::TomlFileStore;
use crate::session::dispatcher::{Dispatcher, ProfileChoice, SessionEvent};

use self::connection_panel::ConnectionPanel;
use self::dialogs::Confirmation;

pub type AppDispatcher = Dispatcher<RumqttcClient, TomlFileStore>;

const REPAINT_INTERVAL: Duration = Duration::from_millis(100);

/// Dialog currently shown on top of the main window.
#[derive(Clone, Debug, PartialEq, Eq)]
enum OpenDialog {
    ConfirmDelete(String),
    About,
}

pub struct MClientUI {
    dispatcher: AppDispatcher,
    dialog: Option<OpenDialog>,
}

impl MClientUI {
    pub fn new(cc: &eframe::CreationContext<'_>, dispatcher: AppDispatcher) -> Self {
        cc.egui_ctx.set_theme(egui::Theme::Dark);
        Self {
            dispatcher,
            dialog: None,
        }
    }

    fn menu_bar(&mut self, ctx: &Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.menu_button("Help", |ui| {
                    if ui.button("About").clicked() {
                        self.dialog = Some(OpenDialog::About);
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn status_bar(&self, ctx: &Context) {
        egui::TopBottomPanel::bottom("status_bar")
            .show_separator_line(false)
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    common::status_dot(ui, self.dispatcher.state());
                    ui.label(self.dispatcher.status_line());
                    ui.with_layout(Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Quit").clicked() {
                            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        }
                    });
                });
            });
    }

    fn dialogs(&mut self, ctx: &Context, events: &mut Vec<SessionEvent>) {
        match &self.dialog {
            Some(OpenDialog::ConfirmDelete(name)) => {
                if let Some(answer) = dialogs::delete_confirmation(ctx, name) {
                    debug!("Delete of {} answered with {:?}", name, answer);
                    if answer == Confirmation::Yes {
                        events.push(SessionEvent::DeleteClicked);
                    }
                    self.dialog = None;
                }
            }
            Some(OpenDialog::About) => {
                if dialogs::about(ctx) {
                    self.dialog = None;
                }
            }
            None => {}
        }
    }
}

impl eframe::App for MClientUI {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.dispatcher.pump_client_events();

        let mut events = Vec::new();
        let affordances = self.dispatcher.affordances();
        let choices = self.dispatcher.profile_choices();
        let selected_profile = self.dispatcher.selected_profile().clone();
        let selected_subscription = self.dispatcher.session().selected_subscription();
        let mut form = self.dispatcher.profile().clone();

        self.menu_bar(ctx);
        self.status_bar(ctx);

        let delete_requested = egui::SidePanel::left("connection_panel")
            .resizable(false)
            .min_width(280.0)
            .show(ctx, |ui| {
                ConnectionPanel {
                    choices: &choices,
                    selected: &selected_profile,
                    affordances: &affordances,
                }
                .render(ui, &mut form, &mut events)
            })
            .inner;

        egui::CentralPanel::default().show(ctx, |ui| {
            messaging_panel::render(ui, &mut form, &affordances, selected_subscription, &mut events);
            ui.add_space(4.0);
            console_panel::render(ui, self.dispatcher.console(), &mut events);
        });

        if delete_requested && self.dialog.is_none() {
            if let ProfileChoice::Stored(name) = selected_profile {
                self.dialog = Some(OpenDialog::ConfirmDelete(name));
            }
        }
        self.dialogs(ctx, &mut events);

        for event in events {
            self.dispatcher.dispatch(event);
        }

        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}
