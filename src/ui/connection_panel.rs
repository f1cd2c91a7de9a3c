//! Profile selector plus the broker connection form.

use super::common::{create_frame, text_field, UiColors};
use crate::persistence::{Profile, ProtocolVersion};
use crate::session::controller::FieldChange;
use crate::session::dispatcher::{ProfileChoice, SessionEvent};
use crate::session::Affordances;
use eframe::egui::{Button, ComboBox, DragValue, Grid, Ui};

pub struct ConnectionPanel<'a> {
    pub choices: &'a [ProfileChoice],
    pub selected: &'a ProfileChoice,
    pub affordances: &'a Affordances,
}

impl ConnectionPanel<'_> {
    /// Returns true when the user asked to delete the selected profile.
    pub fn render(&self, ui: &mut Ui, form: &mut Profile, events: &mut Vec<SessionEvent>) -> bool {
        let mut delete_requested = false;

        create_frame(UiColors::MAIN_BG, UiColors::BORDER).show(ui, |ui| {
            ui.heading("Settings");
            ui.add_enabled_ui(self.affordances.manage_profiles, |ui| {
                self.profile_selection(ui, events);

                ui.horizontal(|ui| {
                    ui.label("Name");
                    text_field(
                        ui,
                        &mut form.name,
                        "profile name",
                        false,
                        FieldChange::ProfileName,
                        events,
                    );
                });
            });

            ui.horizontal(|ui| {
                let save = Button::new("Save");
                if ui.add_enabled(self.affordances.save_profile, save).clicked() {
                    events.push(SessionEvent::SaveClicked);
                }
                let delete = Button::new("Delete");
                if ui.add_enabled(self.affordances.delete_profile, delete).clicked() {
                    delete_requested = true;
                }
            });
        });

        create_frame(UiColors::MAIN_BG, UiColors::BORDER).show(ui, |ui| {
            ui.heading("Connection");
            ui.add_enabled_ui(self.affordances.edit_connection, |ui| {
                connection_form(ui, form, events);
            });

            ui.add_space(4.0);
            if ui.button(self.affordances.connect_label).clicked() {
                events.push(SessionEvent::ConnectClicked);
            }
        });

        delete_requested
    }

    fn profile_selection(&self, ui: &mut Ui, events: &mut Vec<SessionEvent>) {
        ComboBox::from_id_salt("profile_selector")
            .selected_text(self.selected.to_string())
            .show_ui(ui, |ui| {
                for choice in self.choices {
                    let is_selected = choice == self.selected;
                    if ui.selectable_label(is_selected, choice.to_string()).clicked()
                        && !is_selected
                    {
                        events.push(SessionEvent::ProfileSelected(choice.clone()));
                    }
                }
            });
    }
}

fn connection_form(ui: &mut Ui, form: &mut Profile, events: &mut Vec<SessionEvent>) {
    Grid::new("connection_form")
        .num_columns(2)
        .spacing([8.0, 4.0])
        .show(ui, |ui| {
            ui.label("Host");
            text_field(ui, &mut form.address, "127.0.0.1", false, FieldChange::Address, events);
            ui.end_row();

            ui.label("Port");
            if ui
                .add(DragValue::new(&mut form.port).range(1..=u16::MAX))
                .changed()
            {
                events.push(SessionEvent::FieldChanged(FieldChange::Port(form.port)));
            }
            ui.end_row();

            ui.label("Keep alive");
            if ui
                .add(
                    DragValue::new(&mut form.keep_alive_secs)
                        .range(0..=u16::MAX)
                        .suffix(" s"),
                )
                .changed()
            {
                events.push(SessionEvent::FieldChanged(FieldChange::KeepAlive(
                    form.keep_alive_secs,
                )));
            }
            ui.end_row();

            ui.label("Client ID");
            text_field(ui, &mut form.client_id, "", false, FieldChange::ClientId, events);
            ui.end_row();

            ui.label("User");
            text_field(ui, &mut form.username, "", false, FieldChange::Username, events);
            ui.end_row();

            ui.label("Password");
            text_field(ui, &mut form.password, "", true, FieldChange::Password, events);
            ui.end_row();

            ui.label("Version");
            ComboBox::from_id_salt("protocol_version")
                .selected_text(form.protocol_version.label())
                .show_ui(ui, |ui| {
                    for version in ProtocolVersion::ALL {
                        let is_selected = version == form.protocol_version;
                        if ui.selectable_label(is_selected, version.label()).clicked()
                            && !is_selected
                        {
                            events.push(SessionEvent::FieldChanged(
                                FieldChange::ProtocolVersion(version),
                            ));
                        }
                    }
                });
            ui.end_row();

            ui.label("");
            if ui.checkbox(&mut form.clean_session, "Clean session").changed() {
                events.push(SessionEvent::FieldChanged(FieldChange::CleanSession(
                    form.clean_session,
                )));
            }
            ui.end_row();
        });
}
