//! Modal dialogs: delete confirmation and About.

use egui::{Context, Id, Modal};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    Cancel,
}

/// Yes/No/Cancel question before a profile is removed. `None` while open.
///
/// Escape or a click outside counts as Cancel.
pub fn delete_confirmation(ctx: &Context, profile_name: &str) -> Option<Confirmation> {
    let response = Modal::new(Id::new("delete_confirmation")).show(ctx, |ui| {
        ui.set_width(260.0);
        ui.heading("Delete setting");
        ui.label(format!("Delete the setting \"{}\"?", profile_name));
        ui.separator();

        let mut answer = None;
        ui.horizontal(|ui| {
            if ui.button("Yes").clicked() {
                answer = Some(Confirmation::Yes);
            }
            if ui.button("No").clicked() {
                answer = Some(Confirmation::No);
            }
            if ui.button("Cancel").clicked() {
                answer = Some(Confirmation::Cancel);
            }
        });
        answer
    });

    match response.inner {
        Some(answer) => Some(answer),
        None if response.should_close() => Some(Confirmation::Cancel),
        None => None,
    }
}

/// Returns true once the dialog was dismissed.
pub fn about(ctx: &Context) -> bool {
    let response = Modal::new(Id::new("about_dialog")).show(ctx, |ui| {
        ui.set_width(260.0);
        ui.heading("MQTT Client");
        ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
        ui.label("Desktop client for publishing to and subscribing on MQTT brokers.");
        ui.separator();
        ui.button("OK").clicked()
    });
    response.inner || response.should_close()
}
