use super::common::{create_frame, UiColors};
use crate::session::console::Console;
use crate::session::dispatcher::SessionEvent;
use eframe::egui::{Label, RichText, ScrollArea, Ui};

/// Scrollable log with a Clear button, newest line at the bottom.
pub fn render(ui: &mut Ui, console: &Console, events: &mut Vec<SessionEvent>) {
    create_frame(UiColors::MAIN_BG, UiColors::BORDER).show(ui, |ui| {
        ui.horizontal(|ui| {
            ui.heading("Log");
            if ui.button("Clear").clicked() {
                events.push(SessionEvent::ClearLog);
            }
        });

        create_frame(UiColors::EXTREME_BG, UiColors::BORDER).show(ui, |ui| {
            ScrollArea::vertical()
                .id_salt("console_log")
                .stick_to_bottom(true)
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    for entry in console.entries() {
                        ui.add(Label::new(RichText::new(entry.to_string()).monospace()).selectable(true));
                    }
                });
        });
    });
}
