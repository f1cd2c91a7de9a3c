//! Publish form and subscription list.

use super::common::{create_frame, text_field, UiColors};
use crate::persistence::{Profile, QosLevel};
use crate::session::controller::FieldChange;
use crate::session::dispatcher::SessionEvent;
use crate::session::Affordances;
use eframe::egui::{Button, ComboBox, Label, RichText, ScrollArea, TextEdit, Ui};

pub fn render(
    ui: &mut Ui,
    form: &mut Profile,
    affordances: &Affordances,
    selected_subscription: Option<usize>,
    events: &mut Vec<SessionEvent>,
) {
    ui.columns(2, |columns| {
        publish_section(&mut columns[0], form, affordances, events);
        subscribe_section(
            &mut columns[1],
            form,
            affordances,
            selected_subscription,
            events,
        );
    });
}

fn publish_section(
    ui: &mut Ui,
    form: &mut Profile,
    affordances: &Affordances,
    events: &mut Vec<SessionEvent>,
) {
    create_frame(UiColors::MAIN_BG, UiColors::BORDER).show(ui, |ui| {
        ui.heading("Publish");
        ui.horizontal(|ui| {
            ui.label("Topic");
            text_field(
                ui,
                &mut form.publish_topic,
                "topic",
                false,
                FieldChange::PublishTopic,
                events,
            );
        });

        let message = TextEdit::multiline(&mut form.publish_message)
            .hint_text("message")
            .desired_rows(4)
            .desired_width(f32::INFINITY);
        if ui.add(message).changed() {
            events.push(SessionEvent::FieldChanged(FieldChange::PublishMessage(
                form.publish_message.clone(),
            )));
        }

        ui.horizontal(|ui| {
            ui.label("QoS");
            ComboBox::from_id_salt("publish_qos")
                .selected_text(form.qos.to_string())
                .show_ui(ui, |ui| {
                    for qos in QosLevel::ALL {
                        let is_selected = qos == form.qos;
                        if ui.selectable_label(is_selected, qos.to_string()).clicked()
                            && !is_selected
                        {
                            events.push(SessionEvent::FieldChanged(FieldChange::Qos(qos)));
                        }
                    }
                });

            if ui.checkbox(&mut form.retained, "Retained").changed() {
                events.push(SessionEvent::FieldChanged(FieldChange::Retained(
                    form.retained,
                )));
            }

            if ui
                .add_enabled(affordances.publish, Button::new("Publish"))
                .clicked()
            {
                events.push(SessionEvent::PublishClicked);
            }
        });
    });
}

fn subscribe_section(
    ui: &mut Ui,
    form: &mut Profile,
    affordances: &Affordances,
    selected_subscription: Option<usize>,
    events: &mut Vec<SessionEvent>,
) {
    create_frame(UiColors::MAIN_BG, UiColors::BORDER).show(ui, |ui| {
        ui.heading("Subscribe");
        ui.horizontal(|ui| {
            ui.label("Topic");
            text_field(
                ui,
                &mut form.subscribe_topic_draft,
                "topic/#",
                false,
                FieldChange::SubscribeTopic,
                events,
            );
        });

        ui.horizontal(|ui| {
            if ui
                .add_enabled(affordances.subscribe, Button::new("Subscribe"))
                .clicked()
            {
                events.push(SessionEvent::SubscribeClicked);
            }
            if ui
                .add_enabled(affordances.unsubscribe, Button::new("Unsubscribe"))
                .clicked()
            {
                events.push(SessionEvent::UnsubscribeClicked);
            }
        });

        create_frame(UiColors::INNER_BG, UiColors::BORDER).show(ui, |ui| {
            ScrollArea::vertical()
                .id_salt("subscribed_topics")
                .max_height(120.0)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    for (index, topic) in form.subscribed_topics().iter().enumerate() {
                        if index == 0 {
                            // sentinel row is a header, clicking it clears the selection
                            let header = Label::new(RichText::new(topic).weak())
                                .sense(eframe::egui::Sense::click());
                            if ui.add(header).clicked() {
                                events.push(SessionEvent::SubscriptionSelected(0));
                            }
                            continue;
                        }
                        let is_selected = selected_subscription == Some(index);
                        if ui.selectable_label(is_selected, topic.as_str()).clicked() {
                            events.push(SessionEvent::SubscriptionSelected(index));
                        }
                    }
                });
        });
    });
}
