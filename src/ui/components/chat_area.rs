use chrono::{Local, TimeZone};
use eframe::egui;

use crate::common::MessageState;
use crate::ui::state::AppState;

pub fn render(ui: &mut egui::Ui, state: &AppState, scroll_to_latest: bool) {
    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .max_height(ui.available_height() - 36.0)
        .show(ui, |ui| {
            for entry in state.messages() {
                let message = &entry.message;
                let who = if message.sender_id == state.user_id {
                    "You"
                } else {
                    message.sender_id.as_str()
                };
                let time = message
                    .timestamp
                    .and_then(|ts| Local.timestamp_millis_opt(ts).single())
                    .map(|at| at.format("%H:%M").to_string())
                    .unwrap_or_default();

                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(time).weak().small());
                    let line = format!("{who}: {}", message.text);
                    match entry.state {
                        MessageState::Confirmed => {
                            ui.label(line);
                        }
                        MessageState::Pending => {
                            ui.label(egui::RichText::new(line).italics().weak());
                            if state.is_undelivered(&message.id) {
                                ui.colored_label(egui::Color32::RED, "not delivered");
                            }
                        }
                    }
                });
            }

            if scroll_to_latest {
                ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
            }
        });
}
