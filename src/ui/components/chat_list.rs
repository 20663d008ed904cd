use chrono::{TimeZone, Utc};
use eframe::egui;

use crate::common::Chat;

/// Render the merged chat list; returns the chat the user clicked.
pub fn render(
    ui: &mut egui::Ui,
    chats: &[Chat],
    user_id: &str,
    open_chat: Option<&str>,
) -> Option<String> {
    ui.heading("Chats");
    ui.separator();

    if chats.is_empty() {
        ui.label("No conversations yet");
        return None;
    }

    let mut clicked = None;
    egui::ScrollArea::vertical().show(ui, |ui| {
        for chat in chats {
            let title = chat
                .job_title
                .as_deref()
                .or_else(|| chat.counterpart(user_id))
                .unwrap_or("Chat");
            let selected = open_chat == Some(chat.id.as_str());

            if ui.selectable_label(selected, title).clicked() {
                clicked = Some(chat.id.clone());
            }

            ui.horizontal(|ui| {
                if let Some(last) = &chat.last_message {
                    ui.label(egui::RichText::new(last).weak());
                }
                let when = chat.effective_timestamp();
                if when > 0 {
                    ui.label(egui::RichText::new(format_age(when)).weak().small());
                }
            });
            ui.add_space(4.0);
        }
    });

    clicked
}

fn format_age(timestamp_ms: i64) -> String {
    let Some(at) = Utc.timestamp_millis_opt(timestamp_ms).single() else {
        return String::new();
    };
    let seconds = Utc::now().signed_duration_since(at).num_seconds();
    match seconds {
        s if s < 60 => "(just now)".to_string(),
        s if s < 3_600 => format!("({}m)", s / 60),
        s if s < 86_400 => format!("({}h)", s / 3_600),
        _ => at.format("(%d/%m)").to_string(),
    }
}
