use chrono::Utc;
use eframe::egui;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::common::{ChatCommand, SyncEvent};
use crate::error::ChatError;

use super::components::{chat_area, chat_list, input_bar};
use super::state::AppState;

pub struct ChatApp {
    state: AppState,
    command_sender: mpsc::Sender<ChatCommand>,
    event_receiver: mpsc::Receiver<SyncEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        state: AppState,
        command_sender: mpsc::Sender<ChatCommand>,
        event_receiver: mpsc::Receiver<SyncEvent>,
    ) -> Self {
        Self {
            state,
            command_sender,
            event_receiver,
        }
    }

    fn handle_sync_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            self.state.apply_event(event);
        }
    }

    fn send_command(&mut self, command: ChatCommand) {
        let (command, err) = match self.command_sender.try_send(command) {
            Ok(()) => return,
            Err(TrySendError::Full(command)) => (command, ChatError::Unavailable),
            Err(TrySendError::Closed(command)) => {
                (command, ChatError::ChannelClosed("sync worker"))
            }
        };
        log::warn!("Failed to send command to sync worker: {err}");
        self.state.command_not_queued(command, err);
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_sync_events();

        let clicked = egui::SidePanel::left("chat_list")
            .min_width(220.0)
            .show(ctx, |ui| {
                chat_list::render(
                    ui,
                    self.state.chats(),
                    &self.state.user_id,
                    self.state.open_chat_id(),
                )
            })
            .inner;
        if let Some(chat_id) = clicked {
            if let Some(command) = self.state.open_chat(&chat_id) {
                self.send_command(command);
            }
        }

        let scroll_to_latest = self.state.take_scroll_request();
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(title) = self.state.open_chat_title() else {
                ui.heading("UTrabajo");
                ui.label("Select a conversation");
                return;
            };

            ui.horizontal(|ui| {
                ui.heading(title);
                if ui.button("Close").clicked() {
                    if let Some(command) = self.state.close_chat() {
                        self.send_command(command);
                    }
                }
            });
            ui.separator();
            chat_area::render(ui, &self.state, scroll_to_latest);

            ui.separator();
            let enabled = self.state.open_chat_id().is_some();
            if let Some(text) = input_bar::render(ui, &mut self.state.input_text, enabled) {
                let now = Utc::now().timestamp_millis();
                if let Some(command) = self.state.submit(&text, now) {
                    self.send_command(command);
                }
            }
        });

        ctx.request_repaint();
    }
}

impl Drop for ChatApp {
    fn drop(&mut self) {
        // Release the message listener before the worker loses its command channel.
        if let Some(command) = self.state.close_chat() {
            let _ = self.command_sender.try_send(command);
        }
    }
}
