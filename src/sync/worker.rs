use futures::StreamExt;
use futures::stream::select_all;
use tokio::sync::mpsc;

use crate::backend::{DocumentStore, Snapshot, Subscription};
use crate::common::types::decode_all;
use crate::common::{Chat, ChatCommand, ChatMessage, ChatSource, SyncEvent};
use crate::error::Result;

use super::client::ChatClient;

/// Owns every live subscription of the signed-in user and bridges them to
/// the chat screen: `ChatCommand`s in, `SyncEvent`s out.
pub struct SyncWorker<S: DocumentStore> {
    client: ChatClient<S>,
    user_id: String,
    event_sender: mpsc::Sender<SyncEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
    open_chat: Option<(String, Subscription)>,
}

impl<S: DocumentStore> SyncWorker<S> {
    pub fn new(
        client: ChatClient<S>,
        user_id: impl Into<String>,
        event_sender: mpsc::Sender<SyncEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
    ) -> Self {
        Self {
            client,
            user_id: user_id.into(),
            event_sender,
            command_receiver,
            open_chat: None,
        }
    }

    /// Runs until the command channel closes or the screen drops its event
    /// receiver. All listeners are released on return.
    pub async fn run(mut self) -> Result<()> {
        let sources = ChatSource::ALL
            .into_iter()
            .map(|source| -> Result<_> {
                let subscription = self.client.subscribe_chat_source(source, &self.user_id)?;
                Ok(subscription.map(move |snapshot| (source, snapshot)))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut chat_sources = select_all(sources);
        log::info!("Sync worker started for user {}", self.user_id);

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => {
                            if !self.handle_command(command).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                Some((source, snapshot)) = chat_sources.next() => {
                    if !self.forward_chat_snapshot(source, snapshot).await {
                        break;
                    }
                }
                Some((chat_id, snapshot)) = next_message_snapshot(&mut self.open_chat) => {
                    if !self.forward_message_snapshot(chat_id, snapshot).await {
                        break;
                    }
                }
            }
        }

        log::info!("Sync worker for user {} stopped", self.user_id);
        Ok(())
    }

    async fn handle_command(&mut self, command: ChatCommand) -> bool {
        match command {
            ChatCommand::OpenChat { chat_id } => {
                // release the previous listener before attaching a new one
                self.open_chat = None;
                match self.client.subscribe_messages(&chat_id) {
                    Ok(subscription) => {
                        log::debug!("Listening to messages of chat {chat_id}");
                        self.open_chat = Some((chat_id, subscription));
                        true
                    }
                    Err(err) => {
                        log::warn!("Cannot listen to chat {chat_id}: {err}");
                        self.emit(SyncEvent::MessagesFailed {
                            chat_id,
                            reason: err.to_string(),
                        })
                        .await
                    }
                }
            }
            ChatCommand::CloseChat => {
                if let Some((chat_id, _)) = self.open_chat.take() {
                    log::debug!("Released message listener of chat {chat_id}");
                }
                true
            }
            ChatCommand::SendMessage { message } => match self.client.send_message(&message) {
                Ok(_) => true,
                Err(err) => {
                    // The pending copy stays on screen; nothing is retried.
                    log::error!(
                        "Failed to send message {} in chat {} (transient: {}): {err}",
                        message.id,
                        message.chat_id,
                        err.is_transient()
                    );
                    self.emit(SyncEvent::SendFailed {
                        temp_id: message.id,
                        reason: err.to_string(),
                    })
                    .await
                }
            },
        }
    }

    async fn forward_chat_snapshot(&mut self, source: ChatSource, snapshot: Snapshot) -> bool {
        let event = match snapshot {
            Ok(docs) => SyncEvent::ChatsUpdated {
                source,
                chats: decode_all(&docs, Chat::from_document),
            },
            Err(err) => {
                log::warn!("Chat source {} errored: {err}", source.as_str());
                SyncEvent::ChatSourceFailed {
                    source,
                    reason: err.to_string(),
                }
            }
        };
        self.emit(event).await
    }

    async fn forward_message_snapshot(&mut self, chat_id: String, snapshot: Snapshot) -> bool {
        let event = match snapshot {
            Ok(docs) => {
                let messages = decode_all(&docs, |doc| ChatMessage::from_document(&chat_id, doc));
                SyncEvent::MessagesUpdated { chat_id, messages }
            }
            Err(err) => {
                log::warn!("Message stream of chat {chat_id} errored: {err}");
                SyncEvent::MessagesFailed {
                    chat_id,
                    reason: err.to_string(),
                }
            }
        };
        self.emit(event).await
    }

    /// False once the screen is gone.
    async fn emit(&mut self, event: SyncEvent) -> bool {
        match self.event_sender.send(event).await {
            Ok(()) => true,
            Err(_) => {
                log::info!("Chat screen closed its event channel");
                false
            }
        }
    }
}

async fn next_message_snapshot(
    open_chat: &mut Option<(String, Subscription)>,
) -> Option<(String, Snapshot)> {
    match open_chat {
        Some((chat_id, subscription)) => {
            let snapshot = subscription.recv().await?;
            Some((chat_id.clone(), snapshot))
        }
        None => std::future::pending().await,
    }
}
