pub mod commands;
pub mod events;
pub mod types;

pub use commands::ChatCommand;
pub use events::SyncEvent;
pub use types::{Chat, ChatMessage, ChatSource, DisplayMessage, MessageState};
