use thiserror::Error;

/// Errors raised by the document store and the chat sync layer.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid {collection} record `{id}`: {reason}")]
    InvalidRecord {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("permission denied on `{0}`")]
    PermissionDenied(String),

    #[error("backend unavailable")]
    Unavailable,

    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),
}

pub type Result<T> = std::result::Result<T, ChatError>;

impl ChatError {
    /// Whether a retry could succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChatError::Unavailable)
    }
}
