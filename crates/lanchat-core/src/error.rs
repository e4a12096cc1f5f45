use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("preferences error: {0}")]
    Preferences(String),

    #[error("peer directory error: {0}")]
    Directory(String),

    #[error("attachment error: {0}")]
    Attachment(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
