use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("{service}#{action} failed: {message}")]
    Action {
        service: String,
        action: String,
        message: String,
    },
    #[error("Nothing is playing")]
    NothingPlaying,
    #[error("Playlist not found: {0}")]
    PlaylistNotFound(String),
    #[error("Favorite not found: {0}")]
    FavoriteNotFound(String),
    #[error("Invalid name '{0}'")]
    InvalidName(String),
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),
    #[error("Playback session has been disposed")]
    Disposed,
    #[error("Persistence error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlaybackError {
    pub fn action(service: &str, action: &str, message: impl Into<String>) -> Self {
        PlaybackError::Action {
            service: service.to_string(),
            action: action.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
