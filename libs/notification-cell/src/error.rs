use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Appointment fetch failed: {0}")]
    Fetch(String),

    #[error("Read-state operation failed: {0}")]
    ReadState(String),

    #[error("Redis connection error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Invalid notification key '{0}'")]
    InvalidKey(String),

    #[error("Cannot scope notifications: {0}")]
    InvalidViewer(String),
}

impl From<NotificationError> for AppError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::InvalidKey(_) | NotificationError::InvalidViewer(_) => {
                AppError::BadRequest(e.to_string())
            }
            NotificationError::Fetch(_) => AppError::Internal(e.to_string()),
            NotificationError::ReadState(_) | NotificationError::Redis(_) => AppError::Database(e.to_string()),
        }
    }
}
