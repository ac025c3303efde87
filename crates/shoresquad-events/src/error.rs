//! Event-specific error types.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EventError {
    #[error("Event not found: {0}")]
    EventNotFound(u32),

    #[error("Event is full: {title}")]
    EventFull { id: u32, title: String },

    #[error("Invalid share origin: {0}")]
    InvalidOrigin(String),
}

impl EventError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::EventNotFound(_) => "Event not found".to_string(),
            Self::EventFull { .. } => "Sorry, this event is already full!".to_string(),
            Self::InvalidOrigin(_) => "Unable to build a share link for this event.".to_string(),
        }
    }
}

impl From<EventError> for shoresquad_core::AppError {
    fn from(err: EventError) -> Self {
        shoresquad_core::AppError::Service(err.to_string())
    }
}
