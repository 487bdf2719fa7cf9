use serde::{Serialize, Deserialize};

pub mod error;
pub use error::{ApiError, ApiErrorKind, Detail};

pub mod users;
pub mod auth;
pub mod sec;

/// generic acknowledgement for operations that have nothing else to say
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Message {
            message: message.into()
        }
    }
}
