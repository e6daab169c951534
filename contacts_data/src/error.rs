use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

pub type DataResult<T> = Result<T, DataError>;

/// MongoDB server code for a unique index violation
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Username already taken")]
    UsernameTaken,

    #[error("Email already taken")]
    EmailTaken,

    #[error("Contact email already exists")]
    ContactEmailTaken,

    #[error("Contact phone already exists")]
    ContactPhoneTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("MongoDB error: {0}")]
    MongoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<mongodb::error::Error> for DataError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::MongoError(err.to_string())
    }
}

impl From<bson::ser::Error> for DataError {
    fn from(err: bson::ser::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<bson::de::Error> for DataError {
    fn from(err: bson::de::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Returns the server message when `err` is a duplicate key violation.
pub(crate) fn duplicate_key_message(err: &mongodb::error::Error) -> Option<&str> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE =>
        {
            Some(write_error.message.as_str())
        }
        _ => None,
    }
}
