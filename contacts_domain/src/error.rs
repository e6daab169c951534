use crate::image_store::ImageStoreError;
use contacts_data::DataError;
use thiserror::Error;

/// Authentication errors. Each variant maps to one user-visible outcome;
/// token library and store errors never leave the gateway unmapped.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username or email already exists")]
    UsernameTaken,

    #[error("Invalid credentials")]
    LoginFailed,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Could not validate credentials")]
    CredentialsInvalid,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Token creation error")]
    TokenCreationError,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Image upload failed: {0}")]
    ImageUpload(#[from] ImageStoreError),

    #[error("Data error: {0}")]
    DataError(#[from] DataError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Contact service errors
#[derive(Debug, Error)]
pub enum ContactError {
    /// Also returned for contacts that belong to another user
    #[error("Contact not found")]
    NotFound,

    #[error("Email already exists")]
    EmailExists,

    #[error("Phone already exists")]
    PhoneExists,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Birthday window must be at most {max} days, got {requested}")]
    InvalidWindow { requested: u32, max: u32 },

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Data error: {0}")]
    DataError(#[from] DataError),
}

/// Why a bounded store call did not produce a value
#[derive(Debug)]
pub(crate) enum StoreFailure {
    Timeout,
    Data(DataError),
}

impl From<StoreFailure> for AuthError {
    fn from(failure: StoreFailure) -> Self {
        match failure {
            StoreFailure::Timeout => AuthError::ServiceUnavailable,
            StoreFailure::Data(e) => AuthError::DataError(e),
        }
    }
}

impl From<StoreFailure> for ContactError {
    fn from(failure: StoreFailure) -> Self {
        match failure {
            StoreFailure::Timeout => ContactError::ServiceUnavailable,
            StoreFailure::Data(DataError::ContactEmailTaken) => ContactError::EmailExists,
            StoreFailure::Data(DataError::ContactPhoneTaken) => ContactError::PhoneExists,
            StoreFailure::Data(e) => ContactError::DataError(e),
        }
    }
}

/// Result type for contact operations
pub type ContactResult<T> = Result<T, ContactError>;
