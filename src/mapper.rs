use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use contacts_domain::contact_service::ContactData;
use contacts_domain::image_store::ImageStoreError;
use contacts_domain::models::TokenPair;
use contacts_domain::{AuthError, Contact, ContactError, User};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestEmailBody {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub confirmed: bool,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            confirmed: user.confirmed,
            avatar: user.avatar_url,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub user: UserResponse,
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContactBody {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: Option<NaiveDate>,
    pub additional_info: Option<String>,
}

impl From<ContactBody> for ContactData {
    fn from(body: ContactBody) -> Self {
        ContactData {
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            phone_number: body.phone_number,
            birthday: body.birthday,
            additional_info: body.additional_info,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ContactResponse {
    pub id: String,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: Option<NaiveDate>,
    pub additional_info: Option<String>,
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        Self {
            id: contact.id,
            user_id: contact.owner_id,
            first_name: contact.first_name,
            last_name: contact.last_name,
            email: contact.email,
            phone_number: contact.phone_number,
            birthday: contact.birthday,
            additional_info: contact.additional_info,
        }
    }
}

/// Error returned by every handler
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    Contact(ContactError),
    MissingToken,
    BadRequest(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<ContactError> for ApiError {
    fn from(err: ContactError) -> Self {
        ApiError::Contact(err)
    }
}

const INTERNAL: &str = "Internal Server Error";

fn auth_status(err: &AuthError) -> (StatusCode, String) {
    match err {
        // 409 Conflict
        AuthError::UsernameTaken => (StatusCode::CONFLICT, "User or email already exist".into()),
        AuthError::LoginFailed => (StatusCode::CONFLICT, "Invalid credentials".into()),

        // 401 Unauthorized
        AuthError::InvalidRefreshToken => {
            (StatusCode::UNAUTHORIZED, "Invalid refresh token".into())
        }
        AuthError::CredentialsInvalid => (
            StatusCode::UNAUTHORIZED,
            "Could not validate credentials".into(),
        ),

        // 400 / 422 invalid input
        AuthError::InvalidToken => (StatusCode::BAD_REQUEST, "Verification error".into()),
        AuthError::InvalidEmail => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid email address".into(),
        ),
        AuthError::ImageUpload(ImageStoreError::UnsupportedType(kind)) => (
            StatusCode::BAD_REQUEST,
            format!("Unsupported image type: {}", kind),
        ),
        AuthError::ImageUpload(ImageStoreError::Empty) => {
            (StatusCode::BAD_REQUEST, "Image is empty".into())
        }

        // 503
        AuthError::ServiceUnavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable".into(),
        ),

        // 500 catch-all
        AuthError::ImageUpload(ImageStoreError::Io(_))
        | AuthError::TokenCreationError
        | AuthError::DataError(_)
        | AuthError::InternalError(_) => {
            error!("Request failed: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.into())
        }
    }
}

fn contact_status(err: &ContactError) -> (StatusCode, String) {
    match err {
        ContactError::NotFound => (StatusCode::NOT_FOUND, "Contact not found".into()),
        ContactError::EmailExists => (StatusCode::BAD_REQUEST, "Email already exists".into()),
        ContactError::PhoneExists => (StatusCode::BAD_REQUEST, "Phone already exists".into()),
        ContactError::InvalidEmail => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid email address".into(),
        ),
        ContactError::InvalidWindow { .. } => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        ContactError::ServiceUnavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable".into(),
        ),
        ContactError::DataError(_) => {
            error!("Request failed: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.into())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Auth(err) => auth_status(err),
            ApiError::Contact(err) => contact_status(err),
            ApiError::MissingToken => (StatusCode::UNAUTHORIZED, "Not authenticated".into()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
