use crate::error::AuthError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Scope tag carried by every token. A token is only accepted by the
/// operation whose scope it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum TokenScope {
    #[serde(rename = "access_token")]
    #[strum(serialize = "access_token")]
    Access,
    #[serde(rename = "refresh_token")]
    #[strum(serialize = "refresh_token")]
    Refresh,
    #[serde(rename = "email_token")]
    #[strum(serialize = "email_token")]
    Email,
}

/// Claims for every token kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,        // User email
    pub iat: i64,           // Issued at
    pub exp: i64,           // Expiration
    pub scope: TokenScope,
    pub jti: String,        // Unique token identifier
}

/// Access and refresh token issued together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signup input
#[derive(Debug, Clone)]
pub struct SignupData {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    AlreadyConfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEmailOutcome {
    Sent,
    AlreadyConfirmed,
}

pub type AuthResult<T> = Result<T, AuthError>;

/// User snapshot handed to callers and kept in the session cache.
/// Carries neither the password hash nor the refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub confirmed: bool,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: String,
    pub owner_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: Option<NaiveDate>,
    pub additional_info: Option<String>,
}
