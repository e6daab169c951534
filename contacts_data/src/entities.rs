//! Database entities for users and their contacts

use bson::oid::ObjectId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// User entity for MongoDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntity {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub confirmed: bool,
    /// The single live refresh token; a new login overwrites it.
    pub refresh_token: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl UserEntity {
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            username,
            email,
            password_hash,
            confirmed: false,
            refresh_token: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Contact entity, always owned by exactly one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactEntity {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub owner_id: ObjectId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: Option<NaiveDate>,
    pub additional_info: Option<String>,
}

impl ContactEntity {
    pub fn from_data(owner_id: ObjectId, data: ContactData) -> Self {
        Self {
            id: None,
            owner_id,
            first_name: data.first_name,
            last_name: data.last_name,
            email: data.email,
            phone_number: data.phone_number,
            birthday: data.birthday,
            additional_info: data.additional_info,
        }
    }

    /// Overwrite every user-editable field, keeping id and owner.
    pub fn apply(&mut self, data: ContactData) {
        self.first_name = data.first_name;
        self.last_name = data.last_name;
        self.email = data.email;
        self.phone_number = data.phone_number;
        self.birthday = data.birthday;
        self.additional_info = data.additional_info;
    }
}

/// Contact fields supplied on create and update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: Option<NaiveDate>,
    pub additional_info: Option<String>,
}
