use crate::models::{Contact, User};
use contacts_data::entities::{ContactEntity, UserEntity};

pub fn user_entity_to_user(user: UserEntity) -> User {
    User {
        id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        username: user.username,
        email: user.email,
        confirmed: user.confirmed,
        avatar_url: user.avatar_url,
        created_at: user.created_at,
    }
}

pub fn contact_entity_to_contact(contact: ContactEntity) -> Contact {
    Contact {
        id: contact.id.map(|id| id.to_hex()).unwrap_or_default(),
        owner_id: contact.owner_id.to_hex(),
        first_name: contact.first_name,
        last_name: contact.last_name,
        email: contact.email,
        phone_number: contact.phone_number,
        birthday: contact.birthday,
        additional_info: contact.additional_info,
    }
}
