use crate::error::{ContactError, ContactResult};
use crate::mappers::contact_entity_to_contact;
use crate::models::{Contact, User};
use crate::utils::{bounded, is_valid_email, next_birthday};
use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{Duration as ChronoDuration, NaiveDate};
use contacts_data::repositories::ContactRepository;
use contacts_data::DataError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub use contacts_data::entities::ContactData;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_BIRTHDAY_WINDOW_DAYS: u32 = 7;
/// Birthdays repeat yearly, so a longer window matches nothing new
pub const MAX_BIRTHDAY_WINDOW_DAYS: u32 = 366;

/// Contact book operations. Every call is scoped to `owner`; contacts of
/// other users behave as if they did not exist.
#[async_trait]
pub trait ContactService: Send + Sync {
    async fn create(&self, owner: &User, data: ContactData) -> ContactResult<Contact>;

    async fn get(&self, owner: &User, contact_id: &str) -> ContactResult<Contact>;

    /// `limit` defaults to 10 and is clamped to 1..=100
    async fn list(&self, owner: &User, skip: u64, limit: Option<i64>) -> ContactResult<Vec<Contact>>;

    async fn update(
        &self,
        owner: &User,
        contact_id: &str,
        data: ContactData,
    ) -> ContactResult<Contact>;

    async fn delete(&self, owner: &User, contact_id: &str) -> ContactResult<Contact>;

    /// Case-insensitive substring match on first name, last name and email
    async fn search(&self, owner: &User, query: &str) -> ContactResult<Vec<Contact>>;

    /// Contacts whose next birthday falls within `today..=today + days`,
    /// soonest first. `days` above 366 is rejected.
    async fn upcoming_birthdays(
        &self,
        owner: &User,
        today: NaiveDate,
        days: u32,
    ) -> ContactResult<Vec<Contact>>;
}

pub struct ContactServiceImpl {
    contact_repository: Arc<dyn ContactRepository>,
    store_timeout: Duration,
}

impl ContactServiceImpl {
    pub fn new(contact_repository: Arc<dyn ContactRepository>, store_timeout: Duration) -> Self {
        Self {
            contact_repository,
            store_timeout,
        }
    }
}

fn owner_id(owner: &User) -> ContactResult<ObjectId> {
    ObjectId::parse_str(&owner.id).map_err(|_| {
        error!("Authenticated user carries a malformed id: {}", owner.id);
        ContactError::DataError(DataError::InternalError(format!(
            "malformed user id {}",
            owner.id
        )))
    })
}

fn contact_id(id: &str) -> ContactResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| ContactError::NotFound)
}

fn validate(data: &ContactData) -> ContactResult<()> {
    if !is_valid_email(&data.email) {
        return Err(ContactError::InvalidEmail);
    }
    Ok(())
}

fn to_contacts(entities: Vec<contacts_data::entities::ContactEntity>) -> Vec<Contact> {
    entities.into_iter().map(contact_entity_to_contact).collect()
}

#[async_trait]
impl ContactService for ContactServiceImpl {
    async fn create(&self, owner: &User, data: ContactData) -> ContactResult<Contact> {
        validate(&data)?;
        let owner_id = owner_id(owner)?;

        let contact = bounded(
            self.store_timeout,
            self.contact_repository.insert(&owner_id, data),
        )
        .await?;

        info!("User {} created contact {:?}", owner.username, contact.id);
        Ok(contact_entity_to_contact(contact))
    }

    async fn get(&self, owner: &User, contact_id_str: &str) -> ContactResult<Contact> {
        let owner_id = owner_id(owner)?;
        let id = contact_id(contact_id_str)?;

        bounded(self.store_timeout, self.contact_repository.find(&owner_id, &id))
            .await?
            .map(contact_entity_to_contact)
            .ok_or(ContactError::NotFound)
    }

    async fn list(&self, owner: &User, skip: u64, limit: Option<i64>) -> ContactResult<Vec<Contact>> {
        let owner_id = owner_id(owner)?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let contacts = bounded(
            self.store_timeout,
            self.contact_repository.list(&owner_id, skip, limit),
        )
        .await?;
        Ok(to_contacts(contacts))
    }

    async fn update(
        &self,
        owner: &User,
        contact_id_str: &str,
        data: ContactData,
    ) -> ContactResult<Contact> {
        validate(&data)?;
        let owner_id = owner_id(owner)?;
        let id = contact_id(contact_id_str)?;

        bounded(
            self.store_timeout,
            self.contact_repository.update(&owner_id, &id, data),
        )
        .await?
        .map(contact_entity_to_contact)
        .ok_or(ContactError::NotFound)
    }

    async fn delete(&self, owner: &User, contact_id_str: &str) -> ContactResult<Contact> {
        let owner_id = owner_id(owner)?;
        let id = contact_id(contact_id_str)?;

        let removed = bounded(self.store_timeout, self.contact_repository.delete(&owner_id, &id))
            .await?
            .ok_or(ContactError::NotFound)?;

        info!("User {} deleted contact {}", owner.username, contact_id_str);
        Ok(contact_entity_to_contact(removed))
    }

    async fn search(&self, owner: &User, query: &str) -> ContactResult<Vec<Contact>> {
        let owner_id = owner_id(owner)?;
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let contacts = bounded(
            self.store_timeout,
            self.contact_repository.search(&owner_id, query),
        )
        .await?;
        Ok(to_contacts(contacts))
    }

    async fn upcoming_birthdays(
        &self,
        owner: &User,
        today: NaiveDate,
        days: u32,
    ) -> ContactResult<Vec<Contact>> {
        if days > MAX_BIRTHDAY_WINDOW_DAYS {
            return Err(ContactError::InvalidWindow {
                requested: days,
                max: MAX_BIRTHDAY_WINDOW_DAYS,
            });
        }
        let owner_id = owner_id(owner)?;
        let last_day = today
            .checked_add_signed(ChronoDuration::days(i64::from(days)))
            .unwrap_or(NaiveDate::MAX);

        let contacts = bounded(
            self.store_timeout,
            self.contact_repository.with_birthdays(&owner_id),
        )
        .await?;

        let mut upcoming: Vec<(NaiveDate, Contact)> = contacts
            .into_iter()
            .filter_map(|contact| {
                let next = next_birthday(contact.birthday?, today)?;
                (next <= last_day).then(|| (next, contact_entity_to_contact(contact)))
            })
            .collect();
        upcoming.sort_by_key(|(next, _)| *next);

        Ok(upcoming.into_iter().map(|(_, contact)| contact).collect())
    }
}
