use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use contacts_domain::contact_service::DEFAULT_BIRTHDAY_WINDOW_DAYS;
use serde::Deserialize;

use crate::mapper::{ApiError, ContactBody, ContactResponse};
use crate::service::extract::CurrentUser;
use crate::service::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: u64,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct BirthdayParams {
    pub days: Option<u32>,
}

/// `/contacts/*` routes
pub fn contacts_router() -> Router<AppState> {
    Router::new()
        .route("/contacts/", get(list_contacts).post(create_contact))
        .route("/contacts/search/", get(search_contacts))
        .route("/contacts/birthdays/", get(upcoming_birthdays))
        .route(
            "/contacts/:contact_id",
            get(read_contact).put(update_contact).delete(delete_contact),
        )
}

fn to_responses(contacts: Vec<contacts_domain::Contact>) -> Json<Vec<ContactResponse>> {
    Json(contacts.into_iter().map(ContactResponse::from).collect())
}

async fn create_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ContactBody>,
) -> Result<(StatusCode, Json<ContactResponse>), ApiError> {
    let contact = state.contact_service.create(&user, body.into()).await?;
    Ok((StatusCode::CREATED, Json(contact.into())))
}

async fn list_contacts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let contacts = state
        .contact_service
        .list(&user, params.skip, params.limit)
        .await?;
    Ok(to_responses(contacts))
}

async fn read_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(contact_id): Path<String>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = state.contact_service.get(&user, &contact_id).await?;
    Ok(Json(contact.into()))
}

async fn update_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(contact_id): Path<String>,
    Json(body): Json<ContactBody>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = state
        .contact_service
        .update(&user, &contact_id, body.into())
        .await?;
    Ok(Json(contact.into()))
}

async fn delete_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(contact_id): Path<String>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = state.contact_service.delete(&user, &contact_id).await?;
    Ok(Json(contact.into()))
}

async fn search_contacts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let contacts = state.contact_service.search(&user, &params.query).await?;
    Ok(to_responses(contacts))
}

async fn upcoming_birthdays(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<BirthdayParams>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let today = Utc::now().date_naive();
    let days = params.days.unwrap_or(DEFAULT_BIRTHDAY_WINDOW_DAYS);
    let contacts = state
        .contact_service
        .upcoming_birthdays(&user, today, days)
        .await?;
    Ok(to_responses(contacts))
}
