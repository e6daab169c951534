use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Form, Json, Router};
use contacts_domain::models::{ConfirmationOutcome, RequestEmailOutcome, SignupData};
use tracing::info;

use crate::mapper::{
    ApiError, LoginForm, MessageResponse, RequestEmailBody, SignupRequest, SignupResponse,
    TokenResponse, UserResponse,
};
use crate::service::extract::{base_url, BearerToken, CurrentUser};
use crate::service::AppState;

/// `/users/*` routes
pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(signup))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/avatar", patch(update_avatar))
        .route("/users/me", get(me))
}

/// `/auth/*` routes
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/refresh_token", post(refresh_token))
        .route("/auth/confirmed_email/:token", get(confirmed_email))
        .route("/auth/request_email", post(request_email))
}

async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let data = SignupData {
        username: req.username,
        email: req.email,
        password: req.password,
    };

    let user = state
        .auth_service
        .signup(data, &base_url(state.public_base_url.as_deref(), &headers))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user: user.into(),
            detail: "User successfully created. Check your email for confirmation.".to_string(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let pair = state
        .auth_service
        .login(&form.username, &form.password)
        .await?;
    Ok(Json(pair.into()))
}

async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth_service.logout(&token).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

async fn update_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?;

        let updated = state
            .auth_service
            .update_avatar(&user, &bytes, &content_type)
            .await?;
        info!("Avatar updated for {}", updated.username);
        return Ok(Json(updated.into()));
    }

    Err(ApiError::BadRequest("Missing file field".to_string()))
}

async fn refresh_token(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let pair = state.auth_service.refresh(&token).await?;
    Ok((StatusCode::CREATED, Json(pair.into())))
}

async fn confirmed_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = match state.auth_service.confirm_email(&token).await? {
        ConfirmationOutcome::Confirmed => "Email confirmed",
        ConfirmationOutcome::AlreadyConfirmed => "Your email is already confirmed",
    };
    Ok(Json(MessageResponse::new(message)))
}

async fn request_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RequestEmailBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = match state
        .auth_service
        .request_email(&body.email, &base_url(state.public_base_url.as_deref(), &headers))
        .await?
    {
        RequestEmailOutcome::Sent => "Check your email for confirmation.",
        RequestEmailOutcome::AlreadyConfirmed => "Your email is already confirmed",
    };
    Ok(Json(MessageResponse::new(message)))
}
