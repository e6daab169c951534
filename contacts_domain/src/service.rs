use crate::error::{AuthError, StoreFailure};
use crate::hashing_service::HashingService;
use crate::image_store::ImageStore;
use crate::mappers::user_entity_to_user;
use crate::models::{
    AuthResult, ConfirmationOutcome, RequestEmailOutcome, SignupData, TokenPair, TokenScope, User,
};
use crate::notification::NotificationDispatcher;
use crate::session_cache::SessionCache;
use crate::utils::{bounded, is_valid_email};
use crate::TokenService;
use async_trait::async_trait;
use contacts_data::entities::UserEntity;
use contacts_data::repositories::UserRepository;
use contacts_data::DataError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Auth service trait defining authentication operations
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new, unconfirmed user and queue the confirmation email
    async fn signup(&self, data: SignupData, base_url: &str) -> AuthResult<User>;

    /// Log in a confirmed user. Replaces any previously stored refresh token.
    async fn login(&self, username: &str, password: &str) -> AuthResult<TokenPair>;

    /// Exchange a refresh token for a new access token
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair>;

    /// Confirm an email address with an email-scoped token
    async fn confirm_email(&self, token: &str) -> AuthResult<ConfirmationOutcome>;

    /// Queue another confirmation email
    async fn request_email(&self, email: &str, base_url: &str) -> AuthResult<RequestEmailOutcome>;

    /// Resolve an access token to a user
    async fn authenticate(&self, access_token: &str) -> AuthResult<User>;

    /// Drop the stored refresh token of the token's owner
    async fn logout(&self, access_token: &str) -> AuthResult<()>;

    /// Upload a new avatar for `user`
    async fn update_avatar(
        &self,
        user: &User,
        image: &[u8],
        content_type: &str,
    ) -> AuthResult<User>;
}

/// Implementation of AuthService
pub struct AuthServiceImpl {
    user_repository: Arc<dyn UserRepository>,
    token_service: Arc<dyn TokenService>,
    hashing_service: Arc<dyn HashingService>,
    session_cache: SessionCache,
    dispatcher: Arc<dyn NotificationDispatcher>,
    image_store: Arc<dyn ImageStore>,
    store_timeout: Duration,
}

impl AuthServiceImpl {
    /// Create a new auth service instance
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        token_service: Arc<dyn TokenService>,
        hashing_service: Arc<dyn HashingService>,
        session_cache: SessionCache,
        dispatcher: Arc<dyn NotificationDispatcher>,
        image_store: Arc<dyn ImageStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            user_repository,
            token_service,
            hashing_service,
            session_cache,
            dispatcher,
            image_store,
            store_timeout,
        }
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserEntity>> {
        bounded(self.store_timeout, self.user_repository.find_by_email(email))
            .await
            .map_err(|e| {
                error!("Failed to find user by email: {:?}", e);
                e.into()
            })
    }

    async fn set_refresh_token(&self, email: &str, token: Option<&str>) -> AuthResult<()> {
        bounded(
            self.store_timeout,
            self.user_repository.set_refresh_token(email, token),
        )
        .await
        .map_err(|e| {
            error!("Failed to update refresh token: {:?}", e);
            e.into()
        })
    }

    fn queue_confirmation(&self, email: &str, username: &str, base_url: &str) {
        if let Err(e) = self
            .dispatcher
            .enqueue_confirmation_email(email, username, base_url)
        {
            warn!("Confirmation email for {} not queued: {}", email, e);
        }
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn signup(&self, data: SignupData, base_url: &str) -> AuthResult<User> {
        if !is_valid_email(&data.email) {
            return Err(AuthError::InvalidEmail);
        }

        let username_exists = bounded(
            self.store_timeout,
            self.user_repository.username_exists(&data.username),
        )
        .await?;
        let email_exists = bounded(
            self.store_timeout,
            self.user_repository.email_exists(&data.email),
        )
        .await?;
        if username_exists || email_exists {
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = self.hashing_service.hash_password(&data.password)?;
        let user = UserEntity::new(data.username, data.email, password_hash);

        // a concurrent signup can still win the race; the unique index decides
        let user = match bounded(self.store_timeout, self.user_repository.insert(user)).await {
            Ok(user) => user,
            Err(StoreFailure::Data(DataError::UsernameTaken | DataError::EmailTaken)) => {
                return Err(AuthError::UsernameTaken)
            }
            Err(e) => {
                error!("Failed to create user: {:?}", e);
                return Err(e.into());
            }
        };

        info!("User {} signed up", user.username);
        self.queue_confirmation(&user.email, &user.username, base_url);

        Ok(user_entity_to_user(user))
    }

    async fn login(&self, username: &str, password: &str) -> AuthResult<TokenPair> {
        let user = bounded(
            self.store_timeout,
            self.user_repository.find_by_username(username),
        )
        .await
        .map_err(|e| {
            error!("Failed to find user by username: {:?}", e);
            AuthError::from(e)
        })?
        .ok_or(AuthError::LoginFailed)?;

        if !user.confirmed {
            return Err(AuthError::LoginFailed);
        }

        if !self.hashing_service.verify(password, &user.password_hash) {
            return Err(AuthError::LoginFailed);
        }

        let access_token = self.token_service.create_access_token(&user.email)?;
        let refresh_token = self.token_service.create_refresh_token(&user.email)?;

        self.set_refresh_token(&user.email, Some(&refresh_token))
            .await?;

        info!("User {} logged in", user.username);
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let email = self
            .token_service
            .validate(refresh_token, TokenScope::Refresh)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let user = self
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if user.refresh_token.as_deref() != Some(refresh_token) {
            // a rotated or revoked token was replayed: end the session
            warn!("Stale refresh token presented for {}; clearing session", email);
            self.set_refresh_token(&email, None).await?;
            return Err(AuthError::InvalidRefreshToken);
        }

        let access_token = self.token_service.create_access_token(&email)?;
        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.to_string(),
        })
    }

    async fn confirm_email(&self, token: &str) -> AuthResult<ConfirmationOutcome> {
        let email = self.token_service.validate(token, TokenScope::Email)?;

        let user = self
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if user.confirmed {
            return Ok(ConfirmationOutcome::AlreadyConfirmed);
        }

        let changed = bounded(self.store_timeout, self.user_repository.mark_confirmed(&email))
            .await
            .map_err(|e| {
                error!("Failed to confirm email: {:?}", e);
                AuthError::from(e)
            })?;
        self.session_cache.invalidate(&email).await;

        if changed {
            info!("Email confirmed for {}", email);
            Ok(ConfirmationOutcome::Confirmed)
        } else {
            Ok(ConfirmationOutcome::AlreadyConfirmed)
        }
    }

    async fn request_email(&self, email: &str, base_url: &str) -> AuthResult<RequestEmailOutcome> {
        match self.find_by_email(email).await? {
            Some(user) if user.confirmed => Ok(RequestEmailOutcome::AlreadyConfirmed),
            Some(user) => {
                self.queue_confirmation(&user.email, &user.username, base_url);
                Ok(RequestEmailOutcome::Sent)
            }
            // same answer as for a real account
            None => Ok(RequestEmailOutcome::Sent),
        }
    }

    async fn authenticate(&self, access_token: &str) -> AuthResult<User> {
        let email = self
            .token_service
            .validate(access_token, TokenScope::Access)
            .map_err(|_| AuthError::CredentialsInvalid)?;

        let user = self
            .session_cache
            .get_or_load(&email, || async {
                let user = self.find_by_email(&email).await?;
                Ok::<_, AuthError>(user.map(user_entity_to_user))
            })
            .await?;

        user.ok_or(AuthError::CredentialsInvalid)
    }

    async fn logout(&self, access_token: &str) -> AuthResult<()> {
        let user = self.authenticate(access_token).await?;
        self.set_refresh_token(&user.email, None).await?;
        info!("User {} logged out", user.username);
        Ok(())
    }

    async fn update_avatar(
        &self,
        user: &User,
        image: &[u8],
        content_type: &str,
    ) -> AuthResult<User> {
        let public_id = format!("avatar_{}", user.id);
        let avatar_url = self
            .image_store
            .upload(image, &public_id, content_type)
            .await?;

        bounded(
            self.store_timeout,
            self.user_repository.set_avatar(&user.email, &avatar_url),
        )
        .await
        .map_err(|e| {
            error!("Failed to store avatar: {:?}", e);
            AuthError::from(e)
        })?;
        self.session_cache.invalidate(&user.email).await;

        Ok(User {
            avatar_url: Some(avatar_url),
            ..user.clone()
        })
    }
}
