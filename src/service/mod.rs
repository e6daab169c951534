pub mod auth_service;
pub mod contact_service;
pub mod extract;

use axum::Router;
use contacts_domain::{AuthService, ContactService};
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthService>,
    pub contact_service: Arc<dyn ContactService>,
    /// Externally visible URL for links in outgoing mail
    pub public_base_url: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        contact_service: Arc<dyn ContactService>,
    ) -> Self {
        Self {
            auth_service,
            contact_service,
            public_base_url: None,
        }
    }

    pub fn with_public_base_url(mut self, url: Option<String>) -> Self {
        self.public_base_url = url.map(Arc::from);
        self
    }
}

/// Every API route, without transport layers
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(auth_service::users_router())
        .merge(auth_service::auth_router())
        .merge(contact_service::contacts_router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use contacts_data::memory::{
        InMemoryContactRepository, InMemoryUserRepository, StalledUserRepository,
    };
    use contacts_data::{MemoryCacheStore, UserRepository};
    use contacts_domain::hashing_service::BcryptHashingService;
    use contacts_domain::image_store::FsImageStore;
    use contacts_domain::notification::{MailError, NotificationDispatcher};
    use contacts_domain::session_cache::{SessionCache, DEFAULT_SESSION_TTL};
    use contacts_domain::token_service::{JwtTokenService, TokenConfig};
    use contacts_domain::{AuthServiceImpl, ContactServiceImpl, TokenService};
    use jsonwebtoken::Algorithm;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingDispatcher {
        base_urls: Mutex<Vec<String>>,
    }

    impl NotificationDispatcher for RecordingDispatcher {
        fn enqueue_confirmation_email(
            &self,
            _to: &str,
            _username: &str,
            base_url: &str,
        ) -> Result<(), MailError> {
            self.base_urls.lock().unwrap().push(base_url.to_string());
            Ok(())
        }
    }

    struct TestApp {
        app: Router,
        tokens: Arc<JwtTokenService>,
        mail: Arc<RecordingDispatcher>,
        _avatars: tempfile::TempDir,
    }

    fn test_app() -> TestApp {
        test_app_with(Arc::new(InMemoryUserRepository::new()), None)
    }

    fn test_app_with(users: Arc<dyn UserRepository>, public_base_url: Option<&str>) -> TestApp {
        let avatars = tempfile::tempdir().unwrap();
        let tokens = Arc::new(JwtTokenService::new(TokenConfig::new(
            "0123456789abcdef0123456789abcdef".to_owned(),
            Algorithm::HS256,
        )));
        let mail = Arc::new(RecordingDispatcher::default());
        let store_timeout = Duration::from_millis(200);

        let auth_service = AuthServiceImpl::new(
            users,
            tokens.clone(),
            Arc::new(BcryptHashingService::new(4)),
            SessionCache::new(
                Arc::new(MemoryCacheStore::new()),
                DEFAULT_SESSION_TTL,
                Duration::from_millis(100),
            ),
            mail.clone(),
            Arc::new(FsImageStore::new(avatars.path(), "/avatars")),
            store_timeout,
        );
        let contact_service =
            ContactServiceImpl::new(Arc::new(InMemoryContactRepository::new()), store_timeout);

        let state = AppState::new(Arc::new(auth_service), Arc::new(contact_service))
            .with_public_base_url(public_base_url.map(str::to_string));
        TestApp {
            app: router(state),
            tokens,
            mail,
            _avatars: avatars,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn login_request(username: &str, password: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/users/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!(
                "username={}&password={}",
                username, password
            )))
            .unwrap()
    }

    async fn signup(app: &Router, username: &str) -> Response {
        let body = json!({
            "username": username,
            "email": format!("{}@x.com", username),
            "password": "pw123",
        });
        send(app, json_request("POST", "/users/signup", None, body)).await
    }

    /// Sign up, confirm and log in; returns the token response body
    async fn logged_in(test: &TestApp, username: &str) -> Value {
        assert_eq!(signup(&test.app, username).await.status(), StatusCode::CREATED);
        let token = test
            .tokens
            .create_email_token(&format!("{}@x.com", username))
            .unwrap();
        let confirm = Request::builder()
            .uri(format!("/auth/confirmed_email/{}", token))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&test.app, confirm).await.status(), StatusCode::OK);

        let response = send(&test.app, login_request(username, "pw123")).await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    #[tokio::test]
    async fn test_signup_confirm_login_refresh_flow() {
        let test = test_app();

        let response = signup(&test.app, "alice").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["user"]["username"], "alice");
        assert_eq!(body["user"]["confirmed"], false);

        let response = send(&test.app, login_request("alice", "pw123")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let token = test.tokens.create_email_token("alice@x.com").unwrap();
        let confirm = Request::builder()
            .uri(format!("/auth/confirmed_email/{}", token))
            .body(Body::empty())
            .unwrap();
        let response = send(&test.app, confirm).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Email confirmed");

        let response = send(&test.app, login_request("alice", "pw123")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let tokens = body_json(response).await;
        assert_eq!(tokens["token_type"], "bearer");
        let access = tokens["access_token"].as_str().unwrap().to_string();
        let refresh = tokens["refresh_token"].as_str().unwrap().to_string();
        assert_ne!(access, refresh);

        let response = send(&test.app, get_request("/users/me", &access)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["email"], "alice@x.com");

        let refresh_request = Request::builder()
            .method("POST")
            .uri("/auth/refresh_token")
            .header(header::AUTHORIZATION, format!("Bearer {}", refresh))
            .body(Body::empty())
            .unwrap();
        let response = send(&test.app, refresh_request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let refreshed = body_json(response).await;
        assert_ne!(refreshed["access_token"], tokens["access_token"]);
        assert_eq!(refreshed["refresh_token"], tokens["refresh_token"]);
    }

    #[tokio::test]
    async fn test_signup_conflicts_and_invalid_email() {
        let test = test_app();
        assert_eq!(signup(&test.app, "alice").await.status(), StatusCode::CREATED);
        assert_eq!(signup(&test.app, "alice").await.status(), StatusCode::CONFLICT);

        let body = json!({"username": "bob", "email": "bob", "password": "pw"});
        let response = send(&test.app, json_request("POST", "/users/signup", None, body)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_protected_routes_require_access_token() {
        let test = test_app();
        let tokens = logged_in(&test, "alice").await;

        let response = send(
            &test.app,
            Request::builder().uri("/users/me").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let refresh = tokens["refresh_token"].as_str().unwrap();
        let response = send(&test.app, get_request("/users/me", refresh)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&test.app, get_request("/contacts/", "garbage")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let test = test_app();
        let tokens = logged_in(&test, "alice").await;
        let access = tokens["access_token"].as_str().unwrap();
        let refresh = tokens["refresh_token"].as_str().unwrap();

        let logout = Request::builder()
            .method("POST")
            .uri("/users/logout")
            .header(header::AUTHORIZATION, format!("Bearer {}", access))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&test.app, logout).await.status(), StatusCode::OK);

        let refresh_request = Request::builder()
            .method("POST")
            .uri("/auth/refresh_token")
            .header(header::AUTHORIZATION, format!("Bearer {}", refresh))
            .body(Body::empty())
            .unwrap();
        let response = send(&test.app, refresh_request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_confirm_with_bad_token_is_bad_request() {
        let test = test_app();
        let request = Request::builder()
            .uri("/auth/confirmed_email/not-a-token")
            .body(Body::empty())
            .unwrap();
        let response = send(&test.app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["detail"], "Verification error");
    }

    #[tokio::test]
    async fn test_request_email() {
        let test = test_app();
        signup(&test.app, "alice").await;

        let body = json!({"email": "alice@x.com"});
        let response = send(&test.app, json_request("POST", "/auth/request_email", None, body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["message"],
            "Check your email for confirmation."
        );
    }

    #[tokio::test]
    async fn test_contact_crud_is_owner_scoped() {
        let test = test_app();
        let alice = logged_in(&test, "alice").await;
        let bob = logged_in(&test, "bob").await;
        let alice_token = alice["access_token"].as_str().unwrap();
        let bob_token = bob["access_token"].as_str().unwrap();

        let contact = json!({
            "first_name": "John",
            "last_name": "Doe",
            "email": "john@x.com",
            "phone_number": "+100",
            "birthday": "1990-05-17",
        });
        let response = send(
            &test.app,
            json_request("POST", "/contacts/", Some(alice_token), contact.clone()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["birthday"], "1990-05-17");

        let response = send(
            &test.app,
            json_request("POST", "/contacts/", Some(alice_token), contact),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["detail"], "Email already exists");

        let uri = format!("/contacts/{}", id);
        let response = send(&test.app, get_request(&uri, alice_token)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&test.app, get_request(&uri, bob_token)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&test.app, get_request("/contacts/", bob_token)).await;
        assert_eq!(body_json(response).await, json!([]));

        let response = send(&test.app, get_request("/contacts/search/?query=JOHN", alice_token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

        let update = json!({
            "first_name": "Johnny",
            "last_name": "Doe",
            "email": "john@x.com",
            "phone_number": "+100",
        });
        let response = send(&test.app, json_request("PUT", &uri, Some(alice_token), update)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["first_name"], "Johnny");
        assert_eq!(updated["birthday"], Value::Null);

        let delete = Request::builder()
            .method("DELETE")
            .uri(&uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", alice_token))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&test.app, delete).await.status(), StatusCode::OK);

        let response = send(&test.app, get_request(&uri, alice_token)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&test.app, get_request("/contacts/birthdays/", alice_token)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_avatar_upload() {
        let test = test_app();
        let tokens = logged_in(&test, "alice").await;
        let access = tokens["access_token"].as_str().unwrap();

        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"me.png\"\r\n\
             Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method("PATCH")
            .uri("/users/avatar")
            .header(header::AUTHORIZATION, format!("Bearer {}", access))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let response = send(&test.app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let user = body_json(response).await;
        let avatar = user["avatar"].as_str().unwrap();
        assert!(avatar.starts_with("/avatars/avatar_"));
        assert!(avatar.ends_with(".png"));

        let response = send(&test.app, get_request("/users/me", access)).await;
        assert_eq!(body_json(response).await["avatar"], avatar);
    }

    #[tokio::test]
    async fn test_birthday_window_out_of_range() {
        let test = test_app();
        let tokens = logged_in(&test, "alice").await;
        let access = tokens["access_token"].as_str().unwrap();

        let response = send(
            &test.app,
            get_request("/contacts/birthdays/?days=4294967295", access),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = send(&test.app, get_request("/contacts/birthdays/?days=366", access)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stalled_user_store_is_service_unavailable() {
        let test = test_app_with(Arc::new(StalledUserRepository::new()), None);

        let response = send(&test.app, login_request("alice", "pw123")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let access = test.tokens.create_access_token("alice@x.com").unwrap();
        let response = send(&test.app, get_request("/users/me", &access)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_confirmation_links_use_public_base_url() {
        let test = test_app_with(
            Arc::new(InMemoryUserRepository::new()),
            Some("https://contacts.example.com"),
        );
        let request = Request::builder()
            .method("POST")
            .uri("/users/signup")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::HOST, "evil.example.net")
            .body(Body::from(
                json!({"username": "alice", "email": "alice@x.com", "password": "pw123"})
                    .to_string(),
            ))
            .unwrap();
        assert_eq!(send(&test.app, request).await.status(), StatusCode::CREATED);

        assert_eq!(
            *test.mail.base_urls.lock().unwrap(),
            vec!["https://contacts.example.com/".to_string()]
        );

        let fallback = test_app();
        assert_eq!(signup(&fallback.app, "alice").await.status(), StatusCode::CREATED);
        let request = Request::builder()
            .method("POST")
            .uri("/auth/request_email")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::HOST, "api.local:8000")
            .body(Body::from(json!({"email": "alice@x.com"}).to_string()))
            .unwrap();
        assert_eq!(send(&fallback.app, request).await.status(), StatusCode::OK);
        assert_eq!(
            fallback.mail.base_urls.lock().unwrap().last().cloned(),
            Some("http://api.local:8000/".to_string())
        );
    }
}
