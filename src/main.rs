use anyhow::{Context, Result};
use contacts_api::{router, AppState, Config};
use contacts_data::{MongoCacheStore, MongoContactRepository, MongoUserRepository};
use contacts_domain::hashing_service::BcryptHashingService;
use contacts_domain::image_store::FsImageStore;
use contacts_domain::notification::{LogMailSender, MailQueue, MailQueueConfig};
use contacts_domain::session_cache::SessionCache;
use contacts_domain::token_service::{JwtTokenService, TokenConfig};
use contacts_domain::{AuthServiceImpl, ContactServiceImpl};
use mongodb::options::ClientOptions;
use mongodb::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;

    let client_options = ClientOptions::parse(&config.mongo_uri)
        .await
        .context("Invalid MONGO_DB_URI")?;
    let client = Client::with_options(client_options).context("Failed to create MongoDB client")?;
    let db = Arc::new(RwLock::new(client.database(&config.mongo_db_name)));

    let user_repository = MongoUserRepository::new(db.clone(), "users".to_string());
    user_repository.ensure_indexes().await?;
    let contact_repository = MongoContactRepository::new(db.clone(), "contacts".to_string());
    contact_repository.ensure_indexes().await?;
    let cache_store = MongoCacheStore::new(db.clone(), "session_cache".to_string());
    cache_store.ensure_indexes().await?;

    let token_service = Arc::new(JwtTokenService::new(TokenConfig {
        secret: config.secret_key.clone(),
        algorithm: config.jwt_algorithm,
        access_ttl: config.access_token_ttl,
        refresh_ttl: config.refresh_token_ttl,
        email_ttl: config.email_token_ttl,
    }));

    let (mail_queue, mail_worker) = MailQueue::spawn(
        token_service.clone(),
        Arc::new(LogMailSender),
        MailQueueConfig {
            capacity: config.mail_queue_capacity,
            max_attempts: config.mail_max_attempts,
            ..MailQueueConfig::default()
        },
    );

    let auth_service = AuthServiceImpl::new(
        Arc::new(user_repository),
        token_service,
        Arc::new(BcryptHashingService::new(config.bcrypt_cost)),
        SessionCache::new(Arc::new(cache_store), config.cache_ttl, config.cache_timeout),
        Arc::new(mail_queue),
        Arc::new(FsImageStore::new(
            config.avatar_dir.clone(),
            config.avatar_base_url.clone(),
        )),
        config.store_timeout,
    );
    let contact_service = ContactServiceImpl::new(Arc::new(contact_repository), config.store_timeout);

    let state = AppState::new(Arc::new(auth_service), Arc::new(contact_service))
        .with_public_base_url(config.public_base_url.clone());
    let avatar_route = format!("/{}", config.avatar_base_url.trim_matches('/'));
    let app = router(state)
        .nest_service(&avatar_route, ServeDir::new(&config.avatar_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("contacts api listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // the router held the last queue handle; the worker finishes queued mail, retries included
    if tokio::time::timeout(Duration::from_secs(10), mail_worker)
        .await
        .is_err()
    {
        info!("Mail queue did not drain before shutdown");
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "contacts_api=debug,contacts_domain=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
