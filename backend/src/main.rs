use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatehouse_backend::{
    config::Config,
    db::{connection::create_pool, redis::create_redis_pool},
    handlers,
    middleware as auth_middleware,
    repositories::session::{PgSessionStore, SessionStore},
    services::{
        auth::AuthService,
        denylist::{Denylist, RedisDenylist},
        notifier::{AnomalyNotifier, NoopNotifier, WebhookNotifier},
    },
    state::AppState,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatehouse_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %config.database_url,
        redis_url = %config.redis_url,
        signing_secret = %mask_secret(&config.signing_secret),
        access_token_ttl_minutes = config.access_token_ttl_minutes,
        refresh_cookie_ttl_days = config.refresh_cookie_ttl_days,
        webhook_configured = config.webhook_url.is_some(),
        "Loaded configuration from environment/.env"
    );

    // Initialize persistence
    let pool = create_pool(&config).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let redis_pool = create_redis_pool(&config).await?;

    // Wire the protocol and its collaborators
    let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool));
    let denylist: Arc<dyn Denylist> = Arc::new(RedisDenylist::new(redis_pool));
    let notifier: Arc<dyn AnomalyNotifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::spawn(url.clone())),
        None => Arc::new(NoopNotifier),
    };
    let auth = Arc::new(AuthService::new(store, denylist, notifier, &config));
    let state = AppState::new(auth, config.clone());

    // Build public routes (no auth gate)
    let public_routes = Router::new()
        .route(
            "/api/auth/sessions/{user_id}",
            post(handlers::auth::new_session),
        )
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .route("/api/auth/revoke", post(handlers::auth::revoke));

    // Build protected routes (credential + denylist gate)
    let protected_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::auth::auth,
        ));

    // Compose app with shared layers (CORS/Trace) and shared state
    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                        .allow_headers(Any),
                ),
        )
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
