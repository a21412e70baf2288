use axum::{Router, middleware, routing::get};
use encore_identity::{AuthService, SignedValueCodec};
use encore_server::{
    auth::{self, AppState, PgAuthStore},
    config::ServerConfig,
    jobs,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let registry = auth::build_registry(&config.base_url, &config.providers)
        .expect("invalid provider configuration");
    tracing::info!(providers = ?registry.slugs(), "Registered identity providers");

    let state = AppState::new(
        AuthService::new(PgAuthStore::new(db_pool)),
        registry,
        SignedValueCodec::new(config.secret.into_bytes()),
        config.session,
    );

    // Spawn periodic identity re-verification
    jobs::spawn_reauth_scheduler(state.clone());

    let app = Router::new()
        .route("/auth/login", get(auth::login))
        .route("/auth/callback/{provider}", get(auth::callback))
        .route("/auth/logout", get(auth::logout))
        .route("/whoami", get(auth::whoami))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
