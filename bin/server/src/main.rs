use axum::{Router, middleware, routing::get};
use keywarden_server::{
    auth::{self, AppState, OidcClient},
    config::ServerConfig,
    db::TokenRepository,
    tx,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
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

    // Cleanup expired tokens on startup
    match TokenRepository::delete_expired(&db_pool).await {
        Ok(count) if count > 0 => {
            tracing::info!(deleted_tokens = count, "Cleaned up expired tokens on startup");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired tokens on startup");
        }
    }

    // Spawn periodic token cleanup task
    let cleanup_pool = db_pool.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            match TokenRepository::delete_expired(&cleanup_pool).await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_tokens = count, "Periodic token cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired tokens");
                }
            }
        }
    });

    // Initialize OIDC client
    tracing::info!("Discovering OIDC provider...");
    let oidc_client = OidcClient::discover(config.oidc)
        .await
        .expect("failed to discover OIDC provider");

    // Create application state
    let app_state = Arc::new(AppState::new(
        db_pool.clone(),
        Arc::new(oidc_client),
        config.session,
    ));

    // Layer order matters: the transaction wrapper must be outermost so
    // the authentication middleware already runs inside the request's
    // transaction.
    let app = Router::new()
        .route("/auth", get(auth::status))
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", get(auth::logout))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::authn_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            db_pool.clone(),
            tx::tx_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
