use axum::{
    Router,
    routing::{get, post},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::accounts::password::PasswordHasher;
use crate::accounts::token::TokenIssuer;
use crate::api::auth;
use crate::api::users;
use crate::config::Config;
use crate::db;

pub struct AppState {
    pub db: SqlitePool,
    pub hasher: PasswordHasher,
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(db: SqlitePool, config: &Config) -> Self {
        Self {
            db,
            hasher: PasswordHasher::default(),
            tokens: TokenIssuer::from_config(config),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/token/", post(auth::obtain_token))
        .route("/api/token/refresh/", post(auth::refresh_token))
        .route("/api/users/", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{id}/",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.database_url).await?;
    let state = Arc::new(AppState::new(pool, &config));
    let app = router(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
pub async fn test_app() -> Router {
    let config = Config::for_tests();
    let state = AppState::new(db::test_pool().await, &config);
    router(Arc::new(state))
}
