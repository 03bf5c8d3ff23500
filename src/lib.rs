pub mod accounts;
pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod hasher;
pub mod jwt;
pub mod media;
pub mod rate_limit;
pub mod session;

use accounts::AccountService;
use api::{create_api_router, create_media_router};
use axum::Router;
use db::Database;
use jwt::JwtConfig;
use media::MediaStore;
use rate_limit::RateLimitConfig;
use session::SessionStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Where avatars and cover images are stored
    pub media: Arc<dyn MediaStore>,
    /// Directory served under `/media`
    pub media_dir: PathBuf,
    pub access_token_secret: Vec<u8>,
    pub refresh_token_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_token_duration: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_duration: u64,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    pub login_rate_per_minute: u32,
    pub register_rate_per_minute: u32,
}

impl ServerConfig {
    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::new(&self.access_token_secret, &self.refresh_token_secret)
            .with_durations(self.access_token_duration, self.refresh_token_duration)
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(config.jwt_config());
    let accounts = AccountService::new(config.db.clone(), jwt.clone(), config.media.clone());
    let rate_limit_config = Arc::new(RateLimitConfig::new(
        config.login_rate_per_minute,
        config.register_rate_per_minute,
    ));

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        accounts,
        config.secure_cookies,
        rate_limit_config,
    );

    Router::new()
        .nest("/api/v1", api_router)
        .nest("/media", create_media_router(config.media_dir.clone()))
}

/// Run cleanup once and spawn the background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(config: &ServerConfig) {
    let sessions = SessionStore::new(config.db.clone(), Arc::new(config.jwt_config()));
    cleanup::run_cleanup(&sessions).await;
    cleanup::spawn_cleanup_scheduler(sessions);
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
