mod error;
mod media;
mod subscriptions;
mod users;

use axum::Router;
use std::{path::PathBuf, sync::Arc};

use crate::accounts::AccountService;
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, ApiResponse, error_response};

/// Create the `/api/v1` router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    accounts: AccountService,
    secure_cookies: bool,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let users_state = users::UsersState {
        db: db.clone(),
        jwt: jwt.clone(),
        accounts: accounts.clone(),
        secure_cookies,
        rate_limit_config,
    };

    let subscriptions_state = subscriptions::SubscriptionsState { db, jwt, accounts };

    Router::new()
        .nest("/users", users::router(users_state))
        .nest("/subscriptions", subscriptions::router(subscriptions_state))
}

/// Create the router serving stored media files from `dir`.
pub fn create_media_router(dir: PathBuf) -> Router {
    media::router(media::MediaState { dir: Arc::new(dir) })
}
