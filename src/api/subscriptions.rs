//! Channel subscription endpoints.

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ApiResponse};
use crate::accounts::AccountService;
use crate::auth::ApiAuth;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct SubscriptionsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub accounts: AccountService,
}

impl_has_auth_backend!(SubscriptionsState);

pub fn router(state: SubscriptionsState) -> Router {
    Router::new()
        .route("/c/{username}", post(toggle_subscription))
        .with_state(state)
}

#[derive(Serialize)]
struct SubscriptionData {
    subscribed: bool,
}

async fn toggle_subscription(
    State(state): State<SubscriptionsState>,
    ApiAuth(auth): ApiAuth,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let subscribed = state
        .accounts
        .toggle_subscription(auth.account_id, &username)
        .await?;

    let message = if subscribed {
        "Subscribed successfully"
    } else {
        "Unsubscribed successfully"
    };
    Ok(ApiResponse::ok(SubscriptionData { subscribed }, message))
}
