//! Account endpoints.
//!
//! - POST `/register` - multipart sign-up with avatar and optional cover image
//! - POST `/login` - password login, sets session cookies
//! - POST `/logout` - clear the session
//! - POST `/refresh-token` - rotate the session using the refresh token
//! - POST `/change-password`
//! - GET `/current-user`
//! - PATCH `/update-account`, `/avatar`, `/cover-image`
//! - GET `/c/{username}` - public channel profile

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::Field, rejection::JsonRejection},
    http::{HeaderMap, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ApiResponse};
use crate::accounts::{
    AccountService, ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest,
    UpdateAccountRequest,
};
use crate::auth::{
    ACCESS_COOKIE_NAME, ApiAuth, MaybeAuth, REFRESH_COOKIE_NAME, clear_cookie, get_cookie,
    session_cookie,
};
use crate::db::{AccountProfile, Database};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::media::{MAX_UPLOAD_BYTES, MediaFile};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};
use crate::session::TokenPair;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub accounts: AccountService,
    pub secure_cookies: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(UsersState);

type CookieHeaders = AppendHeaders<[(axum::http::HeaderName, String); 2]>;

impl UsersState {
    fn session_cookies(&self, tokens: &TokenPair) -> CookieHeaders {
        AppendHeaders([
            (
                SET_COOKIE,
                session_cookie(
                    ACCESS_COOKIE_NAME,
                    &tokens.access_token,
                    tokens.access_duration,
                    self.secure_cookies,
                ),
            ),
            (
                SET_COOKIE,
                session_cookie(
                    REFRESH_COOKIE_NAME,
                    &tokens.refresh_token,
                    tokens.refresh_duration,
                    self.secure_cookies,
                ),
            ),
        ])
    }

    fn cleared_cookies(&self) -> CookieHeaders {
        AppendHeaders([
            (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, self.secure_cookies)),
            (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, self.secure_cookies)),
        ])
    }
}

pub fn router(state: UsersState) -> Router {
    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_register,
        ));

    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let session_router = Router::new()
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/update-account", patch(update_account))
        .route("/avatar", patch(update_avatar))
        .route("/cover-image", patch(update_cover_image))
        .route("/c/{username}", get(channel_profile))
        .with_state(state);

    Router::new()
        .merge(register_router)
        .merge(login_router)
        .merge(session_router)
        // Two images plus form fields
        .layer(DefaultBodyLimit::max(2 * MAX_UPLOAD_BYTES + 1024 * 1024))
}

// --- Request/response types ---

#[derive(Deserialize, Default)]
#[serde(default)]
struct LoginBody {
    username: Option<String>,
    email: Option<String>,
    password: String,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RefreshBody {
    refresh_token: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ChangePasswordBody {
    old_password: String,
    new_password: String,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct UpdateAccountBody {
    full_name: String,
    email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    user: AccountProfile,
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelData {
    #[serde(flatten)]
    profile: AccountProfile,
    subscribers_count: i64,
    channels_subscribed_to_count: i64,
    is_subscribed: bool,
}

#[derive(Serialize)]
struct Empty {}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

// --- Multipart helpers ---

async fn read_text(field: Field<'_>, name: &str) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|_| ApiError::bad_request(format!("Failed to read {}", name)))
}

/// Read a file part. Browsers send an empty part when no file was chosen,
/// which counts as no file.
async fn read_file(field: Field<'_>, name: &str) -> Result<Option<MediaFile>, ApiError> {
    let file_name = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);
    let bytes = field
        .bytes()
        .await
        .map_err(|_| ApiError::bad_request(format!("Failed to read {}", name)))?;

    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(MediaFile {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    }))
}

/// Pull a single named file out of a multipart body, ignoring other parts.
async fn single_file(mut multipart: Multipart, wanted: &str) -> Result<Option<MediaFile>, ApiError> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Invalid multipart data"))?
    {
        if field.name() == Some(wanted) {
            file = read_file(field, wanted).await?;
        }
    }
    Ok(file)
}

// --- Handlers ---

async fn register(
    State(state): State<UsersState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut req = RegisterRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Invalid multipart data"))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "fullName" => req.full_name = read_text(field, "fullName").await?,
            "email" => req.email = read_text(field, "email").await?,
            "username" => req.username = read_text(field, "username").await?,
            "password" => req.password = read_text(field, "password").await?,
            "avatar" => req.avatar = read_file(field, "avatar").await?,
            "coverImage" => req.cover_image = read_file(field, "coverImage").await?,
            _ => {}
        }
    }

    let profile = state.accounts.register(req).await?;
    Ok(ApiResponse::created(profile, "User registered successfully"))
}

async fn login(
    State(state): State<UsersState>,
    payload: Result<Json<LoginBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = json_body(payload)?;
    let response = state
        .accounts
        .login(LoginRequest {
            username: body.username,
            email: body.email,
            password: body.password,
        })
        .await?;

    let cookies = state.session_cookies(&response.tokens);
    Ok((
        cookies,
        ApiResponse::ok(
            LoginData {
                user: response.account,
                access_token: response.tokens.access_token,
                refresh_token: response.tokens.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

async fn logout(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
) -> Result<impl IntoResponse, ApiError> {
    state.accounts.logout(auth.account_id).await?;
    Ok((
        state.cleared_cookies(),
        ApiResponse::ok(Empty {}, "User logged out"),
    ))
}

/// The token may arrive as the `refreshToken` cookie or in a JSON body.
async fn refresh_token(
    State(state): State<UsersState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshBody>(&body)
            .ok()
            .and_then(|b| b.refresh_token)
    };
    let presented = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or(from_body);

    let tokens = state
        .accounts
        .refresh(RefreshRequest {
            refresh_token: presented,
        })
        .await?;

    let cookies = state.session_cookies(&tokens);
    Ok((cookies, ApiResponse::ok(tokens, "Access token refreshed")))
}

async fn change_password(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    payload: Result<Json<ChangePasswordBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = json_body(payload)?;
    state
        .accounts
        .change_password(
            auth.account_id,
            ChangePasswordRequest {
                old_password: body.old_password,
                new_password: body.new_password,
            },
        )
        .await?;
    Ok(ApiResponse::ok(Empty {}, "Password changed successfully"))
}

async fn current_user(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.accounts.current_account(auth.account_id).await?;
    Ok(ApiResponse::ok(profile, "Current user fetched successfully"))
}

async fn update_account(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    payload: Result<Json<UpdateAccountBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = json_body(payload)?;
    let profile = state
        .accounts
        .update_account(
            auth.account_id,
            UpdateAccountRequest {
                full_name: body.full_name,
                email: body.email,
            },
        )
        .await?;
    Ok(ApiResponse::ok(profile, "Account details updated successfully"))
}

async fn update_avatar(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let file = single_file(multipart, "avatar").await?;
    let profile = state.accounts.update_avatar(auth.account_id, file).await?;
    Ok(ApiResponse::ok(profile, "Avatar image updated successfully"))
}

async fn update_cover_image(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let file = single_file(multipart, "coverImage").await?;
    let profile = state
        .accounts
        .update_cover_image(auth.account_id, file)
        .await?;
    Ok(ApiResponse::ok(profile, "Cover image updated successfully"))
}

async fn channel_profile(
    State(state): State<UsersState>,
    MaybeAuth(viewer): MaybeAuth,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let channel = state
        .accounts
        .channel_profile(&username, viewer.map(|v| v.account_id))
        .await?;

    Ok(ApiResponse::ok(
        ChannelData {
            profile: channel.account,
            subscribers_count: channel.stats.subscribers,
            channels_subscribed_to_count: channel.stats.subscribed_to,
            is_subscribed: channel.stats.viewer_is_subscribed,
        },
        "User channel fetched successfully",
    ))
}
