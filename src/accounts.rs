//! Account workflows: registration, login, session refresh/logout, password
//! and profile changes.
//!
//! Every entry point takes a typed request and returns `Result<_, AccountError>`.
//! Expected failures (wrong password, duplicate username, stale refresh token)
//! are ordinary `Err` values; the HTTP layer maps them to status codes.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::{Account, AccountProfile, ChannelStats, Database, NewAccount, is_unique_violation};
use crate::hasher::CredentialHasher;
use crate::jwt::JwtConfig;
use crate::media::{MediaError, MediaFile, MediaStore};
use crate::session::{SessionError, SessionStore, TokenPair};

/// Maximum username length.
const MAX_USERNAME_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upload(String),
    #[error("{0}")]
    Internal(String),
}

impl AccountError {
    fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    fn db(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Database error".into())
    }
}

/// Extension trait for concise database error mapping.
trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, AccountError>;
}

impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn db_err(self, msg: &str) -> Result<T, AccountError> {
        self.map_err(|e| AccountError::db(msg, e))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub avatar: Option<MediaFile>,
    pub cover_image: Option<MediaFile>,
}

#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub account: AccountProfile,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Default)]
pub struct RefreshRequest {
    /// Token taken from the `refreshToken` cookie or the request body.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAccountRequest {
    pub full_name: String,
    pub email: String,
}

/// Public channel page: the profile plus subscription counters.
#[derive(Debug, Clone)]
pub struct ChannelProfile {
    pub account: AccountProfile,
    pub stats: ChannelStats,
}

#[derive(Clone)]
pub struct AccountService {
    db: Database,
    hasher: CredentialHasher,
    media: Arc<dyn MediaStore>,
    sessions: SessionStore,
    jwt: Arc<JwtConfig>,
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

impl AccountService {
    pub fn new(db: Database, jwt: Arc<JwtConfig>, media: Arc<dyn MediaStore>) -> Self {
        Self {
            sessions: SessionStore::new(db.clone(), jwt.clone()),
            db,
            hasher: CredentialHasher::new(),
            media,
            jwt,
        }
    }

    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    async fn hash_password(&self, password: &str) -> Result<String, AccountError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                error!(error = %e, "Password hashing task failed");
                AccountError::Internal("Failed to hash password".into())
            })?
            .map_err(|e| {
                error!(error = %e, "Failed to hash password");
                AccountError::Internal("Failed to hash password".into())
            })
    }

    async fn verify_password(&self, password: &str, digest: &str) -> Result<bool, AccountError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| {
                error!(error = %e, "Password verification task failed");
                AccountError::Internal("Failed to verify password".into())
            })
    }

    async fn load(&self, account_id: i64) -> Result<Account, AccountError> {
        self.db
            .users()
            .get_by_id(account_id)
            .await
            .db_err("Failed to load account")?
            .ok_or_else(|| AccountError::NotFound("User does not exist".into()))
    }

    /// Create an account. Fails with `Conflict` if the username or email is taken,
    /// and with `Validation` if no avatar was supplied.
    pub async fn register(&self, req: RegisterRequest) -> Result<AccountProfile, AccountError> {
        if [&req.full_name, &req.email, &req.username, &req.password]
            .iter()
            .any(|field| is_blank(field))
        {
            return Err(AccountError::validation("All fields are required"));
        }

        let username = normalize_username(&req.username);
        let email = req.email.trim().to_string();
        let full_name = req.full_name.trim().to_string();

        if username.len() > MAX_USERNAME_LEN {
            return Err(AccountError::validation(format!(
                "Username cannot be longer than {} characters",
                MAX_USERNAME_LEN
            )));
        }
        if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AccountError::validation(
                "Username can only contain letters, numbers, and underscores",
            ));
        }

        // Both lookups always run so the message can name every clashing field.
        let users = self.db.users();
        let username_taken = users
            .get_by_username(&username)
            .await
            .db_err("Failed to check username")?
            .is_some();
        let email_taken = users
            .get_by_email(&email)
            .await
            .db_err("Failed to check email")?
            .is_some();

        match (username_taken, email_taken) {
            (true, true) => {
                return Err(AccountError::Conflict(
                    "User with this email and username already exists".into(),
                ));
            }
            (true, false) => {
                return Err(AccountError::Conflict(
                    "User with this username already exists".into(),
                ));
            }
            (false, true) => {
                return Err(AccountError::Conflict(
                    "User with this email already exists".into(),
                ));
            }
            (false, false) => {}
        }

        let avatar_file = req
            .avatar
            .ok_or_else(|| AccountError::validation("Avatar file is required"))?;

        let avatar = self
            .media
            .upload(avatar_file)
            .await
            .map_err(|e| upload_failure(e, "Avatar", "Avatar file is required".into()))?;
        if avatar.url.is_empty() {
            return Err(AccountError::Upload("Avatar file is required".into()));
        }

        // The cover image is optional; a failed upload leaves it empty.
        let cover_image = match req.cover_image {
            Some(file) => match self.media.upload(file).await {
                Ok(stored) => stored.url,
                Err(e) => {
                    warn!(error = %e, "Cover image upload failed, continuing without it");
                    String::new()
                }
            },
            None => String::new(),
        };

        let password_hash = self.hash_password(&req.password).await?;
        let uuid = uuid::Uuid::new_v4().to_string();

        let id = users
            .create(NewAccount {
                uuid: &uuid,
                username: &username,
                email: &email,
                full_name: &full_name,
                avatar: &avatar.url,
                cover_image: &cover_image,
                password_hash: &password_hash,
            })
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    // Lost a race with a concurrent registration
                    AccountError::Conflict("User with this email or username already exists".into())
                } else {
                    AccountError::db("Failed to create user", e)
                }
            })?;

        let created = users
            .get_by_id(id)
            .await
            .db_err("Failed to reload user")?
            .ok_or_else(|| {
                error!(id, "Account missing right after creation");
                AccountError::Internal("Something went wrong while registering the user".into())
            })?;

        info!(account = %created.uuid, username = %created.username, "User registered");
        Ok(AccountProfile::from(created))
    }

    /// Authenticate with username or email plus password and open a new session.
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AccountError> {
        let username = req
            .username
            .as_deref()
            .filter(|s| !is_blank(s))
            .map(normalize_username);
        let email = req
            .email
            .as_deref()
            .filter(|s| !is_blank(s))
            .map(|s| s.trim().to_string());

        if username.is_none() && email.is_none() {
            return Err(AccountError::validation("Username or email is required"));
        }
        if is_blank(&req.password) {
            return Err(AccountError::validation("Password is required"));
        }

        let account = self
            .db
            .users()
            .find_by_login(username.as_deref(), email.as_deref())
            .await
            .db_err("Failed to look up user")?
            .ok_or_else(|| AccountError::NotFound("User does not exist".into()))?;

        if !self
            .verify_password(&req.password, &account.password_hash)
            .await?
        {
            info!(account = %account.uuid, "Login rejected: wrong password");
            return Err(AccountError::unauthorized("Invalid user credentials"));
        }

        let tokens = self.sessions.rotate(account.id).await.map_err(|e| match e {
            SessionError::AccountNotFound => AccountError::NotFound("User does not exist".into()),
            other => session_failure(other),
        })?;

        info!(account = %account.uuid, "User logged in");
        Ok(LoginResponse {
            account: AccountProfile::from(&account),
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair. The presented token must be the
    /// one currently stored for the account.
    pub async fn refresh(&self, req: RefreshRequest) -> Result<TokenPair, AccountError> {
        let presented = req
            .refresh_token
            .filter(|t| !is_blank(t))
            .ok_or_else(|| AccountError::unauthorized("Unauthorized request"))?;

        let claims = self
            .jwt
            .validate_refresh_token(&presented)
            .map_err(|_| AccountError::unauthorized("Invalid refresh token"))?;

        let account = self
            .db
            .users()
            .get_by_uuid(&claims.sub)
            .await
            .db_err("Failed to look up user")?
            .ok_or_else(|| AccountError::unauthorized("Invalid refresh token"))?;

        if account.refresh_token.as_deref() != Some(presented.as_str()) {
            warn!(account = %account.uuid, "Refresh token reuse detected");
            return Err(AccountError::unauthorized(
                "Refresh token is expired or used",
            ));
        }

        let tokens = self
            .sessions
            .rotate_presented(account.id, &presented)
            .await
            .map_err(|e| match e {
                SessionError::Superseded => {
                    warn!(account = %account.uuid, "Refresh lost a concurrent rotation");
                    AccountError::unauthorized("Refresh token is expired or used")
                }
                SessionError::AccountNotFound => AccountError::unauthorized("Invalid refresh token"),
                other => session_failure(other),
            })?;

        info!(account = %account.uuid, "Access token refreshed");
        Ok(tokens)
    }

    /// Close the account's session.
    pub async fn logout(&self, account_id: i64) -> Result<(), AccountError> {
        self.sessions
            .invalidate(account_id)
            .await
            .map_err(session_failure)?;
        info!(account_id, "User logged out");
        Ok(())
    }

    pub async fn change_password(
        &self,
        account_id: i64,
        req: ChangePasswordRequest,
    ) -> Result<(), AccountError> {
        if is_blank(&req.old_password) || is_blank(&req.new_password) {
            return Err(AccountError::validation("All fields are required"));
        }

        let account = self.load(account_id).await?;
        if !self
            .verify_password(&req.old_password, &account.password_hash)
            .await?
        {
            return Err(AccountError::unauthorized("Invalid old password"));
        }

        let hash = self.hash_password(&req.new_password).await?;
        let updated = self
            .db
            .users()
            .set_password_hash(account_id, &hash)
            .await
            .db_err("Failed to update password")?;
        if !updated {
            return Err(AccountError::NotFound("User does not exist".into()));
        }

        info!(account = %account.uuid, "Password changed");
        Ok(())
    }

    pub async fn current_account(&self, account_id: i64) -> Result<AccountProfile, AccountError> {
        self.load(account_id).await.map(AccountProfile::from)
    }

    pub async fn update_account(
        &self,
        account_id: i64,
        req: UpdateAccountRequest,
    ) -> Result<AccountProfile, AccountError> {
        if is_blank(&req.full_name) || is_blank(&req.email) {
            return Err(AccountError::validation("All fields are required"));
        }

        let email = req.email.trim();
        if let Some(other) = self
            .db
            .users()
            .get_by_email(email)
            .await
            .db_err("Failed to check email")?
        {
            if other.id != account_id {
                return Err(AccountError::Conflict(
                    "User with this email already exists".into(),
                ));
            }
        }

        let account = self
            .db
            .users()
            .update_details(account_id, req.full_name.trim(), email)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AccountError::Conflict("User with this email already exists".into())
                } else {
                    AccountError::db("Failed to update account", e)
                }
            })?
            .ok_or_else(|| AccountError::NotFound("User does not exist".into()))?;

        Ok(AccountProfile::from(account))
    }

    async fn upload_required(
        &self,
        file: Option<MediaFile>,
        what: &str,
    ) -> Result<String, AccountError> {
        let file = file.ok_or_else(|| AccountError::validation(format!("{} file is missing", what)))?;

        let stored = self.media.upload(file).await.map_err(|e| {
            upload_failure(e, what, format!("Error while uploading {}", what.to_lowercase()))
        })?;
        if stored.url.is_empty() {
            return Err(AccountError::Upload(format!(
                "Error while uploading {}",
                what.to_lowercase()
            )));
        }
        Ok(stored.url)
    }

    pub async fn update_avatar(
        &self,
        account_id: i64,
        file: Option<MediaFile>,
    ) -> Result<AccountProfile, AccountError> {
        let url = self.upload_required(file, "Avatar").await?;
        self.db
            .users()
            .set_avatar(account_id, &url)
            .await
            .db_err("Failed to update avatar")?
            .map(AccountProfile::from)
            .ok_or_else(|| AccountError::NotFound("User does not exist".into()))
    }

    pub async fn update_cover_image(
        &self,
        account_id: i64,
        file: Option<MediaFile>,
    ) -> Result<AccountProfile, AccountError> {
        let url = self.upload_required(file, "Cover image").await?;
        self.db
            .users()
            .set_cover_image(account_id, &url)
            .await
            .db_err("Failed to update cover image")?
            .map(AccountProfile::from)
            .ok_or_else(|| AccountError::NotFound("User does not exist".into()))
    }

    /// Public channel page for `username`, seen by `viewer` (if signed in).
    pub async fn channel_profile(
        &self,
        username: &str,
        viewer: Option<i64>,
    ) -> Result<ChannelProfile, AccountError> {
        if is_blank(username) {
            return Err(AccountError::validation("Username is missing"));
        }

        let channel = self
            .db
            .users()
            .get_by_username(&normalize_username(username))
            .await
            .db_err("Failed to look up channel")?
            .ok_or_else(|| AccountError::NotFound("Channel does not exist".into()))?;

        let stats = self
            .db
            .subscriptions()
            .stats(channel.id, viewer)
            .await
            .db_err("Failed to load channel stats")?;

        Ok(ChannelProfile {
            account: AccountProfile::from(channel),
            stats,
        })
    }

    /// Subscribe to (or unsubscribe from) a channel. Returns the new state.
    pub async fn toggle_subscription(
        &self,
        subscriber_id: i64,
        channel_username: &str,
    ) -> Result<bool, AccountError> {
        let channel = self
            .db
            .users()
            .get_by_username(&normalize_username(channel_username))
            .await
            .db_err("Failed to look up channel")?
            .ok_or_else(|| AccountError::NotFound("Channel does not exist".into()))?;

        if channel.id == subscriber_id {
            return Err(AccountError::validation("You cannot subscribe to yourself"));
        }

        self.db
            .subscriptions()
            .toggle(subscriber_id, channel.id)
            .await
            .db_err("Failed to update subscription")
    }
}

/// A rejected file type is the client's mistake and says so; anything else
/// gets the generic `message`.
fn upload_failure(e: MediaError, what: &str, message: String) -> AccountError {
    match e {
        MediaError::UnsupportedType(_) => {
            AccountError::validation(format!("{} must be a PNG, JPEG, GIF, WebP or AVIF image", what))
        }
        e => {
            warn!(error = %e, "{} upload failed", what);
            AccountError::Upload(message)
        }
    }
}

fn session_failure(e: SessionError) -> AccountError {
    error!(error = %e, "Session operation failed");
    AccountError::Internal("Something went wrong while generating tokens".into())
}
