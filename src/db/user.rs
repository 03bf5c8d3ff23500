use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// Full account record, including secrets. Never serialized; use
/// [`AccountProfile`] for anything that leaves the server.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Public account representation with the password hash and refresh token stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Account> for AccountProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.uuid.clone(),
            username: account.username.clone(),
            email: account.email.clone(),
            full_name: account.full_name.clone(),
            avatar: account.avatar.clone(),
            cover_image: account.cover_image.clone(),
            created_at: account.created_at.clone(),
            updated_at: account.updated_at.clone(),
        }
    }
}

impl From<Account> for AccountProfile {
    fn from(account: Account) -> Self {
        Self::from(&account)
    }
}

/// Fields required to insert an account.
#[derive(Debug, Clone, Copy)]
pub struct NewAccount<'a> {
    pub uuid: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub avatar: &'a str,
    pub cover_image: &'a str,
    pub password_hash: &'a str,
}

/// Whether an error came from a UNIQUE constraint (duplicate username/email).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

fn stored_timestamp(secs: u64) -> Result<i64, sqlx::Error> {
    i64::try_from(secs).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new account. Returns the row ID.
    pub async fn create(&self, account: NewAccount<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (uuid, username, email, full_name, avatar, cover_image, password_hash)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(account.uuid)
        .bind(account.username)
        .bind(account.email)
        .bind(account.full_name)
        .bind(account.avatar)
        .bind(account.cover_image)
        .bind(account.password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, uuid, username, email, full_name, avatar, cover_image,
                    password_hash, refresh_token, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, uuid, username, email, full_name, avatar, cover_image,
                    password_hash, refresh_token, created_at, updated_at
             FROM users WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
    }

    /// Case-insensitive (the column is `COLLATE NOCASE`).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, uuid, username, email, full_name, avatar, cover_image,
                    password_hash, refresh_token, created_at, updated_at
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// Case-insensitive (the column is `COLLATE NOCASE`).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, uuid, username, email, full_name, avatar, cover_image,
                    password_hash, refresh_token, created_at, updated_at
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// Find the account a login names. The username wins when both are given;
    /// the email is only consulted without one.
    pub async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>, sqlx::Error> {
        match (username, email) {
            (Some(username), _) => self.get_by_username(username).await,
            (None, Some(email)) => self.get_by_email(email).await,
            (None, None) => Ok(None),
        }
    }

    /// Replace the stored refresh token unconditionally (login).
    /// Returns false if the account no longer exists.
    pub async fn store_refresh_token(
        &self,
        id: i64,
        token: &str,
        expires_at: u64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = ?, refresh_token_expires_at = ? WHERE id = ?",
        )
        .bind(token)
        .bind(stored_timestamp(expires_at)?)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the stored refresh token only if it still equals `expected`.
    /// A single UPDATE, so two callers racing with the same token cannot both win.
    pub async fn swap_refresh_token(
        &self,
        id: i64,
        expected: &str,
        token: &str,
        expires_at: u64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = ?, refresh_token_expires_at = ?
             WHERE id = ? AND refresh_token = ?",
        )
        .bind(token)
        .bind(stored_timestamp(expires_at)?)
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Empty the session slot. Returns false if the account does not exist.
    pub async fn clear_refresh_token(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = NULL, refresh_token_expires_at = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear stored refresh tokens that are past their expiry.
    pub async fn clear_expired_refresh_tokens(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = NULL, refresh_token_expires_at = NULL
             WHERE refresh_token_expires_at IS NOT NULL
               AND refresh_token_expires_at < CAST(strftime('%s', 'now') AS INTEGER)",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_password_hash(&self, id: i64, hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update display name and email, returning the updated record.
    pub async fn update_details(
        &self,
        id: i64,
        full_name: &str,
        email: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE users SET full_name = ?, email = ?, updated_at = datetime('now')
             WHERE id = ?
             RETURNING id, uuid, username, email, full_name, avatar, cover_image,
                       password_hash, refresh_token, created_at, updated_at",
        )
        .bind(full_name)
        .bind(email)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn set_avatar(&self, id: i64, url: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE users SET avatar = ?, updated_at = datetime('now')
             WHERE id = ?
             RETURNING id, uuid, username, email, full_name, avatar, cover_image,
                       password_hash, refresh_token, created_at, updated_at",
        )
        .bind(url)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn set_cover_image(
        &self,
        id: i64,
        url: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE users SET cover_image = ?, updated_at = datetime('now')
             WHERE id = ?
             RETURNING id, uuid, username, email, full_name, avatar, cover_image,
                       password_hash, refresh_token, created_at, updated_at",
        )
        .bind(url)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete an account by ID.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
