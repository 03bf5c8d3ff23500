//! Refresh-token sessions.
//!
//! Each account has exactly one session slot: the refresh token stored on its
//! row. Logging in replaces whatever was there, so a second login silently
//! supersedes the first device's refresh token. Refreshing swaps the slot only
//! if it still holds the presented token, which is what turns a replayed or
//! stolen (already rotated) token into a hard failure.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use crate::db::{Account, Database};
use crate::jwt::{AccessIdentity, JwtConfig, JwtError};

/// A freshly minted access/refresh pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(skip)]
    pub access_duration: u64,
    #[serde(skip)]
    pub refresh_duration: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Account not found")]
    AccountNotFound,
    /// The stored token no longer matches the one presented.
    #[error("Refresh token has been superseded")]
    Superseded,
    #[error(transparent)]
    Token(#[from] JwtError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct SessionStore {
    db: Database,
    jwt: Arc<JwtConfig>,
}

struct Minted {
    pair: TokenPair,
    refresh_expires_at: u64,
}

impl SessionStore {
    pub fn new(db: Database, jwt: Arc<JwtConfig>) -> Self {
        Self { db, jwt }
    }

    fn mint(&self, account: &Account) -> Result<Minted, SessionError> {
        let access = self.jwt.generate_access_token(AccessIdentity {
            uuid: &account.uuid,
            username: &account.username,
            email: &account.email,
            full_name: &account.full_name,
        })?;
        let refresh = self.jwt.generate_refresh_token(&account.uuid)?;

        Ok(Minted {
            pair: TokenPair {
                access_token: access.token,
                refresh_token: refresh.token,
                access_duration: access.duration,
                refresh_duration: refresh.duration,
            },
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Reload the account; the caller's earlier lookup may be stale.
    async fn load(&self, account_id: i64) -> Result<Account, SessionError> {
        self.db
            .users()
            .get_by_id(account_id)
            .await?
            .ok_or(SessionError::AccountNotFound)
    }

    /// Mint a new pair and overwrite the account's session slot with it.
    pub async fn rotate(&self, account_id: i64) -> Result<TokenPair, SessionError> {
        let account = self.load(account_id).await?;
        let minted = self.mint(&account)?;

        let stored = self
            .db
            .users()
            .store_refresh_token(account_id, &minted.pair.refresh_token, minted.refresh_expires_at)
            .await?;
        if !stored {
            return Err(SessionError::AccountNotFound);
        }

        debug!(account = %account.uuid, "Session rotated");
        Ok(minted.pair)
    }

    /// Like [`rotate`](Self::rotate), but only succeeds if the slot still holds
    /// `presented`. Of several concurrent callers presenting the same token,
    /// at most one wins.
    pub async fn rotate_presented(
        &self,
        account_id: i64,
        presented: &str,
    ) -> Result<TokenPair, SessionError> {
        let account = self.load(account_id).await?;
        let minted = self.mint(&account)?;

        let swapped = self
            .db
            .users()
            .swap_refresh_token(
                account_id,
                presented,
                &minted.pair.refresh_token,
                minted.refresh_expires_at,
            )
            .await?;
        if !swapped {
            return Err(SessionError::Superseded);
        }

        debug!(account = %account.uuid, "Session rotated from presented token");
        Ok(minted.pair)
    }

    /// Empty the session slot. Calling it on an empty slot is a no-op.
    pub async fn invalidate(&self, account_id: i64) -> Result<(), SessionError> {
        let existed = self.db.users().clear_refresh_token(account_id).await?;
        if !existed {
            debug!(account_id, "Invalidate on missing account");
        }
        Ok(())
    }

    /// Clear every stored refresh token whose expiry has passed.
    pub async fn purge_expired(&self) -> Result<u64, SessionError> {
        self.db
            .users()
            .clear_expired_refresh_tokens()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to purge expired sessions");
                e.into()
            })
    }
}
