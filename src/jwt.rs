//! JWT token generation and validation.
//!
//! Access and refresh tokens are signed with separate secrets, so leaking one
//! key never lets an attacker forge the other kind of token.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token - stateless, never stored
    Access,
    /// Long-lived refresh token - one copy stored on the account row
    Refresh,
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (account UUID)
    pub sub: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for refresh tokens. Carries nothing but the account id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Unique per token, so two rotations within the same second differ
    pub jti: String,
    /// Subject (account UUID)
    pub sub: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: u64,
    pub exp: u64,
}

/// Default access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Default refresh token duration: 10 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 10 * 24 * 60 * 60;

/// Identity embedded in an access token.
#[derive(Debug, Clone, Copy)]
pub struct AccessIdentity<'a> {
    pub uuid: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
}

/// Signing keys and lifetimes for both token kinds.
#[derive(Clone)]
pub struct JwtConfig {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_duration: u64,
    refresh_duration: u64,
}

/// Result of generating an access token.
#[derive(Debug, Clone)]
pub struct AccessTokenResult {
    pub token: String,
    /// Token duration in seconds
    pub duration: u64,
}

/// Result of generating a refresh token.
#[derive(Debug, Clone)]
pub struct RefreshTokenResult {
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

impl JwtConfig {
    /// Create a configuration with the default token lifetimes.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_duration: ACCESS_TOKEN_DURATION_SECS,
            refresh_duration: REFRESH_TOKEN_DURATION_SECS,
        }
    }

    /// Override the token lifetimes (in seconds).
    pub fn with_durations(mut self, access_secs: u64, refresh_secs: u64) -> Self {
        self.access_duration = access_secs;
        self.refresh_duration = refresh_secs;
        self
    }

    /// Generate an access token for an account.
    pub fn generate_access_token(
        &self,
        identity: AccessIdentity<'_>,
    ) -> Result<AccessTokenResult, JwtError> {
        let now = unix_now()?;

        let claims = AccessClaims {
            sub: identity.uuid.to_string(),
            username: identity.username.to_string(),
            email: identity.email.to_string(),
            full_name: identity.full_name.to_string(),
            token_type: TokenType::Access,
            iat: now,
            exp: expiry(now, self.access_duration)?,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(JwtError::Encoding)?;

        Ok(AccessTokenResult {
            token,
            duration: self.access_duration,
        })
    }

    /// Generate a refresh token for an account.
    pub fn generate_refresh_token(&self, account_uuid: &str) -> Result<RefreshTokenResult, JwtError> {
        let now = unix_now()?;

        let jti = uuid::Uuid::new_v4().to_string();
        let exp = expiry(now, self.refresh_duration)?;

        let claims = RefreshClaims {
            jti,
            sub: account_uuid.to_string(),
            token_type: TokenType::Refresh,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(JwtError::Encoding)?;

        Ok(RefreshTokenResult {
            token,
            expires_at: exp,
            duration: self.refresh_duration,
        })
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let claims: AccessClaims = decode(token, &self.access_decoding)?;

        if claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }

        Ok(claims)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let claims: RefreshClaims = decode(token, &self.refresh_decoding)?;

        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }

        Ok(claims)
    }
}

fn decode<T: serde::de::DeserializeOwned>(token: &str, key: &DecodingKey) -> Result<T, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    jsonwebtoken::decode::<T>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(JwtError::Decoding)
}

/// Expiry timestamp. Must also fit the signed column it is stored in.
fn expiry(now: u64, duration: u64) -> Result<u64, JwtError> {
    now.checked_add(duration)
        .filter(|exp| *exp <= i64::MAX as u64)
        .ok_or(JwtError::DurationOverflow)
}

fn unix_now() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("Failed to decode token: {0}")]
    Decoding(jsonwebtoken::errors::Error),
    #[error("System time error")]
    TimeError,
    #[error("Token lifetime too large")]
    DurationOverflow,
    /// e.g. an access token presented where a refresh token is expected
    #[error("Wrong token type")]
    WrongTokenType,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &[u8] = b"test-access-secret-for-testing";
    const REFRESH_SECRET: &[u8] = b"test-refresh-secret-for-testing";

    fn alice() -> AccessIdentity<'static> {
        AccessIdentity {
            uuid: "uuid-123",
            username: "alice",
            email: "alice@example.com",
            full_name: "Alice Liddell",
        }
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let config = JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET);

        let result = config.generate_access_token(alice()).unwrap();
        assert_eq!(result.duration, ACCESS_TOKEN_DURATION_SECS);

        let claims = config.validate_access_token(&result.token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.full_name, "Alice Liddell");
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_generate_and_validate_refresh_token() {
        let config = JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET);

        let result = config.generate_refresh_token("uuid-123").unwrap();
        assert_eq!(result.duration, REFRESH_TOKEN_DURATION_SECS);

        let claims = config.validate_refresh_token(&result.token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.exp, result.expires_at);
        assert_eq!(claims.exp, claims.iat + REFRESH_TOKEN_DURATION_SECS);
        assert!(!claims.jti.is_empty());
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn test_custom_durations() {
        let config = JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET).with_durations(60, 120);

        assert_eq!(config.generate_access_token(alice()).unwrap().duration, 60);
        assert_eq!(config.generate_refresh_token("uuid-123").unwrap().duration, 120);
    }

    #[test]
    fn test_oversized_duration_is_an_error() {
        let config = JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET).with_durations(u64::MAX, u64::MAX);

        assert!(matches!(
            config.generate_access_token(alice()),
            Err(JwtError::DurationOverflow)
        ));
        assert!(matches!(
            config.generate_refresh_token("uuid-123"),
            Err(JwtError::DurationOverflow)
        ));

        let config = JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET).with_durations(60, i64::MAX as u64);
        assert!(matches!(
            config.generate_refresh_token("uuid-123"),
            Err(JwtError::DurationOverflow)
        ));
    }

    #[test]
    fn test_token_kinds_not_interchangeable() {
        let config = JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET);

        let access = config.generate_access_token(alice()).unwrap();
        let refresh = config.generate_refresh_token("uuid-123").unwrap();

        assert!(config.validate_refresh_token(&access.token).is_err());
        assert!(config.validate_access_token(&refresh.token).is_err());
    }

    #[test]
    fn test_same_secret_still_checks_token_type() {
        let config = JwtConfig::new(b"shared-secret", b"shared-secret");

        let access = config.generate_access_token(alice()).unwrap();
        assert!(matches!(
            config.validate_refresh_token(&access.token),
            Err(JwtError::Decoding(_)) | Err(JwtError::WrongTokenType)
        ));
    }

    #[test]
    fn test_invalid_token() {
        let config = JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET);

        assert!(config.validate_access_token("invalid-token").is_err());
        assert!(config.validate_refresh_token("").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig::new(b"access-1", b"refresh-1");
        let config2 = JwtConfig::new(b"access-2", b"refresh-2");

        let result = config1.generate_refresh_token("uuid-123").unwrap();
        assert!(config2.validate_refresh_token(&result.token).is_err());
    }

    #[test]
    fn test_expired_refresh_token() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let claims = RefreshClaims {
            jti: "jti-1".to_string(),
            sub: "uuid-123".to_string(),
            token_type: TokenType::Refresh,
            iat: now - 100,
            exp: now - 50,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(REFRESH_SECRET),
        )
        .unwrap();

        let config = JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET);
        assert!(config.validate_refresh_token(&token).is_err());
    }

    #[test]
    fn test_unique_jti_per_refresh_token() {
        let config = JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET);

        let result1 = config.generate_refresh_token("uuid-123").unwrap();
        let result2 = config.generate_refresh_token("uuid-123").unwrap();

        let claims1 = config.validate_refresh_token(&result1.token).unwrap();
        let claims2 = config.validate_refresh_token(&result2.token).unwrap();
        assert_ne!(claims1.jti, claims2.jti);
        assert_ne!(
            result1.token, result2.token,
            "Tokens minted in the same second must still differ"
        );
    }
}
