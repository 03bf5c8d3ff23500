//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::media::LocalMediaStore;
use crate::rate_limit::{DEFAULT_LOGIN_PER_MINUTE, DEFAULT_REGISTER_PER_MINUTE};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

const MIN_SECRET_LENGTH: usize = 32;

/// Longest accepted token lifetime: 365 days
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "channelhub", about = "User accounts and channel profiles")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, env = "DATABASE_PATH", default_value = "channelhub.db")]
    pub database: String,

    /// Directory where uploaded images are stored
    #[arg(long, env = "MEDIA_DIR", default_value = "public/media")]
    pub media_dir: PathBuf,

    /// Public URL of this server, used to build media URLs
    #[arg(long, env = "PUBLIC_URL", default_value = "http://localhost:8000")]
    pub public_url: String,

    /// Access token lifetime, e.g. "15m", "1h", "900s"
    #[arg(long, env = "ACCESS_TOKEN_EXPIRY", default_value = "15m", value_parser = parse_duration)]
    pub access_token_expiry: u64,

    /// Refresh token lifetime, e.g. "10d"
    #[arg(long, env = "REFRESH_TOKEN_EXPIRY", default_value = "10d", value_parser = parse_duration)]
    pub refresh_token_expiry: u64,

    /// File containing the access token secret. Prefer ACCESS_TOKEN_SECRET instead
    #[arg(long)]
    pub access_token_secret_file: Option<String>,

    /// File containing the refresh token secret. Prefer REFRESH_TOKEN_SECRET instead
    #[arg(long)]
    pub refresh_token_secret_file: Option<String>,

    /// Send cookies without the Secure flag (plain-HTTP local development)
    #[arg(long)]
    pub insecure_cookies: bool,

    /// Login attempts allowed per minute per client IP
    #[arg(long, default_value_t = DEFAULT_LOGIN_PER_MINUTE)]
    pub login_rate_per_minute: u32,

    /// Registrations allowed per minute per client IP
    #[arg(long, default_value_t = DEFAULT_REGISTER_PER_MINUTE)]
    pub register_rate_per_minute: u32,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Parse `<n>[s|m|h|d]` into seconds. A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, multiplier) = match s.char_indices().last() {
        Some((i, 's')) => (&s[..i], 1),
        Some((i, 'm')) => (&s[..i], 60),
        Some((i, 'h')) => (&s[..i], 60 * 60),
        Some((i, 'd')) => (&s[..i], 24 * 60 * 60),
        Some(_) => (s, 1),
        None => return Err("Duration cannot be empty".to_string()),
    };

    let n: u64 = digits
        .parse()
        .map_err(|_| format!("Invalid duration: {}", s))?;
    if n == 0 {
        return Err(format!("Duration must be positive: {}", s));
    }
    n.checked_mul(multiplier)
        .filter(|secs| *secs <= MAX_DURATION_SECS)
        .ok_or_else(|| format!("Duration is too large (at most 365d): {}", s))
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a token secret from `env_var` or from `file`.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or pass a secret file",
            env_var
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both token secrets. They must differ, so a refresh token can never
/// pass as an access token.
pub fn load_token_secrets(args: &Args) -> Option<(String, String)> {
    let access = load_secret("ACCESS_TOKEN_SECRET", args.access_token_secret_file.as_deref())?;
    let refresh = load_secret(
        "REFRESH_TOKEN_SECRET",
        args.refresh_token_secret_file.as_deref(),
    )?;

    if access == refresh {
        error!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must be different");
        return None;
    }
    Some((access, refresh))
}

/// Parse the public URL and derive the media base URL from it.
/// Returns None and logs an error if validation fails.
pub fn media_base_url(public_url: &str) -> Option<Url> {
    let url = match Url::parse(public_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %public_url, error = %e, "Invalid public URL");
            return None;
        }
    };

    if url.scheme() != "https" && url.host_str() != Some("localhost") {
        warn!(url = %public_url, "Public URL is not HTTPS");
    }

    // Trailing slash so `join` appends instead of replacing the last segment
    let base = format!("{}/media/", url.as_str().trim_end_matches('/'));
    match Url::parse(&base) {
        Ok(url) => Some(url),
        Err(e) => {
            error!(url = %base, error = %e, "Invalid media URL");
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    media_base: Url,
    access_secret: String,
    refresh_secret: String,
) -> ServerConfig {
    ServerConfig {
        db,
        media: Arc::new(LocalMediaStore::new(args.media_dir.clone(), media_base)),
        media_dir: args.media_dir.clone(),
        access_token_secret: access_secret.into_bytes(),
        refresh_token_secret: refresh_secret.into_bytes(),
        access_token_duration: args.access_token_expiry,
        refresh_token_duration: args.refresh_token_expiry,
        secure_cookies: !args.insecure_cookies,
        login_rate_per_minute: args.login_rate_per_minute,
        register_rate_per_minute: args.register_rate_per_minute,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{ACCESS_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS};

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("45s"), Ok(45));
        assert_eq!(parse_duration("15m"), Ok(900));
        assert_eq!(parse_duration("2h"), Ok(7200));
        assert_eq!(parse_duration("10d"), Ok(864_000));
        assert_eq!(parse_duration("120"), Ok(120));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("0m").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("5w").is_err());
        assert!(parse_duration("99999999999999999999d").is_err());
    }

    #[test]
    fn test_parse_duration_capped() {
        assert_eq!(parse_duration("365d"), Ok(MAX_DURATION_SECS));
        assert!(parse_duration("366d").is_err());
        assert!(parse_duration("18446744073709551615s").is_err());
        assert!(parse_duration("18446744073709551615").is_err());
    }

    #[test]
    fn test_cli_defaults_match_token_defaults() {
        let args = Args::parse_from(["channelhub"]);
        assert_eq!(
            (args.access_token_expiry, args.refresh_token_expiry),
            (ACCESS_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS)
        );
        assert!(!args.insecure_cookies);
    }

    #[test]
    fn test_media_base_url() {
        let url = media_base_url("http://localhost:8000").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/media/");

        let url = media_base_url("https://example.com/app/").unwrap();
        assert_eq!(url.join("x.png").unwrap().as_str(), "https://example.com/app/media/x.png");

        assert!(media_base_url("not a url").is_none());
    }
}
