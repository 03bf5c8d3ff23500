//! Authenticated identity for API routes.
//!
//! Requests carry a short-lived access token, either in the `accessToken`
//! cookie or as `Authorization: Bearer <token>`. Access tokens are validated
//! statelessly; the account they name is then loaded so handlers always work
//! with a live account id. Refresh tokens never authenticate a request on
//! their own; they are only accepted by the refresh endpoint.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, session_cookie,
};
pub use errors::ApiAuthError;
pub use extractors::{ApiAuth, MaybeAuth};
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
