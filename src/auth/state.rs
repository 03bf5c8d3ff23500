//! Authentication state trait and macro.

use crate::db::Database;
use crate::jwt::JwtConfig;

/// State types that can authenticate requests.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
}

/// Implement [`HasAuthBackend`] for a state struct with `jwt: Arc<JwtConfig>`
/// and `db: Database` fields.
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
        }
    };
}
