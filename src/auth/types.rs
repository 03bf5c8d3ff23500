/// Caller identity resolved from a valid access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    /// Row id of the account named by the token's `sub`.
    pub account_id: i64,
}
