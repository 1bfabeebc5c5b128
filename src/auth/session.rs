//! Issuing the access and refresh token pair that makes up a session.

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AuthConfig, Error,
    auth::{
        refresh_token::store_refresh_token,
        token::{Claims, TokenKeys, TokenKind},
    },
    user::User,
};

/// A freshly issued token pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The signed access token.
    pub access_token: String,
    /// The signed refresh token. Only its hash is stored.
    pub refresh_token: String,
}

/// Issue an access and refresh token to `user` and store the refresh token.
///
/// `user` must carry the user's current token version, otherwise the access
/// token will be rejected.
///
/// # Errors
///
/// Returns [Error::TokenCreation] if a token could not be signed, or a
/// [Error::SqlError] if the refresh token could not be stored.
pub fn start_session(
    user: &User,
    token_keys: &TokenKeys,
    config: &AuthConfig,
    connection: &Connection,
) -> Result<Session, Error> {
    let now = OffsetDateTime::now_utc();

    let access_claims = Claims::new(user, now, config.access_token_ttl);
    let refresh_claims = Claims::new(user, now, config.refresh_token_ttl);

    let access_token = token_keys.encode(TokenKind::Access, &access_claims)?;
    let refresh_token = token_keys.encode(TokenKind::Refresh, &refresh_claims)?;

    store_refresh_token(
        user.id,
        &refresh_token,
        refresh_claims.expires_at(),
        connection,
    )?;

    Ok(Session {
        access_token,
        refresh_token,
    })
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use crate::{
        AuthConfig, TokenKeys,
        auth::{
            refresh_token::get_refresh_token,
            session::start_session,
            token::TokenKind,
        },
        db::initialize,
        test_utils::insert_test_user,
    };

    #[test]
    fn issues_both_tokens_and_stores_refresh_token() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = insert_test_user(&connection, "foo@bar.baz", "foo");
        let keys = TokenKeys::new("access", "refresh");

        let session = start_session(&user, &keys, &AuthConfig::default(), &connection).unwrap();

        let access_claims = keys.decode(TokenKind::Access, &session.access_token).unwrap();
        let refresh_claims = keys.decode(TokenKind::Refresh, &session.refresh_token).unwrap();
        assert_eq!(access_claims.sub, user.id);
        assert_eq!(refresh_claims.sub, user.id);
        assert_ne!(access_claims.jti, refresh_claims.jti);

        let record = get_refresh_token(&session.refresh_token, &connection).unwrap();
        assert_eq!(record.user_id, user.id);
        assert_eq!(record.expires_at, refresh_claims.expires_at());
        assert!(!record.is_revoked);
    }
}
