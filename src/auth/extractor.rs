//! The extractor that guards endpoints behind a valid access token.

use axum::{
    RequestPartsExt,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    AppState, Error,
    auth::token::{Claims, TokenKind},
    user::{User, get_user_by_id},
};

/// The user making an authenticated request, along with the claims of the
/// access token they sent.
///
/// Extracting this from a request fails with a 401 response unless the
/// request has an `Authorization: Bearer <token>` header whose token:
/// - was signed with the access token secret and has not expired,
/// - has not been revoked by logging out,
/// - belongs to an active user,
/// - carries the user's current token version.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// The authenticated user.
    pub user: User,
    /// The claims of the access token used for the request.
    pub claims: Claims,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::MissingAccessToken)?;

        let state = AppState::from_ref(state);
        let claims = state.token_keys.decode(TokenKind::Access, bearer.token())?;

        if state.blacklist.contains(&claims.jti) {
            return Err(Error::TokenRevoked);
        }

        let user = match get_user_by_id(claims.sub, &*state.db()?) {
            Ok(user) => user,
            Err(Error::NotFound) => return Err(Error::AuthenticationFailed),
            Err(error) => return Err(error),
        };

        if user.is_deleted() || user.token_version != claims.token_version {
            return Err(Error::AuthenticationFailed);
        }

        Ok(Self { user, claims })
    }
}
