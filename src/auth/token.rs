//! JSON Web Tokens for authenticating requests and refreshing sessions.

use std::fmt::Debug;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    Error,
    user::{Email, User, UserID},
};

/// Which of the two token types a JWT is.
///
/// Access and refresh tokens are signed with different secrets so that one
/// can never be used in place of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A short-lived token sent as a bearer token with each request.
    Access,
    /// A long-lived token kept in a cookie and exchanged for new tokens.
    Refresh,
}

/// The contents of a JSON Web Token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// The ID of the user the token was issued to.
    pub sub: UserID,
    /// The email of the user the token was issued to.
    pub email: Email,
    /// The user's token version at the time the token was issued.
    pub token_version: i64,
    /// A unique ID for this token.
    pub jti: String,
    /// The time the token was issued as a unix timestamp.
    pub iat: i64,
    /// The expiry time of the token as a unix timestamp.
    pub exp: i64,
}

impl Claims {
    /// Create the claims for a token issued to `user` at `issued_at` that
    /// lasts for `ttl`.
    pub fn new(user: &User, issued_at: OffsetDateTime, ttl: Duration) -> Self {
        Self {
            sub: user.id,
            email: user.email.clone(),
            token_version: user.token_version,
            jti: Uuid::new_v4().to_string(),
            iat: issued_at.unix_timestamp(),
            exp: issued_at.saturating_add(ttl).unix_timestamp(),
        }
    }

    /// The expiry time of the token.
    pub fn expires_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.exp).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

#[derive(Clone)]
struct KeyPair {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// The keys for signing and verifying access and refresh tokens.
#[derive(Clone)]
pub struct TokenKeys {
    access: KeyPair,
    refresh: KeyPair,
}

impl Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

impl TokenKeys {
    /// Create the signing keys from the secrets for access and refresh tokens.
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        Self {
            access: KeyPair::from_secret(access_secret),
            refresh: KeyPair::from_secret(refresh_secret),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Sign `claims` as a token of type `kind`.
    ///
    /// # Errors
    ///
    /// Returns [Error::TokenCreation] if the token could not be signed.
    pub fn encode(&self, kind: TokenKind, claims: &Claims) -> Result<String, Error> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.keys(kind).encoding_key,
        )
        .map_err(|error| Error::TokenCreation(error.to_string()))
    }

    /// Verify a token of type `kind` and return its claims.
    ///
    /// # Errors
    ///
    /// For access tokens, returns [Error::TokenExpired] if the token has
    /// expired and [Error::InvalidToken] for any other problem. For refresh
    /// tokens, every problem is reported as [Error::InvalidRefreshToken].
    pub fn decode(&self, kind: TokenKind, token: &str) -> Result<Claims, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.keys(kind).decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|error| match (kind, error.kind()) {
                (TokenKind::Refresh, _) => Error::InvalidRefreshToken,
                (TokenKind::Access, ErrorKind::ExpiredSignature) => Error::TokenExpired,
                (TokenKind::Access, _) => Error::InvalidToken,
            })
    }
}

/// Hash a token for storage so that a leaked database does not leak usable tokens.
pub(crate) fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}
