//! Finance Manager is a web app for tracking wallets, transactions and budgets.
//!
//! This library provides the REST API, most importantly the authentication
//! and session lifecycle: registration, log-in, JWT access and refresh tokens,
//! refresh-token rotation, password resets and access-token revocation.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod auth;
mod config;
mod db;
mod endpoints;
mod json;
mod logging;
mod mail;
mod password;
mod routing;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{AccessTokenBlacklist, TokenKeys, prune_expired_tokens, revoke_all_refresh_tokens};
pub use config::{AuthConfig, parse_duration};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use mail::{LogMailer, Mailer};
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use user::{
    Email, User, UserID, UserPage, bump_token_version, get_user_by_email_or_username, list_users,
    soft_delete_user, update_password,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email/username and password combination did not match a user.
    ///
    /// The same error is used for an unknown user and a wrong password so
    /// that clients cannot probe which accounts exist.
    #[error("incorrect email/username or password")]
    InvalidCredentials,

    /// The account has been soft-deleted.
    #[error("this account has been deactivated")]
    AccountDisabled,

    /// The email is already used by another account.
    #[error("email is already in use")]
    DuplicateEmail,

    /// The username is already used by another account.
    #[error("username is already in use")]
    DuplicateUsername,

    /// The email address is not well formed.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    /// The username does not follow the username rules.
    #[error("{0}")]
    InvalidUsername(String),

    /// The full name is too long.
    #[error("{0}")]
    InvalidFullName(String),

    /// The user provided a password that does not follow the password rules.
    #[error("{0}")]
    TooWeak(String),

    /// The current password given when changing passwords was wrong.
    #[error("the current password is incorrect")]
    IncorrectCurrentPassword,

    /// The new password is the same as the current one.
    #[error("the new password must be different from the current password")]
    SamePassword,

    /// The request body could not be parsed.
    #[error("invalid request body: {0}")]
    InvalidRequestBody(String),

    /// The request did not carry a bearer token.
    #[error("no token provided")]
    MissingAccessToken,

    /// The access token is past its expiry.
    #[error("token has expired")]
    TokenExpired,

    /// The access token could not be decoded or verified.
    #[error("invalid token")]
    InvalidToken,

    /// The access token was blacklisted, e.g., by logging out.
    #[error("token has been revoked")]
    TokenRevoked,

    /// The access token was valid but its user no longer exists, was
    /// deactivated, or has invalidated all of their tokens.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The refresh token cookie is missing.
    #[error("refresh token not found")]
    MissingRefreshToken,

    /// The refresh token is unknown, revoked, expired or otherwise invalid.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// The password reset token is unknown, used, expired or belongs to an
    /// inactive user.
    #[error("{0}")]
    InvalidResetToken(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A JWT could not be signed.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.username") =>
            {
                Error::DuplicateUsername
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidRequestBody(rejection.body_text())
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials
            | Error::AccountDisabled
            | Error::MissingAccessToken
            | Error::TokenExpired
            | Error::InvalidToken
            | Error::TokenRevoked
            | Error::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            Error::DuplicateEmail | Error::DuplicateUsername => StatusCode::CONFLICT,
            Error::InvalidEmail(_)
            | Error::InvalidUsername(_)
            | Error::InvalidFullName(_)
            | Error::TooWeak(_)
            | Error::IncorrectCurrentPassword
            | Error::SamePassword
            | Error::InvalidRequestBody(_)
            | Error::MissingRefreshToken
            | Error::InvalidRefreshToken
            | Error::InvalidResetToken(_) => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::HashingError(_)
            | Error::TokenCreation(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Any internal errors are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, please try again later.".to_owned()
        } else {
            capitalise_first_char(&self.to_string())
        };

        let body = Json(json!({
            "statusCode": status.as_u16(),
            "message": message,
            "error": status.canonical_reason().unwrap_or_default(),
        }));

        (status, body).into_response()
    }
}

pub(crate) fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}
