//! The JSON bodies returned by the auth endpoints.

use serde::{Deserialize, Serialize};

use crate::user::UserProfile;

/// Returned when a session starts, i.e., on registration and log-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// The access token to send as a bearer token.
    pub access_token: String,
    /// The user the session belongs to.
    pub user: UserProfile,
    /// A human readable message.
    pub message: String,
}

/// Returned when the refresh token cookie is exchanged for a new access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// The new access token.
    pub access_token: String,
}

/// A response that only carries a human readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// The message.
    pub message: String,
}

impl MessageResponse {
    /// Create a response with `message`.
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_owned(),
        }
    }
}

/// The body of the `me` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    /// The authenticated user.
    pub user: UserProfile,
}

/// Whether an email or username is free to register with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    /// `true` if no user has the email or username.
    pub available: bool,
}

/// Whether a password reset token can still be used, and if not, why not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateResetTokenResponse {
    /// Whether the token can be used to reset a password.
    pub valid: bool,
    /// Why the token cannot be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
