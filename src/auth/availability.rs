//! Checking whether an email or username can be registered.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, auth::AvailabilityResponse, json::ApiJson, user::is_identifier_taken,
};

/// The body of a check email request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckEmailRequest {
    /// The email to check.
    pub email: String,
}

/// The body of a check username request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckUsernameRequest {
    /// The username to check.
    pub username: String,
}

/// A route handler that reports whether no user has the given email.
pub async fn check_email(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CheckEmailRequest>,
) -> Result<Json<AvailabilityResponse>, Error> {
    let taken = is_identifier_taken(&request.email, &*state.db()?)?;

    Ok(Json(AvailabilityResponse { available: !taken }))
}

/// A route handler that reports whether no user has the given username.
pub async fn check_username(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CheckUsernameRequest>,
) -> Result<Json<AvailabilityResponse>, Error> {
    let taken = is_identifier_taken(&request.username, &*state.db()?)?;

    Ok(Json(AvailabilityResponse { available: !taken }))
}
