//! The profile of the authenticated user.

use axum::Json;

use crate::{
    auth::{CurrentUser, ProfileResponse},
    user::UserProfile,
};

/// A route handler that returns the profile of the authenticated user.
pub async fn get_me(current_user: CurrentUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        user: UserProfile::from(&current_user.user),
    })
}
