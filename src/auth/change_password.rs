//! Changing the password of a logged in user.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, PasswordHash, ValidatedPassword,
    auth::{CurrentUser, MessageResponse, refresh_token::revoke_all_refresh_tokens},
    json::ApiJson,
    user::{bump_token_version, update_password},
};

/// The body of a change password request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// The password the user logged in with.
    pub current_password: String,
    /// The password to change to.
    pub new_password: String,
}

/// A route handler for changing the authenticated user's password.
///
/// Every session of the user ends, including the one used for the request:
/// the token version is bumped and all refresh tokens are revoked.
///
/// # Errors
///
/// Returns a 400 response if the current password is wrong, or the new
/// password is too weak or the same as the current one.
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, Error> {
    let new_password = ValidatedPassword::new(&request.new_password)?;

    if !current_user
        .user
        .password_hash
        .matches(&request.current_password)?
    {
        return Err(Error::IncorrectCurrentPassword);
    }

    if request.new_password == request.current_password {
        return Err(Error::SamePassword);
    }

    let password_hash = PasswordHash::new(new_password, state.auth_config.password_hash_cost)?;
    let user_id = current_user.user.id;

    {
        let mut connection = state.db()?;
        let transaction = connection.transaction()?;

        update_password(user_id, &password_hash, &transaction)?;
        bump_token_version(user_id, &transaction)?;
        revoke_all_refresh_tokens(user_id, &transaction)?;

        transaction.commit()?;
    }

    tracing::info!("User {user_id} changed their password");

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::{
        endpoints,
        test_utils::{TEST_PASSWORD, get_test_app_state, get_test_server, register_through_api},
    };

    const NEW_PASSWORD: &str = "Brand9NewPassword";

    #[tokio::test]
    async fn change_password_ends_sessions_and_allows_new_log_in() {
        let server = get_test_server(get_test_app_state());
        let (registered, cookie) = register_through_api(&server, "foo@bar.baz", "foo").await;

        let response = server
            .patch(endpoints::CHANGE_PASSWORD)
            .authorization_bearer(&registered.access_token)
            .json(&json!({ "currentPassword": TEST_PASSWORD, "newPassword": NEW_PASSWORD }))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>()["message"],
            "Password changed successfully"
        );

        server
            .get(endpoints::ME)
            .authorization_bearer(&registered.access_token)
            .await
            .assert_status_unauthorized();
        server
            .post(endpoints::REFRESH)
            .add_cookie(cookie)
            .await
            .assert_status_bad_request();
        server
            .post(endpoints::LOG_IN)
            .json(&json!({ "emailOrUsername": "foo", "password": TEST_PASSWORD }))
            .await
            .assert_status_unauthorized();
        server
            .post(endpoints::LOG_IN)
            .json(&json!({ "emailOrUsername": "foo", "password": NEW_PASSWORD }))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn change_password_fails_with_wrong_current_password() {
        let server = get_test_server(get_test_app_state());
        let (registered, _) = register_through_api(&server, "foo@bar.baz", "foo").await;

        let response = server
            .patch(endpoints::CHANGE_PASSWORD)
            .authorization_bearer(&registered.access_token)
            .json(&json!({ "currentPassword": "Wrong1Password", "newPassword": NEW_PASSWORD }))
            .await;

        response.assert_status_bad_request();
        assert_eq!(
            response.json::<Value>()["message"],
            "The current password is incorrect"
        );
    }

    #[tokio::test]
    async fn change_password_fails_with_same_password() {
        let server = get_test_server(get_test_app_state());
        let (registered, _) = register_through_api(&server, "foo@bar.baz", "foo").await;

        let response = server
            .patch(endpoints::CHANGE_PASSWORD)
            .authorization_bearer(&registered.access_token)
            .json(&json!({ "currentPassword": TEST_PASSWORD, "newPassword": TEST_PASSWORD }))
            .await;

        response.assert_status_bad_request();
        assert_eq!(
            response.json::<Value>()["message"],
            "The new password must be different from the current password"
        );
    }

    #[tokio::test]
    async fn change_password_fails_with_weak_password() {
        let server = get_test_server(get_test_app_state());
        let (registered, _) = register_through_api(&server, "foo@bar.baz", "foo").await;

        server
            .patch(endpoints::CHANGE_PASSWORD)
            .authorization_bearer(&registered.access_token)
            .json(&json!({ "currentPassword": TEST_PASSWORD, "newPassword": "weak" }))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn change_password_requires_access_token() {
        let server = get_test_server(get_test_app_state());

        server
            .patch(endpoints::CHANGE_PASSWORD)
            .json(&json!({ "currentPassword": TEST_PASSWORD, "newPassword": NEW_PASSWORD }))
            .await
            .assert_status_unauthorized();
    }
}
