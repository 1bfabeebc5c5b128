//! Creating new accounts.

use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

use crate::{
    AppState, Error, PasswordHash, ValidatedPassword,
    auth::{
        AuthResponse, cookie::set_refresh_token_cookie, session::start_session,
    },
    json::ApiJson,
    user::{
        Email, FullName, NewUser, UserProfile, Username, create_user, is_identifier_taken,
    },
};

/// The data for registering a new account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// The email to register with.
    pub email: String,
    /// The username to register with.
    pub username: String,
    /// The password in plain text.
    pub password: String,
    /// The user's full name, if they want to give one.
    #[serde(default)]
    pub full_name: Option<String>,
}

struct ValidatedRegistration {
    email: Email,
    username: Username,
    full_name: Option<FullName>,
    password: ValidatedPassword,
}

fn validate(request: &RegisterRequest) -> Result<ValidatedRegistration, Error> {
    let full_name = match request.full_name.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => Some(FullName::new(name)?),
    };

    Ok(ValidatedRegistration {
        email: Email::new(&request.email)?,
        username: Username::new(&request.username)?,
        full_name,
        password: ValidatedPassword::new(&request.password)?,
    })
}

/// A route handler for registering a new account.
///
/// On success the new user is logged in: the response carries an access
/// token and sets the refresh token cookie.
///
/// # Errors
///
/// Returns a 400 response if a field is invalid and a 409 response if the
/// email or username is already in use.
pub async fn register(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, PrivateCookieJar, Json<AuthResponse>), Error> {
    let registration = validate(&request)?;

    {
        let connection = state.db()?;

        if is_identifier_taken(registration.email.as_str(), &connection)? {
            return Err(Error::DuplicateEmail);
        }

        if is_identifier_taken(registration.username.as_str(), &connection)? {
            return Err(Error::DuplicateUsername);
        }
    }

    let password_hash = PasswordHash::new(
        registration.password,
        state.auth_config.password_hash_cost,
    )?;

    let (user, session) = {
        let mut connection = state.db()?;
        let transaction = connection.transaction()?;

        let user = create_user(
            NewUser {
                email: registration.email,
                username: registration.username,
                full_name: registration.full_name,
                password_hash,
            },
            &transaction,
        )?;
        let session = start_session(&user, &state.token_keys, &state.auth_config, &transaction)?;

        transaction.commit()?;

        (user, session)
    };

    tracing::info!("Registered user {}", user.id);

    let jar = set_refresh_token_cookie(
        jar,
        session.refresh_token,
        state.auth_config.refresh_token_ttl,
        state.auth_config.secure_cookies,
    );

    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            access_token: session.access_token,
            user: UserProfile::from(&user),
            message: "Registration successful".to_owned(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        auth::AuthResponse,
        endpoints,
        test_utils::{TEST_PASSWORD, get_test_app_state, get_test_server, register_through_api},
    };

    #[tokio::test]
    async fn register_returns_token_user_and_cookie() {
        let server = get_test_server(get_test_app_state());

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({
                "email": "  Foo@Bar.baz ",
                "username": "foo_bar",
                "password": TEST_PASSWORD,
                "fullName": "Foo Bar",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: AuthResponse = response.json();
        assert!(!body.access_token.is_empty());
        assert_eq!(body.user.email.as_str(), "foo@bar.baz");
        assert_eq!(body.user.username.unwrap().as_str(), "foo_bar");
        assert_eq!(body.user.full_name.unwrap().as_str(), "Foo Bar");
        assert_eq!(body.message, "Registration successful");

        let cookie = response.cookie("refreshToken");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[tokio::test]
    async fn user_json_omits_password() {
        let server = get_test_server(get_test_app_state());

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({
                "email": "foo@bar.baz",
                "username": "foo",
                "password": TEST_PASSWORD,
            }))
            .await;

        let body: Value = response.json();
        let user = body["user"].as_object().unwrap();
        assert!(!user.contains_key("password"));
        assert!(!user.contains_key("passwordHash"));
        assert!(user.contains_key("createdAt"));
    }

    #[tokio::test]
    async fn register_fails_with_duplicate_email() {
        let server = get_test_server(get_test_app_state());
        register_through_api(&server, "foo@bar.baz", "foo").await;

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({
                "email": "FOO@bar.baz",
                "username": "other",
                "password": TEST_PASSWORD,
            }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["message"], "Email is already in use");
    }

    #[tokio::test]
    async fn register_fails_with_duplicate_username() {
        let server = get_test_server(get_test_app_state());
        register_through_api(&server, "foo@bar.baz", "foo").await;

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({
                "email": "other@bar.baz",
                "username": "foo",
                "password": TEST_PASSWORD,
            }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(
            response.json::<Value>()["message"],
            "Username is already in use"
        );
    }

    #[tokio::test]
    async fn register_fails_with_weak_password() {
        let server = get_test_server(get_test_app_state());

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({
                "email": "foo@bar.baz",
                "username": "foo",
                "password": "alllowercase1",
            }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn register_fails_with_invalid_email_or_username() {
        let server = get_test_server(get_test_app_state());

        server
            .post(endpoints::REGISTER)
            .json(&json!({
                "email": "not-an-email",
                "username": "foo",
                "password": TEST_PASSWORD,
            }))
            .await
            .assert_status_bad_request();

        server
            .post(endpoints::REGISTER)
            .json(&json!({
                "email": "foo@bar.baz",
                "username": "no spaces allowed",
                "password": TEST_PASSWORD,
            }))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn register_fails_with_missing_fields() {
        let server = get_test_server(get_test_app_state());

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({ "email": "foo@bar.baz" }))
            .await;

        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["statusCode"], 400);
    }
}
