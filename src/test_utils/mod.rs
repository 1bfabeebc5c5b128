#![allow(missing_docs)]

use std::sync::{Arc, Mutex};

use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    AppState, AuthConfig, PasswordHash, TokenKeys, ValidatedPassword,
    auth::AuthResponse,
    build_router, endpoints,
    mail::Mailer,
    user::{Email, NewUser, User, UserID, Username, create_user, soft_delete_user},
};

/// The password of every user created by the helpers in this module.
pub(crate) const TEST_PASSWORD: &str = "Hunter2Password";

/// The lowest cost bcrypt accepts, which keeps the tests fast.
pub(crate) const TEST_HASH_COST: u32 = 4;

/// An email captured by [RecordingMailer].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SentMail {
    PasswordReset { to: Email, reset_link: String },
    PasswordChanged { to: Email },
}

/// A [Mailer] that keeps every email so tests can inspect them.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingMailer {
    sent: Arc<Mutex<Vec<SentMail>>>,
}

impl RecordingMailer {
    pub(crate) fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    /// The token from the most recent password reset link.
    pub(crate) fn last_reset_token(&self) -> Option<String> {
        self.sent().into_iter().rev().find_map(|mail| match mail {
            SentMail::PasswordReset { reset_link, .. } => reset_link
                .split_once("token=")
                .map(|(_, token)| token.to_owned()),
            SentMail::PasswordChanged { .. } => None,
        })
    }
}

impl Mailer for RecordingMailer {
    fn send_password_reset(&self, email: &Email, reset_link: &str) {
        self.sent.lock().unwrap().push(SentMail::PasswordReset {
            to: email.clone(),
            reset_link: reset_link.to_owned(),
        });
    }

    fn send_password_changed(
        &self,
        email: &Email,
        _changed_at: OffsetDateTime,
        _forgot_password_link: &str,
    ) {
        self.sent
            .lock()
            .unwrap()
            .push(SentMail::PasswordChanged { to: email.clone() });
    }
}

pub(crate) fn get_test_auth_config() -> AuthConfig {
    AuthConfig {
        password_hash_cost: TEST_HASH_COST,
        secure_cookies: false,
        ..AuthConfig::default()
    }
}

/// App state backed by an in-memory database and a [RecordingMailer].
pub(crate) fn get_test_app_state_with_mailer() -> (AppState, RecordingMailer) {
    let mailer = RecordingMailer::default();
    let state = AppState::new(
        Connection::open_in_memory().expect("Could not open in-memory SQLite database"),
        "foobar",
        TokenKeys::new("test-access-secret", "test-refresh-secret"),
        get_test_auth_config(),
        Arc::new(mailer.clone()),
    )
    .expect("Could not create app state");

    (state, mailer)
}

pub(crate) fn get_test_app_state() -> AppState {
    get_test_app_state_with_mailer().0
}

pub(crate) fn get_test_server(state: AppState) -> TestServer {
    TestServer::try_new(build_router(state)).expect("Could not create test server.")
}

/// Insert a user with the password [TEST_PASSWORD] directly into the database.
pub(crate) fn insert_test_user(connection: &Connection, email: &str, username: &str) -> User {
    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked(TEST_PASSWORD),
        TEST_HASH_COST,
    )
    .expect("Could not hash password");

    create_user(
        NewUser {
            email: Email::new(email).expect("Invalid test email"),
            username: Username::new(username).expect("Invalid test username"),
            full_name: None,
            password_hash,
        },
        connection,
    )
    .expect("Could not create test user")
}

/// Soft-delete the user `user_id`.
pub(crate) fn deactivate_user(connection: &Connection, user_id: UserID) {
    soft_delete_user(user_id, connection).expect("Could not deactivate user");
}

/// Register `email`/`username` with [TEST_PASSWORD] through the API.
///
/// Returns the response body and the refresh token cookie.
pub(crate) async fn register_through_api(
    server: &TestServer,
    email: &str,
    username: &str,
) -> (AuthResponse, axum_extra::extract::cookie::Cookie<'static>) {
    let response = server
        .post(endpoints::REGISTER)
        .json(&json!({
            "email": email,
            "username": username,
            "password": TEST_PASSWORD,
        }))
        .await;

    response.assert_status(axum::http::StatusCode::CREATED);

    let cookie = response.cookie("refreshToken");

    (response.json(), cookie)
}
