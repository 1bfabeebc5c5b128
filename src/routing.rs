//! Application router configuration.

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::{
    AppState, Error,
    auth::{
        change_password, check_email, check_username, forgot_password, get_me, log_in, log_out,
        refresh, register, reset_password, validate_reset_token,
    },
    endpoints,
};

/// Return a router with all the app's routes.
///
/// Routes that need an authenticated user take a
/// [CurrentUser](crate::auth::CurrentUser) argument, so the router itself
/// does not separate protected and unprotected routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::REGISTER, post(register))
        .route(endpoints::LOG_IN, post(log_in))
        .route(endpoints::REFRESH, post(refresh))
        .route(endpoints::LOG_OUT, post(log_out))
        .route(endpoints::ME, get(get_me))
        .route(endpoints::CHANGE_PASSWORD, patch(change_password))
        .route(endpoints::FORGOT_PASSWORD, post(forgot_password))
        .route(endpoints::VALIDATE_RESET_TOKEN, post(validate_reset_token))
        .route(endpoints::RESET_PASSWORD, post(reset_password))
        .route(endpoints::CHECK_EMAIL, post(check_email))
        .route(endpoints::CHECK_USERNAME, post(check_username))
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}
