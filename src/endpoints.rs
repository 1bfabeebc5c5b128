//! The API endpoints URIs.

/// Creates a new account and starts a session.
pub const REGISTER: &str = "/api/auth/register";
/// Starts a session with an email or username and a password.
pub const LOG_IN: &str = "/api/auth/login";
/// Exchanges the refresh token cookie for a new token pair.
pub const REFRESH: &str = "/api/auth/refresh";
/// Ends the current session.
pub const LOG_OUT: &str = "/api/auth/logout";
/// The profile of the authenticated user.
pub const ME: &str = "/api/auth/me";
/// Changes the password of the authenticated user.
pub const CHANGE_PASSWORD: &str = "/api/auth/change-password";
/// Emails a password reset link.
pub const FORGOT_PASSWORD: &str = "/api/auth/forgot-password";
/// Checks whether a password reset token can be used.
pub const VALIDATE_RESET_TOKEN: &str = "/api/auth/validate-reset-token";
/// Sets a new password using a password reset token.
pub const RESET_PASSWORD: &str = "/api/auth/reset-password";
/// Checks whether an email is free to register with.
pub const CHECK_EMAIL: &str = "/api/auth/check-email";
/// Checks whether a username is free to register with.
pub const CHECK_USERNAME: &str = "/api/auth/check-username";
