//! Outgoing account emails.
//!
//! Emails are not actually delivered; [LogMailer] writes them to the log so
//! that the reset link can be copied out of the server output.

use std::fmt::Debug;

use time::OffsetDateTime;

use crate::user::Email;

/// Sends the emails the auth endpoints need.
pub trait Mailer: Debug + Send + Sync {
    /// Send the password reset link to `email`.
    fn send_password_reset(&self, email: &Email, reset_link: &str);

    /// Tell `email` that their password was changed at `changed_at`.
    ///
    /// `forgot_password_link` lets the owner reset the password if the change
    /// was not made by them.
    fn send_password_changed(
        &self,
        email: &Email,
        changed_at: OffsetDateTime,
        forgot_password_link: &str,
    );
}

/// A [Mailer] that logs emails instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_password_reset(&self, email: &Email, reset_link: &str) {
        tracing::info!(
            to = %email,
            "\n===== PASSWORD RESET EMAIL =====\n\
            Subject: Reset your password - Finance Manager\n\n\
            You asked to reset the password for your Finance Manager account.\n\
            Open the link below to choose a new password:\n\
            {reset_link}\n\n\
            This link expires in 15 minutes.\n\
            If you did not ask for a password reset you can ignore this email.\n\
            ================================"
        );
    }

    fn send_password_changed(
        &self,
        email: &Email,
        changed_at: OffsetDateTime,
        forgot_password_link: &str,
    ) {
        tracing::info!(
            to = %email,
            "\n===== PASSWORD CHANGED NOTIFICATION =====\n\
            Subject: Your password was changed - Finance Manager\n\n\
            The password for your Finance Manager account was changed at {changed_at}.\n\
            If you did not make this change, reset your password now at:\n\
            {forgot_password_link}\n\
            ========================================="
        );
    }
}

/// Build the link to the frontend page for resetting a password with `token`.
pub fn password_reset_link(frontend_url: &str, token: &str) -> String {
    format!(
        "{}/auth/reset-password?token={token}",
        frontend_url.trim_end_matches('/')
    )
}

/// Build the link to the frontend page for requesting a password reset.
pub fn forgot_password_link(frontend_url: &str) -> String {
    format!("{}/auth/forgot-password", frontend_url.trim_end_matches('/'))
}
