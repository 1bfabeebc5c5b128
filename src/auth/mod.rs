//! Registration, log-in, sessions and password management.

mod availability;
mod blacklist;
mod change_password;
mod cookie;
mod extractor;
mod forgot_password;
mod housekeeping;
mod log_in;
mod log_out;
mod me;
mod password_reset;
mod refresh;
mod refresh_token;
mod register;
mod response;
mod session;
mod token;

pub use availability::{check_email, check_username};
pub use blacklist::AccessTokenBlacklist;
pub use change_password::change_password;
pub use extractor::CurrentUser;
pub use forgot_password::{forgot_password, reset_password, validate_reset_token};
pub use housekeeping::prune_expired_tokens;
pub use log_in::log_in;
pub use log_out::log_out;
pub use me::get_me;
pub use refresh::refresh;
pub use refresh_token::revoke_all_refresh_tokens;
pub use register::register;
pub use response::{
    AuthResponse, AvailabilityResponse, MessageResponse, ProfileResponse, RefreshResponse,
    ValidateResetTokenResponse,
};
pub use token::TokenKeys;

pub(crate) use password_reset::create_password_reset_table;
pub(crate) use refresh_token::create_refresh_token_table;
