//! Settings for token lifetimes, cookies and outgoing links.

use time::Duration;

use crate::PasswordHash;

/// How long access tokens are valid for by default.
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::minutes(15);
/// How long refresh tokens are valid for by default.
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::days(7);
/// How long a password reset link stays valid.
pub const PASSWORD_RESET_TTL: Duration = Duration::minutes(15);
/// The longest lifetime [parse_duration] accepts.
pub const MAX_DURATION: Duration = Duration::days(365);
/// The frontend that password reset links point to when none is configured.
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3002";

/// Settings for the auth endpoints.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// How long access tokens are valid for.
    pub access_token_ttl: Duration,
    /// How long refresh tokens (and the refresh token cookie) are valid for.
    pub refresh_token_ttl: Duration,
    /// How long password reset tokens are valid for.
    pub password_reset_ttl: Duration,
    /// The bcrypt cost used when hashing new passwords.
    pub password_hash_cost: u32,
    /// The base URL of the frontend, used to build password reset links.
    pub frontend_url: String,
    /// Whether the refresh token cookie should only be sent over HTTPS.
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
            password_reset_ttl: PASSWORD_RESET_TTL,
            password_hash_cost: PasswordHash::DEFAULT_COST,
            frontend_url: DEFAULT_FRONTEND_URL.to_owned(),
            secure_cookies: true,
        }
    }
}

/// Parse a duration such as "15m", "7d" or "3600".
///
/// The supported units are `s` (seconds), `m` (minutes), `h` (hours) and `d`
/// (days). A number without a unit is interpreted as seconds.
///
/// # Errors
///
/// Returns a description of the problem if `text` is empty, has an unknown
/// unit, its number is not a positive integer or it is longer than
/// [MAX_DURATION].
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim();

    let (number, unit) = match text.char_indices().last() {
        Some((index, unit)) if unit.is_ascii_alphabetic() => (&text[..index], Some(unit)),
        Some(_) => (text, None),
        None => return Err("duration cannot be empty".to_owned()),
    };

    let amount: i64 = number
        .parse()
        .map_err(|_| format!("\"{text}\" is not a valid duration"))?;

    if amount <= 0 {
        return Err(format!("duration \"{text}\" must be greater than zero"));
    }

    let seconds_per_unit = match unit {
        None | Some('s') => 1,
        Some('m') => 60,
        Some('h') => 60 * 60,
        Some('d') => 24 * 60 * 60,
        Some(other) => {
            return Err(format!(
                "unknown duration unit '{other}' in \"{text}\", expected one of s, m, h or d"
            ));
        }
    };

    amount
        .checked_mul(seconds_per_unit)
        .map(Duration::seconds)
        .filter(|duration| *duration <= MAX_DURATION)
        .ok_or_else(|| format!("duration \"{text}\" must not be longer than {MAX_DURATION}"))
}
