//! The cookie that carries the refresh token.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

pub(crate) const COOKIE_REFRESH_TOKEN: &str = "refreshToken";

/// Add the refresh token cookie to the cookie jar.
///
/// The cookie lasts for `max_age`, which should match the lifetime of the
/// refresh token. `secure` restricts the cookie to HTTPS.
///
/// Returns the cookie jar with the cookie added.
pub(crate) fn set_refresh_token_cookie(
    jar: PrivateCookieJar,
    refresh_token: String,
    max_age: Duration,
    secure: bool,
) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_REFRESH_TOKEN, refresh_token))
            .path("/")
            .max_age(max_age)
            .expires(OffsetDateTime::now_utc().saturating_add(max_age))
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(secure),
    )
}

/// Get the refresh token from the cookie jar, if there is one.
pub(crate) fn get_refresh_token_from_cookies(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(COOKIE_REFRESH_TOKEN)
        .map(|cookie| cookie.value_trimmed().to_owned())
        .filter(|token| !token.is_empty())
}

/// Set the refresh token cookie to an invalid value and set its max age to
/// zero, which should delete the cookie on the client side.
pub(crate) fn invalidate_refresh_token_cookie(
    jar: PrivateCookieJar,
    secure: bool,
) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_REFRESH_TOKEN, "deleted"))
            .path("/")
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(secure),
    )
}
