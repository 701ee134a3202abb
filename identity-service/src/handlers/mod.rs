pub mod biometric;
pub mod health;
pub mod internal;
pub mod metrics;
pub mod token;
pub mod user;
pub mod well_known;

use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::models::{CookiePolicy, SameSitePolicy};

pub const ACCESS_TOKEN_COOKIE: &str = "AT";
pub const REFRESH_TOKEN_COOKIE: &str = "RT";

/// Build a token cookie per the tenant's cookie policy, mirroring the token
/// value exactly.
pub(crate) fn token_cookie(
    name: &'static str,
    value: String,
    policy: &CookiePolicy,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_domain(policy.domain.clone());
    cookie.set_path(policy.path.clone());
    cookie.set_same_site(match policy.same_site {
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::None => SameSite::None,
    });
    cookie.set_secure(policy.secure);
    cookie.set_http_only(policy.http_only);
    cookie
}

/// Cookie with an empty value, used to clear `AT`/`RT` on rejected refresh.
pub(crate) fn cleared_cookie(
    name: &'static str,
    policy: Option<&CookiePolicy>,
) -> Cookie<'static> {
    match policy {
        Some(policy) => token_cookie(name, String::new(), policy),
        None => Cookie::new(name, String::new()),
    }
}
