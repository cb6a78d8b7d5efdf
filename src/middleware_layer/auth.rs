use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::Result,
    models::session::AuthContext,
    services::sessions::{session_expires_at, validate_session_token, SESSION_COOKIE_NAME},
    state::AppState,
};

/// Builds the credential cookie, bound to the session's current expiry.
pub fn session_cookie(token: &str, expires_at: DateTime<Utc>) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, token.to_string());

    let is_production = std::env::var("APP_ENV")
        .unwrap_or_else(|_| "development".to_string()) == "production";

    cookie.set_http_only(true);
    if is_production {
        cookie.set_secure(true);
    }
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);

    let remaining_secs = (expires_at - Utc::now()).num_seconds().max(0);
    cookie.set_max_age(Duration::seconds(remaining_secs));
    cookie.set_path("/");

    cookie
}

/// Builds the removal cookie that clears the client credential.
pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, "");
    cookie.set_max_age(Duration::seconds(0));
    cookie.set_path("/");
    cookie
}

/// Attaches an `AuthContext` to every request.
///
/// No cookie → anonymous. A cookie that resolves to a live session gets
/// the credential cookie re-set against the current expiry (renewal may
/// just have moved it); anything else gets the cookie cleared. Store
/// transport failures abort the request — serving a page with undecided
/// auth state is worse than failing it.
pub async fn authenticate(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let context = match cookies.get(SESSION_COOKIE_NAME) {
        None => AuthContext::anonymous(),
        Some(cookie) => {
            let token = cookie.value().to_string();
            let (session, user) =
                validate_session_token(&*state.kv, &*state.users, &token).await?;

            match &session {
                Some(session) => {
                    cookies.add(session_cookie(&token, session_expires_at(session)));
                }
                None => {
                    tracing::debug!("Clearing credential cookie for dead session");
                    cookies.remove(clear_session_cookie());
                }
            }

            AuthContext { session, user }
        }
    };

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}
