use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use serde::Deserialize;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::{
    crypto::token::generate_session_token,
    error::{AppError, Result},
    middleware_layer::auth::{clear_session_cookie, session_cookie},
    models::session::AuthContext,
    models::user::{AuthProvider, NewUser},
    services::oauth::GoogleOAuth,
    services::sessions::{create_session, invalidate_session, session_expires_at},
    state::AppState,
};

const OAUTH_STATE_COOKIE: &str = "google_oauth_state";
const OAUTH_VERIFIER_COOKIE: &str = "google_code_verifier";
/// How long an in-flight OAuth round trip may take.
const OAUTH_FLOW_TTL_SECS: i64 = 600;

/// Builds a short-lived HttpOnly cookie carrying OAuth flow state.
fn oauth_flow_cookie(name: &'static str, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(OAUTH_FLOW_TTL_SECS));
    cookie.set_path("/");
    cookie
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_max_age(Duration::seconds(0));
    cookie.set_path("/");
    cookie
}

/// Starts the Google login flow.
#[axum::debug_handler]
pub async fn google_login(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Response> {
    let flow_state = GoogleOAuth::generate_state();
    let code_verifier = GoogleOAuth::generate_code_verifier();
    let code_challenge = GoogleOAuth::code_challenge(&code_verifier);

    let url = state.oauth.authorization_url(&flow_state, &code_challenge)?;

    cookies.add(oauth_flow_cookie(OAUTH_STATE_COOKIE, flow_state));
    cookies.add(oauth_flow_cookie(OAUTH_VERIFIER_COOKIE, code_verifier));

    Ok(Redirect::to(&url).into_response())
}

#[derive(Deserialize, Debug)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Completes the Google login flow: code exchange, user upsert, session.
#[axum::debug_handler]
pub async fn google_callback(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<CallbackQuery>,
) -> Result<Response> {
    let code = query
        .code
        .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;
    let returned_state = query
        .state
        .ok_or_else(|| AppError::Validation("Missing OAuth state".to_string()))?;
    let stored_state = cookies
        .get(OAUTH_STATE_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Validation("Missing OAuth state cookie".to_string()))?;
    let code_verifier = cookies
        .get(OAUTH_VERIFIER_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Validation("Missing OAuth verifier cookie".to_string()))?;

    // Flow cookies are single-use.
    cookies.remove(removal_cookie(OAUTH_STATE_COOKIE));
    cookies.remove(removal_cookie(OAUTH_VERIFIER_COOKIE));

    if returned_state != stored_state {
        return Err(AppError::Validation("OAuth state mismatch".to_string()));
    }

    let claims = state.oauth.exchange_code(&code, &code_verifier).await?;
    let display_name = claims.name.unwrap_or_else(|| "Sloth spotter".to_string());
    let avatar_url = claims.picture;

    let user = match state
        .users
        .find_by_provider(AuthProvider::Google, &claims.sub)
        .await?
    {
        Some(existing) => state
            .users
            .update_profile(existing.id, &display_name, avatar_url.as_deref())
            .await?
            .unwrap_or(existing),
        None => {
            let created = state
                .users
                .create(NewUser {
                    id: Uuid::new_v4(),
                    display_name,
                    avatar_url,
                    provider: AuthProvider::Google,
                    provider_id: claims.sub,
                })
                .await?;
            tracing::info!("✅ User created with ID: {}", created.id);
            created
        }
    };

    let token = generate_session_token();
    let session = create_session(&*state.kv, &token, user.id).await?;
    cookies.add(session_cookie(&token, session_expires_at(&session)));

    tracing::info!("✅ User logged in: {}", user.id);

    Ok(Redirect::to("/").into_response())
}

/// Logs the user out: invalidates the session and clears the credential.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    cookies: Cookies,
) -> Result<Response> {
    let session = context.session.as_ref().ok_or(AppError::AuthRequired)?;

    invalidate_session(&*state.kv, &session.id).await?;
    cookies.remove(clear_session_cookie());

    tracing::info!("👋 User logged out: {}", session.user_id);

    Ok(Redirect::to("/").into_response())
}
