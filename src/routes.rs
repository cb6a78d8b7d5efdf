use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use http::{header, Method};
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::handlers;
use crate::handlers::sloths::MAX_SUBMISSION_BYTES;
use crate::middleware_layer;
use crate::state::AppState;

/// Builds the application router. Every route sits behind the
/// authentication middleware; handlers decide whether a user is required.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            "http://localhost:3000".parse().unwrap(),
            "http://127.0.0.1:3000".parse().unwrap(),
        ])
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::COOKIE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400));

    Router::new()
        .route(
            "/api/sloths",
            get(handlers::sloths::list_sloths).post(handlers::sloths::report_sloth),
        )
        .route("/api/sloths/{id}", get(handlers::sloths::sloth_detail))
        .route(
            "/api/sloths/{id}/sightings",
            post(handlers::sloths::submit_sighting),
        )
        .route(
            "/api/sightings/{id}",
            delete(handlers::sloths::delete_sighting),
        )
        .route("/auth/login/google", get(handlers::auth::google_login))
        .route(
            "/auth/login/google/callback",
            get(handlers::auth::google_callback),
        )
        .route("/auth/logout", post(handlers::auth::logout))
        .layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::authenticate,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(MAX_SUBMISSION_BYTES))
        .layer(cors)
        .with_state(state)
}
