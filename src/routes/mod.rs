use std::sync::Arc;

use axum::{routing::get, Router};
use http::HeaderValue;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware;
use crate::AppState;

pub mod auth;
pub mod extract;
pub mod health;
pub mod trips;

/// Build the application router.
///
/// `auth_routes` is passed in so the caller can wrap the public auth
/// endpoints in a rate limiter.
pub fn app(state: Arc<AppState>, auth_routes: Router<Arc<AppState>>) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config.server.cors_allowed_origin)?;

    let router = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Registration, login, current account
        .nest("/auth", auth_routes)
        // Trips, itinerary and sharing
        .nest("/trips", trips::router())
        .with_state(state)
        .layer(axum::middleware::from_fn(
            middleware::security_headers::security_headers,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    Ok(router)
}

fn cors_layer(allowed_origin: &str) -> anyhow::Result<CorsLayer> {
    let methods = [
        http::Method::GET,
        http::Method::POST,
        http::Method::OPTIONS,
    ];
    let headers = [
        http::header::CONTENT_TYPE,
        http::header::AUTHORIZATION,
        http::header::ACCEPT,
    ];

    // Credentials travel in the Authorization header, never in cookies, so a
    // wildcard origin does not need `allow_credentials`.
    if allowed_origin == "*" {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers));
    }

    let origin = allowed_origin
        .parse::<HeaderValue>()
        .map_err(|_| anyhow::anyhow!("Invalid CORS_ALLOWED_ORIGIN: {}", allowed_origin))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true))
}
