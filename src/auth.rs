//! Basic authentication middleware.
//!
//! Gated by the optional `[auth]` configuration: a username/password map
//! and an optional list of wildcard route patterns. Without a `restrict`
//! list every route is gated, including the static asset mounts. Failures
//! answer 401 with a `Basic` challenge so browsers prompt for credentials.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::api::AppState;
use crate::config::AuthConfig;
use crate::paths::wildcard_expression;

const REALM: &str = "vitrine";

fn challenge() -> Response {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(
            header::WWW_AUTHENTICATE,
            format!("Basic realm=\"{REALM}\", charset=\"UTF-8\""),
        )
        .body(Body::from("Unauthorized"))
        .unwrap_or_else(|_| StatusCode::UNAUTHORIZED.into_response())
}

fn route_is_restricted(auth: &AuthConfig, path: &str) -> bool {
    match &auth.restrict {
        // No restriction list: everything is gated.
        None => true,
        Some(patterns) => patterns.iter().any(|pattern| {
            wildcard_expression(pattern)
                .map(|regex| regex.is_match(path))
                .unwrap_or(false)
        }),
    }
}

fn credentials_valid(auth: &AuthConfig, headers: &axum::http::HeaderMap) -> bool {
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };

    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };

    let Ok(pair) = String::from_utf8(decoded) else {
        return false;
    };

    let Some((user, password)) = pair.split_once(':') else {
        return false;
    };

    auth.users.get(user).is_some_and(|expected| expected == password)
}

/// Axum middleware applying the configured basic-auth policy.
pub async fn basic_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(auth) = &state.config.auth else {
        return next.run(req).await;
    };

    if !route_is_restricted(auth, req.uri().path()) {
        return next.run(req).await;
    }

    if credentials_valid(auth, req.headers()) {
        return next.run(req).await;
    }

    tracing::debug!(path = %req.uri().path(), "rejected unauthenticated request");
    challenge()
}
