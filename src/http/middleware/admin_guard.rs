//! Admin authentication for mutating endpoints.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::http::server::AppState;

/// Identity of an authenticated caller.
///
/// Placed on the request for handlers and copied onto the response so the
/// trace recorder, which only sees the response, can attribute the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i64,
}

pub async fn admin_guard(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state.config.admin.api_key.as_str();
    let authorized = !expected.is_empty()
        && request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected);

    if !authorized {
        tracing::warn!(path = %request.uri().path(), "Rejected admin request");
        return Err(ApiError::Status {
            status: StatusCode::UNAUTHORIZED,
            message: "Missing or invalid admin token".to_string(),
        });
    }

    let user = AuthenticatedUser {
        id: state.config.admin.user_id,
    };
    request.extensions_mut().insert(user);

    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    Ok(response)
}
