// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Bearer-token guard for the `/admin` routes.
//!
//! The token comes from `ADMIN_TOKEN`. When it is unset every admin request is
//! refused, so administrative endpoints are never open by accident.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::env;
use std::sync::Arc;
use tracing::warn;

/// Credential accepted by the admin routes
#[derive(Clone, Default)]
pub struct AdminToken(Option<String>);

impl AdminToken {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self(Some(token).filter(|t| !t.is_empty()))
    }

    /// No token: admin routes are disabled
    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn from_env() -> Self {
        match env::var("ADMIN_TOKEN") {
            Ok(token) => Self::new(token.trim()),
            Err(_) => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    fn check(&self, presented: &str) -> Result<(), AdminAuthError> {
        let expected = self.0.as_deref().ok_or(AdminAuthError::Disabled)?;
        if constant_time_eq(expected.as_bytes(), presented.as_bytes()) {
            Ok(())
        } else {
            Err(AdminAuthError::InvalidToken)
        }
    }
}

impl std::fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.is_enabled() { "set" } else { "unset" };
        f.debug_tuple("AdminToken").field(&state).finish()
    }
}

/// Admin auth error responses.
#[derive(Debug, PartialEq, Eq)]
pub enum AdminAuthError {
    MissingToken,
    InvalidToken,
    Disabled,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminAuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AdminAuthError::InvalidToken => (StatusCode::FORBIDDEN, "Invalid admin token"),
            AdminAuthError::Disabled => (StatusCode::FORBIDDEN, "Admin API is disabled"),
        };
        (status, message).into_response()
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Reject the request unless it carries the admin bearer token.
pub async fn admin_auth_middleware(
    State(token): State<Arc<AdminToken>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(presented) = extract_bearer_token(request.headers()) else {
        return AdminAuthError::MissingToken.into_response();
    };
    if let Err(e) = token.check(presented) {
        warn!(path = %request.uri().path(), error = ?e, "Admin request rejected");
        return e.into_response();
    }
    next.run(request).await
}
