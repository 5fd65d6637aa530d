//! Request identity extractor.
//!
//! Quotas and job listings are keyed by identity, but the service does not
//! require accounts: a valid Bearer token binds the request to its `sub`
//! claim, no token at all binds it to an anonymous per-IP identity, and a
//! token that is present but invalid is rejected with 401 rather than
//! silently downgraded to anonymous.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use stemd_core::error::CoreError;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Who is making this request, as used for quota accounting and job
/// ownership.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Stable user identifier: the token's `sub`, or `anon:<ip>`.
    pub user_id: String,
    /// Client IP, recorded on jobs for abuse tracing.
    pub ip_address: Option<String>,
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ip_address = client_ip(parts);

        let Some(auth_header) = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        else {
            let ip = ip_address.as_deref().unwrap_or("unknown");
            return Ok(Identity {
                user_id: format!("anon:{ip}"),
                ip_address,
            });
        };

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        Ok(Identity {
            user_id: claims.sub,
            ip_address,
        })
    }
}

/// Client IP from `X-Forwarded-For` (first hop) when behind a proxy,
/// falling back to the socket peer address.
fn client_ip(parts: &Parts) -> Option<String> {
    if let Some(forwarded) = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}
