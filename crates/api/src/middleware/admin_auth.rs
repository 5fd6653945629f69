//! Admin JWT authentication middleware.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use domain::models::admin::ADMIN_ROLE;
use shared::jwt::JwtConfig;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// Authenticated administrator extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    pub admin_id: Uuid,
    pub email: String,
    /// JWT ID (jti) of the presented token.
    pub jti: String,
}

impl AdminAuth {
    /// Validates a token and requires the admin role.
    pub fn validate(jwt: &JwtConfig, token: &str) -> Result<Self, ApiError> {
        let claims = jwt.validate(token)?;
        if claims.role != ADMIN_ROLE {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }

        Ok(AdminAuth {
            admin_id: claims.admin_id()?,
            email: claims.email,
            jti: claims.jti,
        })
    }

    /// Reads the bearer token from the Authorization header.
    pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ApiError::Unauthorized("Missing or invalid Authorization header".to_string())
            })
    }
}

/// Middleware that requires a valid admin token.
///
/// The authenticated admin is stored in request extensions for handlers.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth = match AdminAuth::bearer_token(req.headers())
        .and_then(|token| AdminAuth::validate(&state.jwt, token))
    {
        Ok(auth) => auth,
        Err(err) => {
            tracing::debug!(error = %err, "Admin authentication failed");
            return err.into_response();
        }
    };

    req.extensions_mut().insert(auth);
    next.run(req).await
}
