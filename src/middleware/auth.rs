use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::auth;
use crate::database::models::{Role, User};
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated user loaded from the database for the current request.
/// Handlers read it from request extensions via `Extension<CurrentUser>`.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn role(&self) -> Role {
        self.0.role()
    }

    /// 403 unless the user is an admin or superadmin.
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.0.is_staff() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin access required"))
        }
    }

    /// 403 unless the user is a superadmin.
    pub fn require_superadmin(&self) -> Result<(), ApiError> {
        if self.0.is_superadmin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Superadmin access required"))
        }
    }

    /// 403 unless the user is a seller or staff.
    pub fn require_seller(&self) -> Result<(), ApiError> {
        if self.0.is_seller() || self.0.is_staff() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Seller access required"))
        }
    }
}

/// JWT authentication middleware. Decodes the bearer token, loads the user
/// row, enforces active/suspension state and injects `CurrentUser`.
///
/// Suspensions lapse automatically: a suspension window that has passed is
/// cleared on the user row before the request proceeds.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&headers)?;
    let claims = auth::validate_jwt(&token)?;

    let mut user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    if !user.is_active {
        return Err(ApiError::bad_request("Account is deactivated"));
    }

    if let Some(until) = user.suspended_until {
        if until > Utc::now() {
            return Err(ApiError::forbidden(format!(
                "Account suspended until {}: {}",
                until.to_rfc3339(),
                user.suspension_reason.as_deref().unwrap_or("no reason given")
            )));
        }
        sqlx::query(
            "UPDATE users SET suspended_until = NULL, suspension_reason = NULL WHERE id = $1",
        )
        .bind(user.id)
        .execute(&state.pool)
        .await?;
        user.suspended_until = None;
        user.suspension_reason = None;
        tracing::info!(user_id = %user.id, "expired suspension cleared");
    }

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header format"))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Authorization header must use Bearer token format"))?;

    if token.trim().is_empty() {
        return Err(ApiError::unauthorized("Empty JWT token"));
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_err());
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcg=="));
        assert!(extract_bearer_token(&headers).is_err());
    }
}
