//! Authentication middleware
//!
//! Verifies the bearer JWT issued by the account service and attaches the
//! caller's organization and role to the request. Capability checks are
//! done against the static role table in `shared::permissions`.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use shared::permissions::{Capability, Role};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ErrorDetail, ErrorResponse};
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn can(&self, capability: Capability) -> bool {
        self.role.allows(capability)
    }

    /// Fail with `Forbidden` unless the caller's role grants `capability`
    pub fn require(&self, capability: Capability) -> AppResult<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role {} lacks the {} capability",
                self.role.as_str(),
                capability.as_str()
            )))
        }
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    if state.config.jwt.secret.is_empty() {
        return AppError::Configuration("JWT secret is not set".to_string()).into_response();
    }

    let claims = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(msg) => return unauthorized_response(&msg),
    };

    let auth_user = match AuthUser::try_from(claims) {
        Ok(user) => user,
        Err(msg) => return unauthorized_response(msg),
    };

    tracing::debug!(user_id = %auth_user.user_id, role = auth_user.role.as_str(), "Authenticated request");
    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub organization_id: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl TryFrom<Claims> for AuthUser {
    type Error = &'static str;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;
        let organization_id = Uuid::parse_str(&claims.organization_id)
            .map_err(|_| "Invalid organization ID in token")?;
        let role = Role::parse(&claims.role).ok_or("Unknown role in token")?;
        Ok(AuthUser {
            user_id,
            organization_id,
            role,
        })
    }
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail::new("UNAUTHORIZED", message),
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn claims(role: &str) -> Claims {
        Claims {
            sub: Uuid::new_v4().to_string(),
            organization_id: Uuid::new_v4().to_string(),
            role: role.to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
            iat: chrono::Utc::now().timestamp(),
        }
    }

    #[test]
    fn test_decode_round_trip() {
        let token = encode(
            &Header::default(),
            &claims("manager"),
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        let decoded = decode_jwt(&token, "test-secret").unwrap();
        let user = AuthUser::try_from(decoded).unwrap();
        assert_eq!(user.role, Role::Manager);
        assert!(user.require(Capability::SplitLot).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = encode(
            &Header::default(),
            &claims("owner"),
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(decode_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(AuthUser::try_from(claims("superuser")).is_err());
    }

    #[test]
    fn test_viewer_cannot_split() {
        let user = AuthUser::try_from(claims("viewer")).unwrap();
        assert!(matches!(user.require(Capability::SplitLot), Err(AppError::Forbidden(_))));
    }
}
