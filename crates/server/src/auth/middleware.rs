use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};

use crate::auth::jwt;
use crate::config::Config;
use crate::error::AppError;
use crate::session::{Identity, UserRef};

/// Authenticated user extracted from the Authorization header.
/// Use as an extractor in route handlers that require auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

impl AuthUser {
    pub fn from_token(token: &str, config: &Config) -> Option<Self> {
        jwt::verify_token(token, &config.jwt_secret).map(|claims| AuthUser {
            id: claims.user_id,
            username: claims.username,
        })
    }

    pub fn identity(&self) -> Identity {
        Identity::Registered(UserRef {
            id: self.id,
            username: self.username.clone(),
        })
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let config = parts
            .extensions
            .get::<Config>()
            .ok_or(AppError::Internal("Missing config".into()))?
            .clone();

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(AppError::Unauthorized)?;

        AuthUser::from_token(token, &config).ok_or(AppError::Unauthorized)
    }
}

/// Optional auth: `None` if no valid token is present. Guests play without one.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err(_) => Ok(MaybeAuthUser(None)),
        }
    }
}

impl MaybeAuthUser {
    /// The registered identity, or a guest identity built from request fields.
    pub fn identity_or_guest(&self, guest_name: Option<String>, guest_token: Option<String>) -> Identity {
        match &self.0 {
            Some(user) => user.identity(),
            None => Identity::guest(guest_name, guest_token),
        }
    }
}
