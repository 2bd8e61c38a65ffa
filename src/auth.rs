//! Identity extraction. Credential verification happens upstream — the
//! gateway authenticates the caller and forwards a stable user id plus role
//! in trusted headers. This module only lifts them into a typed identity.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ulid::Ulid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Ulid,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn unauthenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "missing or invalid identity headers",
            "code": "unauthenticated",
        })),
    )
        .into_response()
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Ulid::from_string(s).ok());

        let role = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase());

        match (user_id, role.as_deref()) {
            (Some(user_id), Some("user")) => Ok(Identity {
                user_id,
                role: Role::User,
            }),
            (Some(user_id), Some("admin")) => Ok(Identity {
                user_id,
                role: Role::Admin,
            }),
            _ => Err(unauthenticated()),
        }
    }
}
