use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use super::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity taken from the `x-user-id` header.
///
/// Authentication happens upstream; the header is trusted as-is.
#[derive(Debug, Clone, Copy)]
pub struct RequestUser(pub Uuid);

impl<S> FromRequestParts<S> for RequestUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| {
                ApiError::bad_request(
                    "Missing user identity",
                    Some(format!("`{USER_ID_HEADER}` header is required")),
                )
            })?
            .to_str()
            .map_err(|_| ApiError::bad_request("Invalid user identity", None))?;

        let user_id = Uuid::parse_str(raw.trim()).map_err(|err| {
            ApiError::bad_request("Invalid user identity", Some(err.to_string()))
        })?;

        Ok(Self(user_id))
    }
}
