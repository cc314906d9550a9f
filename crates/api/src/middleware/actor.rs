//! Caller identity extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use stockpile_backup::Actor;

use crate::error::AppError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

/// The caller, taken from the optional `x-tenant-id` and `x-user-id`
/// headers. Missing or blank headers fall back to [`Actor::default`].
///
/// ```ignore
/// async fn handler(RequestActor(actor): RequestActor) -> AppResult<Json<()>> {
///     tracing::info!(tenant_id = %actor.tenant_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequestActor(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for RequestActor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| -> Result<Option<String>, AppError> {
            match parts.headers.get(name) {
                None => Ok(None),
                Some(value) => {
                    let value = value.to_str().map_err(|_| {
                        AppError::BadRequest(format!("{name} header must be visible ASCII"))
                    })?;
                    let value = value.trim();
                    Ok((!value.is_empty()).then(|| value.to_string()))
                }
            }
        };

        let fallback = Actor::default();
        Ok(RequestActor(Actor::new(
            header(TENANT_HEADER)?.unwrap_or(fallback.tenant_id),
            header(USER_HEADER)?.unwrap_or(fallback.user_id),
        )))
    }
}
