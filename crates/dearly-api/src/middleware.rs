use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;

use dearly_types::models::User;

use crate::auth::{AppState, decode_token};
use crate::error::{ApiError, blocking};

/// The authenticated principal, resolved from the bearer token's email.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Validate the JWT from the Authorization header and attach the caller's
/// user record to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?;

    let claims = decode_token(&state.config.jwt_secret, bearer.token()).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::Unauthorized
    })?;

    let store = state.store.clone();
    let email = claims.email.clone();
    let user = blocking(move || Ok(store.user_by_email(&email)?))
        .await?
        .filter(|u| u.id == claims.sub)
        .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
