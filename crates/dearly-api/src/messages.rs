use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use dearly_types::api::{
    LetterResponse, LettersResponse, PendingResponse, SendLetterRequest, UnlockRequest,
};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::middleware::CurrentUser;

pub async fn send_message(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    WithRejection(Json(req), _): WithRejection<Json<SendLetterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking(move || state.letters.send(me.id, req.content, req.image_url)).await?;
    Ok((StatusCode::CREATED, Json(LetterResponse { message })))
}

/// Delivered letters only. Listing never finalizes anything.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = blocking(move || state.letters.list_delivered(me.id)).await?;
    Ok(Json(LettersResponse { messages }))
}

pub async fn get_pending(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = blocking(move || state.letters.list_pending(me.id)).await?;
    Ok(Json(PendingResponse {
        count: messages.len(),
        messages,
    }))
}

pub async fn unlock_message(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    WithRejection(Json(req), _): WithRejection<Json<UnlockRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking(move || state.letters.unlock(me.id, req.message_id)).await?;
    Ok(Json(LetterResponse { message }))
}
