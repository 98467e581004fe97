use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use dearly_types::api::{
    ConnectPartnerRequest, ConnectPartnerResponse, MeResponse, PartnerResponse,
    PartnerSearchQuery, SearchResponse,
};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::middleware::CurrentUser;

pub async fn me(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, partner) = blocking(move || state.pairing.profile(me.id)).await?;
    Ok(Json(MeResponse {
        user: user.summary(),
        partner,
    }))
}

pub async fn get_partner(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let partner = blocking(move || state.pairing.partner(me.id)).await?;
    Ok(Json(PartnerResponse { partner }))
}

/// Preview a pairing without making it.
pub async fn search(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    WithRejection(Query(query), _): WithRejection<Query<PartnerSearchQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = query
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::validation("email parameter is required"))?;

    let user = blocking(move || state.pairing.search(me.id, &email)).await?;
    Ok(Json(SearchResponse { user }))
}

pub async fn connect(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    WithRejection(Json(req), _): WithRejection<Json<ConnectPartnerRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let partner = blocking(move || state.pairing.connect(me.id, &req.partner_email)).await?;
    Ok(Json(ConnectPartnerResponse {
        message: format!("Connected with {}", partner.name),
        partner,
    }))
}
