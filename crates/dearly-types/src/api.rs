use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Letter, PendingLetter, UserSummary};

// -- JWT Claims --

/// Bearer token claims. `email` is the principal the API resolves on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserSummary,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserSummary,
    pub partner: Option<UserSummary>,
}

// -- Partner --

#[derive(Debug, Deserialize)]
pub struct PartnerSearchQuery {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectPartnerRequest {
    pub partner_email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectPartnerResponse {
    pub message: String,
    pub partner: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PartnerResponse {
    pub partner: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub user: UserSummary,
}

// -- Letters --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendLetterRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnlockRequest {
    pub message_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LetterResponse {
    pub message: Letter,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LettersResponse {
    pub messages: Vec<Letter>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingResponse {
    pub count: usize,
    pub messages: Vec<PendingLetter>,
}

// -- Uploads --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub image_url: String,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
