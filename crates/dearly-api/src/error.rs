use axum::{
    Json,
    extract::rejection::{BytesRejection, JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use dearly_types::api::ErrorBody;

/// Every failure a request can end in. Each maps to one HTTP status and a
/// stable machine-readable code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("you already have a partner")]
    AlreadyPaired,

    #[error("this user already has a partner")]
    PartnerAlreadyPaired,

    #[error("you cannot connect to yourself")]
    SelfPairing,

    #[error("you need to connect with your partner first")]
    NotPaired,

    /// Covers both "no such letter for you" and "not due yet".
    #[error("message not found or not ready for delivery")]
    NotReady,

    #[error("upload exceeds the size limit")]
    PayloadTooLarge,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) | Self::NotReady => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::SelfPairing => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::AlreadyPaired | Self::PartnerAlreadyPaired | Self::NotPaired => {
                StatusCode::CONFLICT
            }
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::AlreadyPaired => "already_paired",
            Self::PartnerAlreadyPaired => "partner_already_paired",
            Self::SelfPairing => "self_pairing",
            Self::NotPaired => "not_paired",
            Self::NotReady => "not_ready",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Internal(_) => "internal",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Maps an extractor rejection onto the taxonomy. Only an exceeded body
    /// limit keeps its own status; every other malformed input is a 400.
    fn rejected(status: StatusCode, detail: String) -> Self {
        debug!("Rejected request input ({}): {}", status, detail);
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::Validation(detail)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.code().to_string(),
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Runs blocking store/hash work off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
    })?
}
