use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use tracing::{info, warn};
use uuid::Uuid;

use dearly_db::Store;
use dearly_db::models::NewUser;
use dearly_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use dearly_types::models::User;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{ApiError, blocking};
use crate::files::BlobStore;
use crate::service::letters::LetterService;
use crate::service::normalize_email;
use crate::service::pairing::PairingService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
    pub pairing: PairingService,
    pub letters: LetterService,
    pub blobs: BlobStore,
}

impl AppStateInner {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        config: Config,
        blobs: BlobStore,
    ) -> AppState {
        let pairing = PairingService::new(store.clone());
        let letters = LetterService::new(
            store.clone(),
            clock.clone(),
            config.delivery_delay,
            config.max_content_chars,
        );
        Arc::new(Self {
            store,
            clock,
            config,
            pairing,
            letters,
            blobs,
        })
    }
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    let name = req.name.trim().to_string();

    // Validate input
    if email.len() > 254 || !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(ApiError::validation("a valid email is required"));
    }
    if name.is_empty() || name.chars().count() > 64 {
        return Err(ApiError::validation("name must be 1 to 64 characters"));
    }
    if req.password.len() < 6 {
        return Err(ApiError::validation("password must be at least 6 characters"));
    }

    let worker = state.clone();
    let user = blocking(move || {
        let password_hash = hash_password(&req.password)?;

        worker
            .store
            .create_user(NewUser {
                id: Uuid::new_v4(),
                email: &email,
                name: &name,
                password_hash: &password_hash,
                created_at: worker.clock.now(),
            })?
            .ok_or_else(|| ApiError::Conflict("email is already registered".into()))
    })
    .await?;

    info!("Registered user {}", user.id);
    let token = issue_token(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.summary(),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);

    let worker = state.clone();
    let user = blocking(move || {
        let (user, hash) = worker
            .store
            .credentials(&email)?
            .ok_or(ApiError::Unauthorized)?;

        // Verify password
        let parsed_hash = PasswordHash::new(&hash)
            .map_err(|e| anyhow::anyhow!("stored hash for {} is corrupt: {}", user.id, e))?;
        if !verify_password(&req.password, &parsed_hash) {
            warn!("Failed login for {}", user.id);
            return Err(ApiError::Unauthorized);
        }

        Ok(user)
    })
    .await?;

    let token = issue_token(&state, &user)?;
    Ok(Json(AuthResponse {
        user: user.summary(),
        token,
    }))
}

/// Argon2id hash with a fresh random salt, in PHC string form.
fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &PasswordHash<'_>) -> bool {
    Argon2::default()
        .verify_password(password.as_bytes(), hash)
        .is_ok()
}

fn issue_token(state: &AppStateInner, user: &User) -> Result<String, ApiError> {
    let ttl = state.config.token_ttl_days;
    let exp = chrono::Duration::try_days(ttl)
        .and_then(|d| state.clock.now().checked_add_signed(d))
        .ok_or_else(|| anyhow::anyhow!("token ttl of {} days is out of range", ttl))?;
    Ok(create_token(&state.config.jwt_secret, user, exp.timestamp() as usize)?)
}

pub fn create_token(secret: &str, user: &User, exp: usize) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        exp,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}
