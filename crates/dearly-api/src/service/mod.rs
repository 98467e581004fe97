pub mod letters;
pub mod pairing;

use uuid::Uuid;

use dearly_db::Store;
use dearly_types::models::User;

use crate::error::ApiError;

/// Emails are matched case-insensitively and without surrounding whitespace.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn load_user(store: &dyn Store, id: Uuid) -> Result<User, ApiError> {
    store.user_by_id(id)?.ok_or(ApiError::NotFound("user"))
}
