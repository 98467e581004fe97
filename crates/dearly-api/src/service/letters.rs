//! Sending, listing and unlocking letters.
//!
//! Delivery is evaluated lazily: nothing runs on a timer. A letter's
//! `scheduled_at` is compared against the clock on every read, and the only
//! way a letter becomes delivered is an explicit `unlock` by its receiver.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use dearly_db::Store;
use dearly_db::models::NewLetter;
use dearly_types::models::{Letter, PendingLetter};

use super::load_user;
use crate::clock::Clock;
use crate::error::ApiError;

#[derive(Clone)]
pub struct LetterService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    delay: Duration,
    max_content_chars: usize,
}

impl LetterService {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        delay: Duration,
        max_content_chars: usize,
    ) -> Self {
        Self {
            store,
            clock,
            delay,
            max_content_chars,
        }
    }

    /// Schedules a letter from `sender` to their partner, `delay` from now.
    pub fn send(
        &self,
        sender: Uuid,
        content: Option<String>,
        image_url: Option<String>,
    ) -> Result<Letter, ApiError> {
        let content = content.unwrap_or_default();
        let image_url = image_url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());

        if content.trim().is_empty() && image_url.is_none() {
            return Err(ApiError::validation("content or image is required"));
        }
        if content.chars().count() > self.max_content_chars {
            return Err(ApiError::validation(format!(
                "content is limited to {} characters",
                self.max_content_chars
            )));
        }
        if let Some(url) = &image_url {
            validate_image_url(url)?;
        }

        let me = load_user(self.store.as_ref(), sender)?;
        let Some(partner_id) = me.partner_id else {
            return Err(ApiError::NotPaired);
        };
        if self.store.user_by_id(partner_id)?.is_none() {
            return Err(ApiError::NotPaired);
        }

        let now = self.clock.now();
        let scheduled_at = now
            .checked_add_signed(self.delay)
            .ok_or_else(|| anyhow!("delivery delay {} overflows the clock", self.delay))?;
        let letter = self.store.insert_letter(NewLetter {
            id: Uuid::new_v4(),
            sender_id: me.id,
            receiver_id: partner_id,
            content: &content,
            image_url: image_url.as_deref(),
            scheduled_at,
            created_at: now,
        })?;

        info!(
            "Letter {} from {} to {} scheduled for {}",
            letter.id, me.id, partner_id, letter.scheduled_at
        );
        Ok(letter)
    }

    /// Finalized letters the user sent or received. Read-only.
    pub fn list_delivered(&self, user: Uuid) -> Result<Vec<Letter>, ApiError> {
        Ok(self.store.delivered_letters(user, self.clock.now())?)
    }

    /// Letters waiting for the user to unlock, due or not, with countdowns.
    pub fn list_pending(&self, user: Uuid) -> Result<Vec<PendingLetter>, ApiError> {
        let now = self.clock.now();
        let letters = self.store.pending_letters(user)?;
        Ok(letters.into_iter().map(|l| PendingLetter::at(l, now)).collect())
    }

    /// Finalizes a due letter for its receiver. Repeat calls return the
    /// already-delivered letter unchanged.
    pub fn unlock(&self, user: Uuid, letter_id: Uuid) -> Result<Letter, ApiError> {
        let finalized = self
            .store
            .finalize_delivery(letter_id, user, self.clock.now())?
            .ok_or(ApiError::NotReady)?;

        if finalized.newly_delivered {
            info!("Letter {} delivered to {}", letter_id, user);
        } else {
            debug!("Letter {} was already delivered", letter_id);
        }
        Ok(finalized.letter)
    }
}

fn validate_image_url(url: &str) -> Result<(), ApiError> {
    let stored = url
        .strip_prefix("/uploads/")
        .is_some_and(|name| !name.is_empty() && !name.contains('/') && !name.contains(".."));
    let remote = url.starts_with("https://") || url.starts_with("http://");

    if stored || remote {
        Ok(())
    } else {
        Err(ApiError::validation("image_url must be an uploaded image or an http(s) URL"))
    }
}
