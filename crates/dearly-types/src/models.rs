use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub partner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    pub fn is_paired(&self) -> bool {
        self.partner_id.is_some()
    }
}

/// Public view of a user, embedded in letters and partner lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Where a letter sits in its one-way lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Persisted, scheduled time still in the future.
    Scheduled,
    /// Scheduled time has passed but the receiver has not unlocked it.
    Due,
    /// Finalized. Terminal.
    Delivered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Letter {
    pub id: Uuid,
    pub sender: UserSummary,
    pub receiver: UserSummary,
    pub content: String,
    pub image_url: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Letter {
    pub fn state(&self, now: DateTime<Utc>) -> DeliveryState {
        if self.is_delivered {
            DeliveryState::Delivered
        } else if self.scheduled_at <= now {
            DeliveryState::Due
        } else {
            DeliveryState::Scheduled
        }
    }

    /// Whole seconds until the letter can be unlocked, rounded up. Zero once due.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        let millis = (self.scheduled_at - now).num_milliseconds();
        if millis <= 0 { 0 } else { (millis + 999) / 1000 }
    }
}

/// A not-yet-finalized letter plus the countdown a client needs to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLetter {
    #[serde(flatten)]
    pub letter: Letter,
    pub remaining_seconds: i64,
    pub ready: bool,
}

impl PendingLetter {
    pub fn at(letter: Letter, now: DateTime<Utc>) -> Self {
        let remaining_seconds = letter.remaining_seconds(now);
        let ready = letter.state(now) == DeliveryState::Due;
        Self {
            letter,
            remaining_seconds,
            ready,
        }
    }
}
