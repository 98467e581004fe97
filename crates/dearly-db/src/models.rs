//! Database row types. These map directly to SQLite rows and are converted
//! into `dearly-types` models at the `Store` boundary.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use dearly_types::models::{Letter, User, UserSummary};

use crate::timestamp;

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub partner_id: Option<String>,
    pub created_at: String,
}

/// A message joined with both participants' names and emails.
pub struct LetterRow {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_email: String,
    pub receiver_id: String,
    pub receiver_name: String,
    pub receiver_email: String,
    pub content: String,
    pub image_url: Option<String>,
    pub scheduled_at: String,
    pub is_delivered: bool,
    pub delivered_at: Option<String>,
    pub created_at: String,
}

pub struct NewUser<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub name: &'a str,
    pub password_hash: &'a str,
    pub created_at: DateTime<Utc>,
}

pub struct NewLetter<'a> {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: &'a str,
    pub image_url: Option<&'a str>,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("corrupt {} '{}'", what, raw))
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_id(&row.id, "user id")?,
            email: row.email,
            name: row.name,
            partner_id: row
                .partner_id
                .as_deref()
                .map(|p| parse_id(p, "partner_id"))
                .transpose()?,
            created_at: timestamp::parse(&row.created_at)?,
        })
    }
}

impl TryFrom<LetterRow> for Letter {
    type Error = anyhow::Error;

    fn try_from(row: LetterRow) -> Result<Self> {
        Ok(Letter {
            id: parse_id(&row.id, "message id")?,
            sender: UserSummary {
                id: parse_id(&row.sender_id, "sender_id")?,
                name: row.sender_name,
                email: row.sender_email,
            },
            receiver: UserSummary {
                id: parse_id(&row.receiver_id, "receiver_id")?,
                name: row.receiver_name,
                email: row.receiver_email,
            },
            content: row.content,
            image_url: row.image_url,
            scheduled_at: timestamp::parse(&row.scheduled_at)?,
            is_delivered: row.is_delivered,
            delivered_at: row.delivered_at.as_deref().map(timestamp::parse).transpose()?,
            created_at: timestamp::parse(&row.created_at)?,
        })
    }
}
