use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use crate::Database;
use crate::models::{LetterRow, NewLetter, NewUser, UserRow};
use crate::store::PairOutcome;
use crate::timestamp;

const USER_COLUMNS: &str = "id, email, name, password, partner_id, created_at";

// Messages joined with sender and receiver in one pass.
const LETTER_SELECT: &str = "
    SELECT m.id, m.sender_id, s.name, s.email, m.receiver_id, r.name, r.email,
           m.content, m.image_url, m.scheduled_at, m.is_delivered, m.delivered_at, m.created_at
    FROM messages m
    JOIN users s ON s.id = m.sender_id
    JOIN users r ON r.id = m.receiver_id";

impl Database {
    // -- Users --

    /// Inserts a user. Returns `false` without writing when the email is taken.
    pub fn insert_user(&self, user: &NewUser<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, name, password, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(email) DO NOTHING",
                params![
                    user.id.to_string(),
                    user.email,
                    user.name,
                    user.password_hash,
                    timestamp::format(user.created_at),
                ],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Links two users to each other inside one transaction.
    ///
    /// Each side is only written while its `partner_id` is still NULL, so a
    /// concurrent pairing that got there first makes this roll back whole.
    pub fn link_partners(&self, requester_id: &str, target_id: &str) -> Result<PairOutcome> {
        if requester_id == target_id {
            return Ok(PairOutcome::SelfPairing);
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let requester = tx.execute(
                "UPDATE users SET partner_id = ?2 WHERE id = ?1 AND partner_id IS NULL",
                params![requester_id, target_id],
            )?;
            if requester == 0 {
                return Ok(PairOutcome::RequesterTaken);
            }

            let target = tx.execute(
                "UPDATE users SET partner_id = ?2 WHERE id = ?1 AND partner_id IS NULL",
                params![target_id, requester_id],
            )?;
            if target == 0 {
                // tx dropped here, first update rolled back
                return Ok(PairOutcome::TargetTaken);
            }

            tx.commit()?;
            Ok(PairOutcome::Paired)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, letter: &NewLetter<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, content, image_url, scheduled_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    letter.id.to_string(),
                    letter.sender_id.to_string(),
                    letter.receiver_id.to_string(),
                    letter.content,
                    letter.image_url,
                    timestamp::format(letter.scheduled_at),
                    timestamp::format(letter.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_letter(&self, id: &str) -> Result<Option<LetterRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE m.id = ?1", LETTER_SELECT);
            conn.query_row(&sql, [id], letter_row).optional()
        })
    }

    /// Finalized letters the user sent or received, oldest schedule first.
    pub fn get_delivered_letters(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<LetterRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE (m.sender_id = ?1 OR m.receiver_id = ?1)
                   AND m.scheduled_at <= ?2
                   AND m.is_delivered = 1
                 ORDER BY m.scheduled_at ASC, m.created_at ASC",
                LETTER_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id, timestamp::format(now)], letter_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every letter addressed to the user that has not been finalized, due or not.
    pub fn get_pending_letters(&self, receiver_id: &str) -> Result<Vec<LetterRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE m.receiver_id = ?1 AND m.is_delivered = 0
                 ORDER BY m.scheduled_at ASC, m.created_at ASC",
                LETTER_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([receiver_id], letter_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Marks a due letter delivered, at most once.
    ///
    /// The flip is a single conditional UPDATE guarded by `is_delivered = 0`;
    /// the read-back happens in the same transaction. Returns the row (if the
    /// receiver may see it yet) and whether this call performed the flip.
    pub fn mark_delivered(
        &self,
        id: &str,
        receiver_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(LetterRow, bool)>> {
        let now = timestamp::format(now);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let flipped = tx.execute(
                "UPDATE messages SET is_delivered = 1, delivered_at = ?3
                 WHERE id = ?1 AND receiver_id = ?2 AND scheduled_at <= ?3 AND is_delivered = 0",
                params![id, receiver_id, now],
            )?;

            let sql = format!(
                "{} WHERE m.id = ?1 AND m.receiver_id = ?2 AND m.scheduled_at <= ?3",
                LETTER_SELECT
            );
            let row = tx
                .query_row(&sql, params![id, receiver_id, now], letter_row)
                .optional()?;

            tx.commit()?;
            Ok(row.map(|r| (r, flipped == 1)))
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                name: row.get(2)?,
                password: row.get(3)?,
                partner_id: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn letter_row(row: &Row<'_>) -> rusqlite::Result<LetterRow> {
    Ok(LetterRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_name: row.get(2)?,
        sender_email: row.get(3)?,
        receiver_id: row.get(4)?,
        receiver_name: row.get(5)?,
        receiver_email: row.get(6)?,
        content: row.get(7)?,
        image_url: row.get(8)?,
        scheduled_at: row.get(9)?,
        is_delivered: row.get(10)?,
        delivered_at: row.get(11)?,
        created_at: row.get(12)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
