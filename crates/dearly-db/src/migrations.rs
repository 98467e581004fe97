use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            password    TEXT NOT NULL,
            partner_id  TEXT REFERENCES users(id),
            created_at  TEXT NOT NULL,
            CHECK (partner_id IS NULL OR partner_id <> id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            sender_id       TEXT NOT NULL REFERENCES users(id),
            receiver_id     TEXT NOT NULL REFERENCES users(id),
            content         TEXT NOT NULL DEFAULT '',
            image_url       TEXT,
            scheduled_at    TEXT NOT NULL,
            is_delivered    INTEGER NOT NULL DEFAULT 0,
            delivered_at    TEXT,
            created_at      TEXT NOT NULL,
            CHECK ((is_delivered = 0 AND delivered_at IS NULL)
                OR (is_delivered = 1 AND delivered_at IS NOT NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_receiver_pending
            ON messages(receiver_id, is_delivered, scheduled_at);

        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages(sender_id, scheduled_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
