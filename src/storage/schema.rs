use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            customer_id INTEGER NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            mobile_number TEXT NOT NULL DEFAULT '',
            preferences TEXT NOT NULL DEFAULT '',
            visiting_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            reminder_interval TEXT NOT NULL DEFAULT 'none',
            reminder_date TEXT
        );

        CREATE TABLE IF NOT EXISTS customer_interests (
            customer_ref TEXT NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY (customer_ref, name),
            FOREIGN KEY (customer_ref) REFERENCES customers(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS reminder_history (
            id INTEGER PRIMARY KEY,
            customer_ref TEXT NOT NULL,
            sent_at TEXT NOT NULL,
            message TEXT NOT NULL,
            FOREIGN KEY (customer_ref) REFERENCES customers(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS reminder_history_by_customer
            ON reminder_history (customer_ref, id);

        CREATE TABLE IF NOT EXISTS reminder_sent_dates (
            customer_ref TEXT NOT NULL,
            day TEXT NOT NULL,
            PRIMARY KEY (customer_ref, day),
            FOREIGN KEY (customer_ref) REFERENCES customers(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS services (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            position INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
