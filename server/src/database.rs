//! # SQLite store
//!
//! One database file for the whole service.
//!
//! ## Requirements
//!
//! - Small congregation-sized data: hundreds of worshipers, tens of benches,
//!   a handful of writes per minute at the editor's save cadence
//! - One parameterized statement per route, no cross-statement transactions
//!   outside the webhook's write-then-mark ordering
//! - Floor plans live as JSON text in the generic `storage` table under
//!   `map:<name>` keys; everything else is a plain column
//!
//! ## Implementation
//!
//! - `rusqlite` with the bundled SQLite, WAL journal, foreign keys on
//! - A `Mutex<Connection>` serializes access; SQLite is the single writer
//!   anyway and the statements are all point lookups or tiny scans

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

pub struct Database {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        salt TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS worshipers (
        id INTEGER PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT UNIQUE,
        phone TEXT,
        note TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS storage (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS seat_assignments (
        map_key TEXT NOT NULL,
        bench_id INTEGER NOT NULL,
        seat INTEGER NOT NULL,
        worshiper_id INTEGER NOT NULL REFERENCES worshipers(id) ON DELETE CASCADE,
        PRIMARY KEY (map_key, bench_id, seat)
    );

    CREATE TABLE IF NOT EXISTS orders (
        id TEXT PRIMARY KEY,
        worshiper_id INTEGER NOT NULL,
        email TEXT NOT NULL,
        amount_cents INTEGER NOT NULL,
        currency TEXT NOT NULL,
        seat_count INTEGER NOT NULL,
        status TEXT NOT NULL,
        session_id TEXT,
        provision_account INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS webhook_deliveries (
        delivery_id TEXT PRIMARY KEY,
        received_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_assignments_worshiper
    ON seat_assignments(worshiper_id);

    CREATE INDEX IF NOT EXISTS idx_orders_status
    ON orders(status);
";

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorshiperRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentRow {
    pub bench_id: u32,
    pub seat: u32,
    pub worshiper_id: i64,
}

#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: String,
    pub worshiper_id: i64,
    pub email: String,
    pub amount_cents: i64,
    pub currency: String,
    pub seat_count: i64,
    pub status: String,
    pub session_id: Option<String>,
    pub provision_account: bool,
}

/// Field set shared by worshiper create and update.
pub struct WorshiperPatch<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub note: Option<&'a str>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to set pragmas")?;
        conn.execute_batch(SCHEMA).context("Failed to create schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ── users ───────────────────────────────────────────────────────────

    pub fn insert_user(
        &self,
        email: &str,
        password_hash: &str,
        salt: &str,
    ) -> rusqlite::Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO users (email, password_hash, salt, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![email, password_hash, salt, now()],
        )?;

        Ok(conn.last_insert_rowid())
    }

    pub fn user_by_email(&self, email: &str) -> rusqlite::Result<Option<UserRow>> {
        self.conn()
            .query_row(
                "SELECT id, email, password_hash, salt FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        password_hash: row.get(2)?,
                        salt: row.get(3)?,
                    })
                },
            )
            .optional()
    }

    // ── worshipers ──────────────────────────────────────────────────────

    pub fn insert_worshiper(&self, patch: &WorshiperPatch) -> rusqlite::Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO worshipers (first_name, last_name, email, phone, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                patch.first_name,
                patch.last_name,
                patch.email,
                patch.phone,
                patch.note,
                now()
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    pub fn worshiper(&self, id: i64) -> rusqlite::Result<Option<WorshiperRow>> {
        self.conn()
            .query_row(
                "SELECT id, first_name, last_name, email, phone, note, created_at
                 FROM worshipers WHERE id = ?1",
                params![id],
                worshiper_from_row,
            )
            .optional()
    }

    /// Lists worshipers, optionally filtered by a sanitized name substring.
    pub fn list_worshipers(&self, filter: Option<&str>) -> rusqlite::Result<Vec<WorshiperRow>> {
        let conn = self.conn();

        match filter {
            Some(q) => {
                let pattern = format!("%{q}%");
                let mut stmt = conn.prepare(
                    "SELECT id, first_name, last_name, email, phone, note, created_at
                     FROM worshipers
                     WHERE lower(first_name || ' ' || last_name) LIKE ?1
                     ORDER BY last_name, first_name",
                )?;
                let rows = stmt.query_map(params![pattern], worshiper_from_row)?;
                rows.collect()
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, first_name, last_name, email, phone, note, created_at
                     FROM worshipers ORDER BY last_name, first_name",
                )?;
                let rows = stmt.query_map([], worshiper_from_row)?;
                rows.collect()
            }
        }
    }

    pub fn update_worshiper(&self, id: i64, patch: &WorshiperPatch) -> rusqlite::Result<bool> {
        let changed = self.conn().execute(
            "UPDATE worshipers
             SET first_name = ?1, last_name = ?2, email = ?3, phone = ?4, note = ?5
             WHERE id = ?6",
            params![
                patch.first_name,
                patch.last_name,
                patch.email,
                patch.phone,
                patch.note,
                id
            ],
        )?;

        Ok(changed > 0)
    }

    /// Deletes a worshiper; seat assignments cascade.
    pub fn delete_worshiper(&self, id: i64) -> rusqlite::Result<bool> {
        let changed = self
            .conn()
            .execute("DELETE FROM worshipers WHERE id = ?1", params![id])?;

        Ok(changed > 0)
    }

    // ── storage blobs ───────────────────────────────────────────────────

    pub fn get_blob(&self, key: &str) -> rusqlite::Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    /// Upsert, last write wins.
    pub fn put_blob(&self, key: &str, value: &str) -> rusqlite::Result<()> {
        self.conn().execute(
            "INSERT INTO storage (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            params![key, value, now()],
        )?;

        Ok(())
    }

    // ── seat assignments ────────────────────────────────────────────────

    /// Upsert: reassigning an occupied seat overwrites the occupant.
    pub fn assign_seat(
        &self,
        map_key: &str,
        bench_id: u32,
        seat: u32,
        worshiper_id: i64,
    ) -> rusqlite::Result<()> {
        self.conn().execute(
            "INSERT INTO seat_assignments (map_key, bench_id, seat, worshiper_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(map_key, bench_id, seat)
             DO UPDATE SET worshiper_id = excluded.worshiper_id",
            params![map_key, bench_id, seat, worshiper_id],
        )?;

        Ok(())
    }

    pub fn unassign_seat(&self, map_key: &str, bench_id: u32, seat: u32) -> rusqlite::Result<bool> {
        let changed = self.conn().execute(
            "DELETE FROM seat_assignments
             WHERE map_key = ?1 AND bench_id = ?2 AND seat = ?3",
            params![map_key, bench_id, seat],
        )?;

        Ok(changed > 0)
    }

    pub fn assignments(&self, map_key: &str) -> rusqlite::Result<Vec<AssignmentRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT bench_id, seat, worshiper_id FROM seat_assignments
             WHERE map_key = ?1 ORDER BY bench_id, seat",
        )?;
        let rows = stmt.query_map(params![map_key], |row| {
            Ok(AssignmentRow {
                bench_id: row.get(0)?,
                seat: row.get(1)?,
                worshiper_id: row.get(2)?,
            })
        })?;

        rows.collect()
    }

    // ── orders ──────────────────────────────────────────────────────────

    pub fn insert_order(&self, order: &OrderRow) -> rusqlite::Result<()> {
        self.conn().execute(
            "INSERT INTO orders (id, worshiper_id, email, amount_cents, currency,
                                 seat_count, status, session_id, provision_account, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                order.id,
                order.worshiper_id,
                order.email,
                order.amount_cents,
                order.currency,
                order.seat_count,
                order.status,
                order.session_id,
                order.provision_account,
                now()
            ],
        )?;

        Ok(())
    }

    pub fn order(&self, id: &str) -> rusqlite::Result<Option<OrderRow>> {
        self.conn()
            .query_row(
                "SELECT id, worshiper_id, email, amount_cents, currency,
                        seat_count, status, session_id, provision_account
                 FROM orders WHERE id = ?1",
                params![id],
                |row| {
                    Ok(OrderRow {
                        id: row.get(0)?,
                        worshiper_id: row.get(1)?,
                        email: row.get(2)?,
                        amount_cents: row.get(3)?,
                        currency: row.get(4)?,
                        seat_count: row.get(5)?,
                        status: row.get(6)?,
                        session_id: row.get(7)?,
                        provision_account: row.get(8)?,
                    })
                },
            )
            .optional()
    }

    pub fn set_order_session(&self, id: &str, session_id: &str) -> rusqlite::Result<bool> {
        let changed = self.conn().execute(
            "UPDATE orders SET session_id = ?1 WHERE id = ?2",
            params![session_id, id],
        )?;

        Ok(changed > 0)
    }

    pub fn set_order_status(&self, id: &str, status: &str) -> rusqlite::Result<bool> {
        let changed = self.conn().execute(
            "UPDATE orders SET status = ?1 WHERE id = ?2",
            params![status, id],
        )?;

        Ok(changed > 0)
    }

    // ── webhook deliveries ──────────────────────────────────────────────

    pub fn delivery_seen(&self, delivery_id: &str) -> rusqlite::Result<bool> {
        let found: Option<String> = self
            .conn()
            .query_row(
                "SELECT delivery_id FROM webhook_deliveries WHERE delivery_id = ?1",
                params![delivery_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(found.is_some())
    }

    /// Recorded only after the order write succeeded, so a failed delivery
    /// can be retried by the gateway.
    pub fn mark_delivery(&self, delivery_id: &str) -> rusqlite::Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO webhook_deliveries (delivery_id, received_at)
             VALUES (?1, ?2)",
            params![delivery_id, now()],
        )?;

        Ok(())
    }
}

/// True when an insert bounced off a UNIQUE constraint.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn worshiper_from_row(row: &rusqlite::Row) -> rusqlite::Result<WorshiperRow> {
    Ok(WorshiperRow {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        note: row.get(5)?,
        created_at: row.get(6)?,
    })
}
