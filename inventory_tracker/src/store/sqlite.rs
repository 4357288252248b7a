//! SQLite-backed record store and user directory
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).
//! Every upsert runs in its own transaction so a crash never leaves a
//! half-written product behind.

use super::RecordStore;
use crate::error::{InventoryError, Result};
use crate::context::Role;
use crate::product::{ProductRecord, Sku};
use crate::users::{User, UserDirectory};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

const SELECT_COLUMNS: &str = "SELECT sku, display_name, unit_price, quantity_on_hand,
        remote_version, last_synced_at, dirty
 FROM products";

/// Products and users persisted in one SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and initialise the schema
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    log::error!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    );
                    e
                })?;
                log::info!("Created directory: {}", parent.display());
            }
        }
        let conn = Connection::open(path)?;
        log::info!("Opened database: {}", path.display());
        Self::with_connection(conn)
    }

    /// Fresh in-memory database, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create the `products` and `users` tables if they do not exist yet
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS products (
            sku TEXT PRIMARY KEY NOT NULL,
            display_name TEXT NOT NULL,
            -- exact decimal, stored as text
            unit_price TEXT NOT NULL,
            quantity_on_hand INTEGER NOT NULL CHECK (quantity_on_hand >= 0),
            remote_version TEXT,
            last_synced_at TEXT,
            dirty INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS users (
            username TEXT PRIMARY KEY NOT NULL,
            role TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );
        ",
    )?;

    log::debug!("Database schema initialized");
    Ok(())
}

/// Row as stored, before decimal/timestamp decoding
struct RawRow {
    sku: String,
    display_name: String,
    unit_price: String,
    quantity_on_hand: i64,
    remote_version: Option<String>,
    last_synced_at: Option<String>,
    dirty: bool,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sku: row.get(0)?,
            display_name: row.get(1)?,
            unit_price: row.get(2)?,
            quantity_on_hand: row.get(3)?,
            remote_version: row.get(4)?,
            last_synced_at: row.get(5)?,
            dirty: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<ProductRecord> {
        let corrupt = |what: &str, detail: String| {
            InventoryError::Corrupt(format!("{} for SKU '{}': {}", what, self.sku, detail))
        };

        let unit_price = Decimal::from_str(&self.unit_price)
            .map_err(|e| corrupt("unit_price", e.to_string()))?;
        let quantity_on_hand = u32::try_from(self.quantity_on_hand)
            .map_err(|e| corrupt("quantity_on_hand", e.to_string()))?;
        let last_synced_at = match &self.last_synced_at {
            Some(ts) => Some(
                DateTime::parse_from_rfc3339(ts)
                    .map_err(|e| corrupt("last_synced_at", e.to_string()))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        let sku = Sku::parse(&self.sku).map_err(|e| corrupt("sku", e.to_string()))?;

        let record = ProductRecord {
            sku,
            display_name: self.display_name,
            unit_price,
            quantity_on_hand,
            remote_version: self.remote_version,
            last_synced_at,
            dirty: self.dirty,
        };
        record
            .validate()
            .map_err(|e| corrupt("record", e.to_string()))?;
        Ok(record)
    }
}

fn select_one(conn: &Connection, sku: &Sku) -> Result<Option<ProductRecord>> {
    let raw = conn
        .query_row(
            &format!("{} WHERE sku = ?1", SELECT_COLUMNS),
            params![sku.as_str()],
            RawRow::from_row,
        )
        .optional()?;
    raw.map(RawRow::into_record).transpose()
}

fn write_record_tx(tx: &Transaction<'_>, record: &ProductRecord) -> Result<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO products
         (sku, display_name, unit_price, quantity_on_hand, remote_version, last_synced_at, dirty, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
         ON CONFLICT(sku) DO UPDATE SET
            display_name     = excluded.display_name,
            unit_price       = excluded.unit_price,
            quantity_on_hand = excluded.quantity_on_hand,
            remote_version   = excluded.remote_version,
            last_synced_at   = excluded.last_synced_at,
            dirty            = excluded.dirty,
            updated_at       = excluded.updated_at",
    )?;
    stmt.execute(params![
        record.sku.as_str(),
        &record.display_name,
        record.unit_price.to_string(),
        i64::from(record.quantity_on_hand),
        &record.remote_version,
        record.last_synced_at.map(|ts| ts.to_rfc3339()),
        record.dirty,
    ])?;
    Ok(())
}

/// username, role, is_active, created_at
type UserRow = (String, String, bool, String);

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_user((username, role, is_active, created_at): UserRow) -> Result<User> {
    let role = Role::from_str(&role)
        .map_err(|e| InventoryError::Corrupt(format!("role for user '{}': {}", username, e)))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| InventoryError::Corrupt(format!("created_at for user '{}': {}", username, e)))?
        .with_timezone(&Utc);
    Ok(User {
        username,
        role,
        is_active,
        created_at,
    })
}

fn select_user(conn: &Connection, username: &str) -> Result<User> {
    conn.query_row(
        "SELECT username, role, is_active, created_at FROM users WHERE username = ?1",
        params![username],
        user_from_row,
    )
    .optional()?
    .map(decode_user)
    .transpose()?
    .ok_or_else(|| InventoryError::UnknownUser(username.to_string()))
}

impl UserDirectory for SqliteStore {
    fn insert_user(&self, user: User) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            params![&user.username],
            |row| row.get(0),
        )?;
        if exists {
            return Err(InventoryError::UserExists(user.username));
        }
        tx.execute(
            "INSERT INTO users (username, role, is_active, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                &user.username,
                user.role.as_str(),
                user.is_active,
                user.created_at.to_rfc3339()
            ],
        )?;
        tx.commit()?;
        log::debug!("Inserted user {}", user.username);
        Ok(())
    }

    fn get_user(&self, username: &str) -> Result<User> {
        select_user(&self.lock(), username)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT username, role, is_active, created_at FROM users ORDER BY username ASC",
        )?;
        let rows: rusqlite::Result<Vec<UserRow>> = stmt.query_map([], user_from_row)?.collect();
        rows?.into_iter().map(decode_user).collect()
    }

    fn set_user_active(&self, username: &str, active: bool) -> Result<User> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE users SET is_active = ?2 WHERE username = ?1",
            params![username, active],
        )?;
        if changed == 0 {
            return Err(InventoryError::UnknownUser(username.to_string()));
        }
        let user = select_user(&tx, username)?;
        tx.commit()?;
        Ok(user)
    }
}

impl RecordStore for SqliteStore {
    fn get(&self, sku: &Sku) -> Result<ProductRecord> {
        let conn = self.lock();
        select_one(&conn, sku)?.ok_or_else(|| InventoryError::NotFound(sku.to_string()))
    }

    fn insert(&self, record: ProductRecord) -> Result<()> {
        record.validate()?;
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        if select_one(&tx, &record.sku)?.is_some() {
            return Err(InventoryError::AlreadyExists(record.sku.to_string()));
        }
        write_record_tx(&tx, &record)?;
        tx.commit()?;
        log::debug!("Inserted product {}", record.sku);
        Ok(())
    }

    fn update(
        &self,
        sku: &Sku,
        apply: &mut dyn FnMut(&mut ProductRecord) -> Result<()>,
    ) -> Result<ProductRecord> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut record =
            select_one(&tx, sku)?.ok_or_else(|| InventoryError::NotFound(sku.to_string()))?;
        apply(&mut record)?;
        record.validate()?;
        write_record_tx(&tx, &record)?;
        tx.commit()?;
        log::debug!("Updated product {}", sku);
        Ok(record)
    }

    fn upsert(&self, record: ProductRecord) -> Result<Option<ProductRecord>> {
        record.validate()?;
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let previous = select_one(&tx, &record.sku)?;
        write_record_tx(&tx, &record)?;
        tx.commit()?;
        log::debug!("Upserted product {}", record.sku);
        Ok(previous)
    }

    fn remove(&self, sku: &Sku) -> Result<ProductRecord> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let previous =
            select_one(&tx, sku)?.ok_or_else(|| InventoryError::NotFound(sku.to_string()))?;
        tx.execute("DELETE FROM products WHERE sku = ?1", params![sku.as_str()])?;
        tx.commit()?;
        log::debug!("Removed product {}", sku);
        Ok(previous)
    }

    fn list_all(&self) -> Result<Vec<ProductRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("{} ORDER BY sku ASC", SELECT_COLUMNS))?;
        let raws: rusqlite::Result<Vec<RawRow>> = stmt.query_map([], RawRow::from_row)?.collect();
        raws?.into_iter().map(RawRow::into_record).collect()
    }

    fn count(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
