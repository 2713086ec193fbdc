//! SQLite-backed store for users, channels, customers, and the duplicate ledger.
//!
//! The database lives at `~/.leadguard/leadguard.db` unless the config points
//! elsewhere. The connection sits behind a `parking_lot::Mutex` so one
//! `LeadDb` can be shared across submitting threads; first-owner-wins is
//! enforced twice, by `BEGIN IMMEDIATE` check-and-insert and by the
//! `UNIQUE (phone_hash, owner_admin_id)` index.

use std::path::PathBuf;

use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::error::StoreError;
use crate::scope::{ChannelFilter, CustomerFilter, DuplicateFilter};
use crate::store::{CustomerInsert, LeadStore};
use crate::types::{Channel, Customer, DuplicateRecord, Role, User};

pub mod types;
pub use types::*;

pub mod channels;
pub mod customers;
pub mod duplicates;
pub mod users;

pub struct LeadDb {
    conn: Mutex<Connection>,
}

impl LeadDb {
    /// Run a closure against the connection while holding the lock.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.conn.lock();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(&conn) {
            Ok(val) => {
                conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `~/.leadguard/leadguard.db` and apply the schema.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::db_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL for concurrent readers alongside the single writer
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        log::info!("Opened lead database at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Resolve the default database path: `~/.leadguard/leadguard.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".leadguard").join("leadguard.db"))
    }
}

/// True for UNIQUE / PRIMARY KEY violations.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn parse_role(idx: usize, raw: String) -> rusqlite::Result<Role> {
    raw.parse::<Role>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Unique violations become `Conflict`; everything else stays a database error.
fn conflict_or_db(err: DbError, what: impl FnOnce() -> String) -> StoreError {
    match err {
        DbError::Sqlite(ref e) if is_unique_violation(e) => StoreError::Conflict(what()),
        other => StoreError::Db(other),
    }
}

fn expect_one(changed: usize, what: impl FnOnce() -> String) -> Result<(), StoreError> {
    if changed == 0 {
        Err(StoreError::NotFound(what()))
    } else {
        Ok(())
    }
}

impl LeadStore for LeadDb {
    fn user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.get_user(id)?)
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.get_user_by_username(username)?)
    }

    fn users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.get_users()?)
    }

    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.create_user(user)
            .map_err(|e| conflict_or_db(e, || format!("username {}", user.username)))
    }

    fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let changed = self.update_user_fields(user)?;
        expect_one(changed, || format!("user {}", user.id))
    }

    fn channel(&self, id: &str) -> Result<Option<Channel>, StoreError> {
        Ok(self.get_channel(id)?)
    }

    fn channel_by_name(&self, name: &str) -> Result<Option<Channel>, StoreError> {
        Ok(self.get_channel_by_name(name)?)
    }

    fn channels(&self, filter: &ChannelFilter) -> Result<Vec<Channel>, StoreError> {
        Ok(self.get_channels(filter)?)
    }

    fn insert_channel(&self, channel: &Channel) -> Result<(), StoreError> {
        self.create_channel(channel)
            .map_err(|e| conflict_or_db(e, || format!("channel {}", channel.name)))
    }

    fn update_channel(&self, channel: &Channel) -> Result<(), StoreError> {
        let changed = self
            .update_channel_fields(channel)
            .map_err(|e| conflict_or_db(e, || format!("channel {}", channel.name)))?;
        expect_one(changed, || format!("channel {}", channel.id))
    }

    fn customer(&self, id: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.get_customer(id)?)
    }

    fn find_customer(
        &self,
        phone_hash: &str,
        owner_admin_id: &str,
    ) -> Result<Option<Customer>, StoreError> {
        Ok(self.get_customer_by_key(phone_hash, owner_admin_id)?)
    }

    fn customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, StoreError> {
        Ok(self.get_customers(filter)?)
    }

    fn insert_customer(&self, customer: &Customer) -> Result<CustomerInsert, StoreError> {
        Ok(self.create_customer(customer)?)
    }

    fn insert_duplicate(&self, record: &DuplicateRecord) -> Result<(), StoreError> {
        self.create_duplicate(record)
            .map_err(|e| conflict_or_db(e, || format!("duplicate {}", record.id)))
    }

    fn duplicates(&self, filter: &DuplicateFilter) -> Result<Vec<DuplicateRecord>, StoreError> {
        Ok(self.get_duplicates(filter)?)
    }

    fn duplicates_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<DuplicateRecord>, StoreError> {
        Ok(self.get_duplicates_for_customer(customer_id)?)
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================


// =============================================================================
// Tests
// =============================================================================
