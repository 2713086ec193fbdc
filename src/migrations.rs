//! Schema migration framework.
//!
//! Numbered SQL migrations are embedded at compile time via `include_str!`.
//! Each migration runs exactly once, tracked by the `schema_version` table.

use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("migrations/001_baseline.sql"),
}];

/// Create the `schema_version` table if it doesn't exist.
fn ensure_schema_version_table(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Failed to create schema_version table: {}", e))
}

/// Return the highest applied migration version, or 0 if none.
fn current_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("Failed to read schema version: {}", e))
}

/// Run all pending migrations.
///
/// Returns the number of migrations applied (0 if already up-to-date).
/// Refuses to touch a database whose schema is newer than this build knows.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    ensure_schema_version_table(conn)?;

    let current = current_version(conn)?;
    let max_known = MIGRATIONS.last().map(|m| m.version).unwrap_or(0);

    if current > max_known {
        return Err(format!(
            "Database schema version ({}) is newer than this version of LeadGuard supports ({}). \
             Please update LeadGuard to the latest version.",
            current, max_known
        ));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        return Ok(0);
    }

    for migration in &pending {
        conn.execute_batch(migration.sql)
            .map_err(|e| format!("Migration v{} failed: {}", migration.version, e))?;

        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )
        .map_err(|e| format!("Failed to record migration v{}: {}", migration.version, e))?;

        log::info!("Applied migration v{}", migration.version);
    }

    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_db() -> Connection {
        Connection::open_in_memory().expect("in-memory db")
    }

    #[test]
    fn test_fresh_db_applies_baseline() {
        let conn = mem_db();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 1, "should apply exactly 1 migration (baseline)");
        assert_eq!(current_version(&conn).expect("version query"), 1);

        conn.execute(
            "INSERT INTO users (id, username, display_name, role, created_at)
             VALUES ('u1', 'root', 'Root', 'super_admin', '2025-01-01 00:00:00+00:00')",
            [],
        )
        .expect("users table should accept a super admin");

        let bad_role = conn.execute(
            "INSERT INTO users (id, username, display_name, role, created_at)
             VALUES ('u2', 'x', 'X', 'janitor', '2025-01-01 00:00:00+00:00')",
            [],
        );
        assert!(bad_role.is_err(), "role CHECK constraint should reject unknown roles");

        conn.execute(
            "INSERT INTO customers (id, phone_raw, phone_normalized, phone_hash, phone_encrypted,
             channel_id, owner_operator_id, owner_admin_id, created_at)
             VALUES ('c1', '123456', '123456', 'h', 'e', 'ch', 'u1', 'u1',
             '2025-01-01 00:00:00+00:00')",
            [],
        )
        .expect("customers table should exist");
        let extra: String = conn
            .query_row("SELECT extra_info FROM customers WHERE id = 'c1'", [], |row| {
                row.get(0)
            })
            .expect("extra_info column");
        assert_eq!(extra, "{}");
    }

    #[test]
    fn test_unique_phone_per_admin_index() {
        let conn = mem_db();
        run_migrations(&conn).unwrap();
        // Owner ids below are not real users.
        conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
        let insert = |id: &str, admin: &str| {
            conn.execute(
                "INSERT INTO customers (id, phone_raw, phone_normalized, phone_hash,
                 phone_encrypted, channel_id, owner_operator_id, owner_admin_id, created_at)
                 VALUES (?1, 'p', 'p', 'same-hash', 'e', 'ch', 'op', ?2, '2025-01-01')",
                [id, admin],
            )
        };
        insert("c1", "a1").expect("first insert");
        assert!(insert("c2", "a1").is_err(), "same hash and admin must collide");
        insert("c3", "a2").expect("another admin may hold the same phone");
    }

    #[test]
    fn test_forward_compat_guard() {
        let conn = mem_db();
        ensure_schema_version_table(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (999)", [])
            .unwrap();

        let err = run_migrations(&conn).unwrap_err();
        assert!(
            err.contains("newer than this version"),
            "error should mention version mismatch: {}",
            err
        );
    }

    #[test]
    fn test_idempotency() {
        let conn = mem_db();
        assert_eq!(run_migrations(&conn).expect("first run"), 1);
        assert_eq!(
            run_migrations(&conn).expect("second run"),
            0,
            "second run should apply no migrations"
        );
        assert_eq!(current_version(&conn).expect("version query"), 1);
    }
}
