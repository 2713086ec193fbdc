use super::*;

const USER_COLUMNS: &str = "id, username, display_name, role, parent_id, is_active,
                            password_salt, password_hash, created_at";

impl LeadDb {
    // =========================================================================
    // Users
    // =========================================================================

    pub fn create_user(&self, user: &User) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (
                    id, username, display_name, role, parent_id, is_active,
                    password_salt, password_hash, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.id,
                    user.username,
                    user.display_name,
                    user.role.as_str(),
                    user.parent_id,
                    user.is_active,
                    user.password_salt,
                    user.password_hash,
                    user.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Update the mutable columns. Role, parent and username never change.
    /// Returns the number of rows touched.
    pub fn update_user_fields(&self, user: &User) -> Result<usize, DbError> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE users
                 SET display_name = ?2, is_active = ?3, password_salt = ?4, password_hash = ?5
                 WHERE id = ?1",
                params![
                    user.id,
                    user.display_name,
                    user.is_active,
                    user.password_salt,
                    user.password_hash,
                ],
            )?)
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                    params![id],
                    Self::map_user_row,
                )
                .optional()?)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                    params![username],
                    Self::map_user_row,
                )
                .optional()?)
        })
    }

    /// All users, newest first.
    pub fn get_users(&self) -> Result<Vec<User>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map([], Self::map_user_row)?;
            let mut users = Vec::new();
            for row in rows {
                users.push(row?);
            }
            Ok(users)
        })
    }

    fn map_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            display_name: row.get(2)?,
            role: parse_role(3, row.get(3)?)?,
            parent_id: row.get(4)?,
            is_active: row.get(5)?,
            password_salt: row.get(6)?,
            password_hash: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}
