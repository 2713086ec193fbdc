use super::*;

const CHANNEL_COLUMNS: &str = "id, name, created_by, owner_admin, is_active, created_at";

impl LeadDb {
    // =========================================================================
    // Channels
    // =========================================================================

    pub fn create_channel(&self, channel: &Channel) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channels (id, name, created_by, owner_admin, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    channel.id,
                    channel.name,
                    channel.created_by,
                    channel.owner_admin,
                    channel.is_active,
                    channel.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Returns the number of rows touched.
    pub fn update_channel_fields(&self, channel: &Channel) -> Result<usize, DbError> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE channels SET name = ?2, is_active = ?3 WHERE id = ?1",
                params![channel.id, channel.name, channel.is_active],
            )?)
        })
    }

    pub fn get_channel(&self, id: &str) -> Result<Option<Channel>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ?1"),
                    params![id],
                    Self::map_channel_row,
                )
                .optional()?)
        })
    }

    pub fn get_channel_by_name(&self, name: &str) -> Result<Option<Channel>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {CHANNEL_COLUMNS} FROM channels
                         WHERE name = ?1 COLLATE NOCASE LIMIT 1"
                    ),
                    params![name],
                    Self::map_channel_row,
                )
                .optional()?)
        })
    }

    /// Channels accepted by `filter`, newest first.
    pub fn get_channels(&self, filter: &ChannelFilter) -> Result<Vec<Channel>, DbError> {
        let (clause, owner) = match filter {
            ChannelFilter::Active => ("WHERE is_active = 1", None),
            ChannelFilter::ActiveOwnedBy(admin_id) => {
                ("WHERE is_active = 1 AND owner_admin = ?1", Some(admin_id.as_str()))
            }
            ChannelFilter::Nothing => return Ok(Vec::new()),
        };
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHANNEL_COLUMNS} FROM channels {clause}
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map(rusqlite::params_from_iter(owner), Self::map_channel_row)?;
            let mut channels = Vec::new();
            for row in rows {
                channels.push(row?);
            }
            Ok(channels)
        })
    }

    fn map_channel_row(row: &rusqlite::Row) -> rusqlite::Result<Channel> {
        Ok(Channel {
            id: row.get(0)?,
            name: row.get(1)?,
            created_by: row.get(2)?,
            owner_admin: row.get(3)?,
            is_active: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
