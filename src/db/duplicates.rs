use super::*;

const DUPLICATE_COLUMNS: &str =
    "id, customer_id, first_owner_id, duplicate_operator_id, duplicate_channel_id, duplicate_at";

impl LeadDb {
    // =========================================================================
    // Duplicate ledger (append-only)
    // =========================================================================

    pub fn create_duplicate(&self, record: &DuplicateRecord) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO duplicates (
                    id, customer_id, first_owner_id, duplicate_operator_id,
                    duplicate_channel_id, duplicate_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.customer_id,
                    record.first_owner_id,
                    record.duplicate_operator_id,
                    record.duplicate_channel_id,
                    record.duplicate_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Duplicate records accepted by `filter`, newest first.
    pub fn get_duplicates(&self, filter: &DuplicateFilter) -> Result<Vec<DuplicateRecord>, DbError> {
        let (clause, owners): (String, Vec<&str>) = match filter {
            DuplicateFilter::All => (String::new(), Vec::new()),
            DuplicateFilter::FirstOwner(owner) => {
                ("WHERE first_owner_id = ?1".to_string(), vec![owner.as_str()])
            }
            DuplicateFilter::FirstOwnerIn(owners) => {
                if owners.is_empty() {
                    return Ok(Vec::new());
                }
                let placeholders = (1..=owners.len())
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                (
                    format!("WHERE first_owner_id IN ({placeholders})"),
                    owners.iter().map(String::as_str).collect(),
                )
            }
        };
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DUPLICATE_COLUMNS} FROM duplicates {clause}
                 ORDER BY duplicate_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(owners.iter()),
                Self::map_duplicate_row,
            )?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
    }

    pub fn get_duplicates_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<DuplicateRecord>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DUPLICATE_COLUMNS} FROM duplicates
                 WHERE customer_id = ?1
                 ORDER BY duplicate_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map(params![customer_id], Self::map_duplicate_row)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
    }

    fn map_duplicate_row(row: &rusqlite::Row) -> rusqlite::Result<DuplicateRecord> {
        Ok(DuplicateRecord {
            id: row.get(0)?,
            customer_id: row.get(1)?,
            first_owner_id: row.get(2)?,
            duplicate_operator_id: row.get(3)?,
            duplicate_channel_id: row.get(4)?,
            duplicate_at: row.get(5)?,
        })
    }
}
