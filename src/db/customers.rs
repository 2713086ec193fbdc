use std::collections::HashMap;

use super::*;

const CUSTOMER_COLUMNS: &str = "id, phone_raw, phone_normalized, phone_hash, phone_encrypted,
                                channel_id, owner_operator_id, owner_admin_id, created_at,
                                extra_info";

impl LeadDb {
    // =========================================================================
    // Customers
    // =========================================================================

    /// Insert a customer unless one already holds `(phone_hash, owner_admin_id)`.
    ///
    /// The lookup and the insert share one `BEGIN IMMEDIATE` transaction, so a
    /// concurrent submitter either sees our row or blocks until we commit.
    pub fn create_customer(&self, customer: &Customer) -> Result<CustomerInsert, DbError> {
        let extra_info = serde_json::to_string(&customer.extra_info)?;
        self.with_transaction(|conn| {
            if let Some(existing) =
                Self::find_by_key(conn, &customer.phone_hash, &customer.owner_admin_id)?
            {
                return Ok(CustomerInsert::Exists(existing));
            }

            let inserted = conn.execute(
                "INSERT INTO customers (
                    id, phone_raw, phone_normalized, phone_hash, phone_encrypted,
                    channel_id, owner_operator_id, owner_admin_id, created_at, extra_info
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    customer.id,
                    customer.phone_raw,
                    customer.phone_normalized,
                    customer.phone_hash,
                    customer.phone_encrypted,
                    customer.channel_id,
                    customer.owner_operator_id,
                    customer.owner_admin_id,
                    customer.created_at,
                    extra_info,
                ],
            );

            match inserted {
                Ok(_) => Ok(CustomerInsert::Inserted),
                // Another connection to the same file won the race.
                Err(e) if is_unique_violation(&e) => {
                    match Self::find_by_key(conn, &customer.phone_hash, &customer.owner_admin_id)? {
                        Some(existing) => Ok(CustomerInsert::Exists(existing)),
                        None => Err(DbError::Sqlite(e)),
                    }
                }
                Err(e) => Err(DbError::Sqlite(e)),
            }
        })
    }

    pub fn get_customer(&self, id: &str) -> Result<Option<Customer>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"),
                    params![id],
                    Self::map_customer_row,
                )
                .optional()?)
        })
    }

    pub fn get_customer_by_key(
        &self,
        phone_hash: &str,
        owner_admin_id: &str,
    ) -> Result<Option<Customer>, DbError> {
        self.with_conn(|conn| Self::find_by_key(conn, phone_hash, owner_admin_id))
    }

    /// Customers accepted by `filter`, newest first.
    pub fn get_customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, DbError> {
        let (clause, owner) = match filter {
            CustomerFilter::All => ("", None),
            CustomerFilter::OwnerAdmin(admin_id) => {
                ("WHERE owner_admin_id = ?1", Some(admin_id.as_str()))
            }
            CustomerFilter::OwnerOperator(operator_id) => {
                ("WHERE owner_operator_id = ?1", Some(operator_id.as_str()))
            }
        };
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CUSTOMER_COLUMNS} FROM customers {clause}
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map(rusqlite::params_from_iter(owner), Self::map_customer_row)?;
            let mut customers = Vec::new();
            for row in rows {
                customers.push(row?);
            }
            Ok(customers)
        })
    }

    /// Connection-level lookup, usable inside an open transaction.
    fn find_by_key(
        conn: &Connection,
        phone_hash: &str,
        owner_admin_id: &str,
    ) -> Result<Option<Customer>, DbError> {
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {CUSTOMER_COLUMNS} FROM customers
                     WHERE phone_hash = ?1 AND owner_admin_id = ?2"
                ),
                params![phone_hash, owner_admin_id],
                Self::map_customer_row,
            )
            .optional()?)
    }

    fn map_customer_row(row: &rusqlite::Row) -> rusqlite::Result<Customer> {
        let raw_extra: String = row.get(9)?;
        let extra_info: HashMap<String, String> = serde_json::from_str(&raw_extra)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;
        Ok(Customer {
            id: row.get(0)?,
            phone_raw: row.get(1)?,
            phone_normalized: row.get(2)?,
            phone_hash: row.get(3)?,
            phone_encrypted: row.get(4)?,
            channel_id: row.get(5)?,
            owner_operator_id: row.get(6)?,
            owner_admin_id: row.get(7)?,
            created_at: row.get(8)?,
            extra_info,
        })
    }
}
