//! Repository interface the core is written against.
//!
//! Create/read/update only: nothing in the core hard-deletes. Implementations
//! must be `Send + Sync` and must make `insert_customer` an atomic
//! check-and-insert on `(phone_hash, owner_admin_id)`.

use crate::error::StoreError;
use crate::scope::{ChannelFilter, CustomerFilter, DuplicateFilter};
use crate::types::{Channel, Customer, DuplicateRecord, User};

/// Outcome of a customer insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerInsert {
    Inserted,
    /// Another customer already holds `(phone_hash, owner_admin_id)`.
    Exists(Customer),
}

pub trait LeadStore: Send + Sync {
    // Users -----------------------------------------------------------------

    fn user(&self, id: &str) -> Result<Option<User>, StoreError>;

    fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// All users, newest first.
    fn users(&self) -> Result<Vec<User>, StoreError>;

    /// Fails with `Conflict` when the username is taken.
    fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    /// Persists the mutable fields: display name, active flag, password.
    fn update_user(&self, user: &User) -> Result<(), StoreError>;

    // Channels --------------------------------------------------------------

    fn channel(&self, id: &str) -> Result<Option<Channel>, StoreError>;

    /// Case-insensitive name lookup.
    fn channel_by_name(&self, name: &str) -> Result<Option<Channel>, StoreError>;

    fn channels(&self, filter: &ChannelFilter) -> Result<Vec<Channel>, StoreError>;

    fn insert_channel(&self, channel: &Channel) -> Result<(), StoreError>;

    /// Persists the mutable fields: name, active flag.
    fn update_channel(&self, channel: &Channel) -> Result<(), StoreError>;

    // Customers -------------------------------------------------------------

    fn customer(&self, id: &str) -> Result<Option<Customer>, StoreError>;

    fn find_customer(
        &self,
        phone_hash: &str,
        owner_admin_id: &str,
    ) -> Result<Option<Customer>, StoreError>;

    fn customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, StoreError>;

    fn insert_customer(&self, customer: &Customer) -> Result<CustomerInsert, StoreError>;

    // Duplicate ledger ------------------------------------------------------

    fn insert_duplicate(&self, record: &DuplicateRecord) -> Result<(), StoreError>;

    fn duplicates(&self, filter: &DuplicateFilter) -> Result<Vec<DuplicateRecord>, StoreError>;

    fn duplicates_for_customer(&self, customer_id: &str)
        -> Result<Vec<DuplicateRecord>, StoreError>;
}
