//! In-process `LeadStore`. One lock covers every table, so check-and-insert
//! on customers is trivially atomic.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::scope::{ChannelFilter, CustomerFilter, DuplicateFilter};
use crate::store::{CustomerInsert, LeadStore};
use crate::types::{Channel, Customer, DuplicateRecord, User};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    channels: HashMap<String, Channel>,
    customers: HashMap<String, Customer>,
    /// (phone_hash, owner_admin_id) → customer id
    customer_keys: HashMap<(String, String), String>,
    duplicates: Vec<DuplicateRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(mut items: Vec<T>, key: impl Fn(&T) -> (DateTime<Utc>, String)) -> Vec<T> {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items
}

impl LeadStore for MemoryStore {
    fn user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().users.get(id).cloned())
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    fn users(&self) -> Result<Vec<User>, StoreError> {
        let users = self.tables.read().users.values().cloned().collect();
        Ok(newest_first(users, |u| (u.created_at, u.id.clone())))
    }

    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!("username {}", user.username)));
        }
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {}", user.id)));
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let existing = tables
            .users
            .get_mut(&user.id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user.id)))?;
        existing.display_name = user.display_name.clone();
        existing.is_active = user.is_active;
        existing.password_salt = user.password_salt.clone();
        existing.password_hash = user.password_hash.clone();
        Ok(())
    }

    fn channel(&self, id: &str) -> Result<Option<Channel>, StoreError> {
        Ok(self.tables.read().channels.get(id).cloned())
    }

    fn channel_by_name(&self, name: &str) -> Result<Option<Channel>, StoreError> {
        let wanted = name.to_lowercase();
        Ok(self
            .tables
            .read()
            .channels
            .values()
            .find(|c| c.name.to_lowercase() == wanted)
            .cloned())
    }

    fn channels(&self, filter: &ChannelFilter) -> Result<Vec<Channel>, StoreError> {
        let channels = self
            .tables
            .read()
            .channels
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        Ok(newest_first(channels, |c| (c.created_at, c.id.clone())))
    }

    fn insert_channel(&self, channel: &Channel) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let wanted = channel.name.to_lowercase();
        if tables
            .channels
            .values()
            .any(|c| c.id == channel.id || c.name.to_lowercase() == wanted)
        {
            return Err(StoreError::Conflict(format!("channel {}", channel.name)));
        }
        tables.channels.insert(channel.id.clone(), channel.clone());
        Ok(())
    }

    fn update_channel(&self, channel: &Channel) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let existing = tables
            .channels
            .get_mut(&channel.id)
            .ok_or_else(|| StoreError::NotFound(format!("channel {}", channel.id)))?;
        existing.name = channel.name.clone();
        existing.is_active = channel.is_active;
        Ok(())
    }

    fn customer(&self, id: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.tables.read().customers.get(id).cloned())
    }

    fn find_customer(
        &self,
        phone_hash: &str,
        owner_admin_id: &str,
    ) -> Result<Option<Customer>, StoreError> {
        let tables = self.tables.read();
        let key = (phone_hash.to_string(), owner_admin_id.to_string());
        Ok(tables
            .customer_keys
            .get(&key)
            .and_then(|id| tables.customers.get(id))
            .cloned())
    }

    fn customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, StoreError> {
        let customers = self
            .tables
            .read()
            .customers
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        Ok(newest_first(customers, |c| (c.created_at, c.id.clone())))
    }

    fn insert_customer(&self, customer: &Customer) -> Result<CustomerInsert, StoreError> {
        let mut tables = self.tables.write();
        let key = (
            customer.phone_hash.clone(),
            customer.owner_admin_id.clone(),
        );
        if let Some(existing) = tables
            .customer_keys
            .get(&key)
            .and_then(|id| tables.customers.get(id))
        {
            return Ok(CustomerInsert::Exists(existing.clone()));
        }
        if tables.customers.contains_key(&customer.id) {
            return Err(StoreError::Conflict(format!("customer {}", customer.id)));
        }
        tables.customer_keys.insert(key, customer.id.clone());
        tables.customers.insert(customer.id.clone(), customer.clone());
        Ok(CustomerInsert::Inserted)
    }

    fn insert_duplicate(&self, record: &DuplicateRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.duplicates.iter().any(|d| d.id == record.id) {
            return Err(StoreError::Conflict(format!("duplicate {}", record.id)));
        }
        tables.duplicates.push(record.clone());
        Ok(())
    }

    fn duplicates(&self, filter: &DuplicateFilter) -> Result<Vec<DuplicateRecord>, StoreError> {
        let records = self
            .tables
            .read()
            .duplicates
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        Ok(newest_first(records, |d| (d.duplicate_at, d.id.clone())))
    }

    fn duplicates_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<DuplicateRecord>, StoreError> {
        let records = self
            .tables
            .read()
            .duplicates
            .iter()
            .filter(|d| d.customer_id == customer_id)
            .cloned()
            .collect();
        Ok(newest_first(records, |d| (d.duplicate_at, d.id.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{channel, customer, user};
    use crate::types::Role;

    #[test]
    fn test_customer_key_is_unique_per_admin() {
        let store = MemoryStore::new();
        let first = customer("c1", "h1", "op1", "admin1");
        assert_eq!(store.insert_customer(&first).unwrap(), CustomerInsert::Inserted);

        let second = customer("c2", "h1", "op2", "admin1");
        assert_eq!(
            store.insert_customer(&second).unwrap(),
            CustomerInsert::Exists(first.clone())
        );

        let other_admin = customer("c3", "h1", "op3", "admin2");
        assert_eq!(
            store.insert_customer(&other_admin).unwrap(),
            CustomerInsert::Inserted
        );
        assert_eq!(store.customers(&CustomerFilter::All).unwrap().len(), 2);
        assert_eq!(store.find_customer("h1", "admin1").unwrap(), Some(first));
    }

    #[test]
    fn test_username_conflict() {
        let store = MemoryStore::new();
        store.insert_user(&user("a", Role::Admin, None)).unwrap();
        let mut clash = user("b", Role::Admin, None);
        clash.username = "a".into();
        assert!(matches!(
            store.insert_user(&clash),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_channel_name_case_insensitive() {
        let store = MemoryStore::new();
        let mut ch = channel("ch1", "admin1", true);
        ch.name = "Facebook-US".into();
        store.insert_channel(&ch).unwrap();
        assert!(store.channel_by_name("facebook-us").unwrap().is_some());

        let mut clash = channel("ch2", "admin1", true);
        clash.name = "FACEBOOK-us".into();
        assert!(matches!(
            store.insert_channel(&clash),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_update_missing_user_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update_user(&user("ghost", Role::Operator, None)),
            Err(StoreError::NotFound(_))
        ));
    }
}
