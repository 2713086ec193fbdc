// Customer views: scoped listing, phone reveal, and duplicate history.
// Every read starts from the caller's scope; nothing here filters by role directly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::CryptoService;
use crate::error::{LeadError, StoreError};
use crate::phone;
use crate::scope::{visible_customers, Scope};
use crate::store::LeadStore;
use crate::types::{Customer, DuplicateRecord, User};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 200;

/// Search and paging for [`list_customers`]. Pages are 1-based.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerQuery {
    /// Case-insensitive substring of channel name, operator username, or
    /// admin username.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_size")]
    pub size: usize,
}

fn default_page() -> usize {
    1
}

fn default_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for CustomerQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: default_page(),
            size: default_size(),
        }
    }
}

/// A customer row as lists show it: names resolved, phone masked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    pub id: String,
    pub channel_id: String,
    pub channel_name: Option<String>,
    pub owner_operator_id: String,
    pub operator_username: Option<String>,
    pub owner_admin_id: String,
    pub admin_username: Option<String>,
    pub phone_masked: String,
    pub created_at: DateTime<Utc>,
}

impl CustomerView {
    fn matches(&self, needle: &str) -> bool {
        [&self.channel_name, &self.operator_username, &self.admin_username]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Memoized id → name lookups for one listing.
struct Names<'a> {
    store: &'a dyn LeadStore,
    users: HashMap<String, Option<String>>,
    channels: HashMap<String, Option<String>>,
}

impl<'a> Names<'a> {
    fn new(store: &'a dyn LeadStore) -> Self {
        Self {
            store,
            users: HashMap::new(),
            channels: HashMap::new(),
        }
    }

    fn username(&mut self, id: &str) -> Result<Option<String>, StoreError> {
        if let Some(name) = self.users.get(id) {
            return Ok(name.clone());
        }
        let name = self.store.user(id)?.map(|u| u.username);
        self.users.insert(id.to_string(), name.clone());
        Ok(name)
    }

    fn channel_name(&mut self, id: &str) -> Result<Option<String>, StoreError> {
        if let Some(name) = self.channels.get(id) {
            return Ok(name.clone());
        }
        let name = self.store.channel(id)?.map(|c| c.name);
        self.channels.insert(id.to_string(), name.clone());
        Ok(name)
    }

    fn view(&mut self, customer: Customer) -> Result<CustomerView, StoreError> {
        Ok(CustomerView {
            channel_name: self.channel_name(&customer.channel_id)?,
            operator_username: self.username(&customer.owner_operator_id)?,
            admin_username: self.username(&customer.owner_admin_id)?,
            phone_masked: phone::mask(&customer.phone_normalized),
            id: customer.id,
            channel_id: customer.channel_id,
            owner_operator_id: customer.owner_operator_id,
            owner_admin_id: customer.owner_admin_id,
            created_at: customer.created_at,
        })
    }
}

/// One page of the caller's customers, newest first.
pub fn list_customers(
    store: &dyn LeadStore,
    user: &User,
    query: &CustomerQuery,
) -> Result<Vec<CustomerView>, LeadError> {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let page = query.page.max(1);
    let size = query.size.clamp(1, MAX_PAGE_SIZE);

    let mut names = Names::new(store);
    let mut views = Vec::new();
    for customer in visible_customers(store, user)? {
        let view = names.view(customer)?;
        if needle.as_deref().map_or(true, |n| view.matches(n)) {
            views.push(view);
        }
    }

    Ok(views
        .into_iter()
        .skip((page - 1).saturating_mul(size))
        .take(size)
        .collect())
}

/// A customer the caller may see. Out-of-scope ids read as missing.
fn scoped_customer(
    store: &dyn LeadStore,
    user: &User,
    customer_id: &str,
) -> Result<Customer, LeadError> {
    store
        .customer(customer_id)?
        .filter(|c| Scope::of(user).admits_customer(c))
        .ok_or_else(|| StoreError::NotFound(format!("customer {customer_id}")).into())
}

/// Decrypt the stored phone of a customer in the caller's scope.
pub fn reveal_phone(
    store: &dyn LeadStore,
    crypto: &CryptoService,
    user: &User,
    customer_id: &str,
) -> Result<String, LeadError> {
    let customer = scoped_customer(store, user, customer_id)?;
    let phone = crypto.decrypt(&customer.phone_encrypted)?;
    log::info!("Phone of customer {} revealed to {}", customer.id, user.id);
    Ok(phone)
}

/// Duplicate history of a customer in the caller's scope, newest first.
pub fn visible_duplicates_of(
    store: &dyn LeadStore,
    user: &User,
    customer_id: &str,
) -> Result<Vec<DuplicateRecord>, LeadError> {
    let customer = scoped_customer(store, user, customer_id)?;
    Ok(store.duplicates_for_customer(&customer.id)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dedup::DedupEngine;
    use crate::error::CryptoError;
    use crate::memory_store::MemoryStore;
    use crate::test_fixtures::{channel, user};
    use crate::types::{Role, SubmissionOutcome};

    struct Fixture {
        store: Arc<dyn LeadStore>,
        crypto: Arc<CryptoService>,
        engine: DedupEngine,
    }

    impl Fixture {
        fn new() -> Self {
            let store: Arc<dyn LeadStore> = Arc::new(MemoryStore::new());
            store.insert_user(&user("super", Role::SuperAdmin, None)).unwrap();
            store.insert_user(&user("adminA", Role::Admin, Some("super"))).unwrap();
            store.insert_user(&user("adminB", Role::Admin, Some("super"))).unwrap();
            store.insert_user(&user("opA1", Role::Operator, Some("adminA"))).unwrap();
            store.insert_user(&user("opA2", Role::Operator, Some("adminA"))).unwrap();
            store.insert_user(&user("opB1", Role::Operator, Some("adminB"))).unwrap();
            let mut facebook = channel("chFacebook", "adminA", true);
            facebook.name = "Facebook".into();
            store.insert_channel(&facebook).unwrap();
            let mut google = channel("chGoogle", "adminB", true);
            google.name = "Google".into();
            store.insert_channel(&google).unwrap();

            let crypto = Arc::new(CryptoService::ephemeral());
            let engine = DedupEngine::new(store.clone(), crypto.clone());
            Self {
                store,
                crypto,
                engine,
            }
        }

        fn user(&self, id: &str) -> User {
            self.store.user(id).unwrap().unwrap()
        }

        fn created(&self, phone: &str, channel: &str, operator: &str) -> String {
            match self.engine.submit(phone, channel, operator).unwrap() {
                SubmissionOutcome::Created { customer_id } => customer_id,
                other => panic!("expected Created, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_listing_is_scoped_and_resolves_names() {
        let f = Fixture::new();
        f.created("5550001", "chFacebook", "opA1");
        f.created("5550002", "chFacebook", "opA2");
        f.created("5550003", "chGoogle", "opB1");

        let admin_a = list_customers(f.store.as_ref(), &f.user("adminA"), &CustomerQuery::default())
            .unwrap();
        assert_eq!(admin_a.len(), 2);
        assert!(admin_a.iter().all(|v| v.admin_username.as_deref() == Some("adminA")));
        assert!(admin_a.iter().all(|v| v.channel_name.as_deref() == Some("Facebook")));

        let op = list_customers(f.store.as_ref(), &f.user("opA1"), &CustomerQuery::default())
            .unwrap();
        assert_eq!(op.len(), 1);
        assert_eq!(op[0].phone_masked, "*550001");

        let all = list_customers(f.store.as_ref(), &f.user("super"), &CustomerQuery::default())
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_search_matches_channel_and_usernames() {
        let f = Fixture::new();
        f.created("5550001", "chFacebook", "opA1");
        f.created("5550002", "chFacebook", "opA2");
        f.created("5550003", "chGoogle", "opB1");
        let super_admin = f.user("super");
        let search = |q: &str| {
            let query = CustomerQuery {
                search: Some(q.to_string()),
                ..Default::default()
            };
            list_customers(f.store.as_ref(), &super_admin, &query).unwrap().len()
        };

        assert_eq!(search("GOOGLE"), 1);
        assert_eq!(search("opa2"), 1);
        assert_eq!(search("adminA"), 2);
        assert_eq!(search("  "), 3);
        assert_eq!(search("nothing-like-this"), 0);
    }

    #[test]
    fn test_pagination_newest_first() {
        let f = Fixture::new();
        let ids: Vec<String> = (0..5)
            .map(|i| f.created(&format!("555000{i}"), "chFacebook", "opA1"))
            .collect();
        let admin = f.user("adminA");
        let page = |page, size| {
            let query = CustomerQuery {
                search: None,
                page,
                size,
            };
            list_customers(f.store.as_ref(), &admin, &query)
                .unwrap()
                .into_iter()
                .map(|v| v.id)
                .collect::<Vec<_>>()
        };

        let everything = page(1, 20);
        assert_eq!(everything.len(), 5);
        assert_eq!(page(1, 2), everything[..2].to_vec());
        assert_eq!(page(3, 2), everything[4..].to_vec());
        assert!(page(4, 2).is_empty());
        // page 0 is read as the first page
        assert_eq!(page(0, 2), page(1, 2));
        for id in ids {
            assert!(everything.contains(&id));
        }
    }

    #[test]
    fn test_reveal_phone_respects_scope() {
        let f = Fixture::new();
        let id = f.created("+1 (555) 123-4567", "chFacebook", "opA1");

        let phone = reveal_phone(f.store.as_ref(), &f.crypto, &f.user("adminA"), &id).unwrap();
        assert_eq!(phone, "15551234567");

        assert!(matches!(
            reveal_phone(f.store.as_ref(), &f.crypto, &f.user("opA2"), &id),
            Err(LeadError::Store(StoreError::NotFound(_)))
        ));
        assert!(matches!(
            reveal_phone(f.store.as_ref(), &f.crypto, &f.user("adminB"), &id),
            Err(LeadError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn test_reveal_with_foreign_key_fails_to_decrypt() {
        let f = Fixture::new();
        let id = f.created("5550001", "chFacebook", "opA1");
        let other = CryptoService::ephemeral();
        assert!(matches!(
            reveal_phone(f.store.as_ref(), &other, &f.user("super"), &id),
            Err(LeadError::Crypto(CryptoError::Decryption))
        ));
    }

    #[test]
    fn test_duplicate_history_is_scoped() {
        let f = Fixture::new();
        let id = f.created("5550001", "chFacebook", "opA1");
        f.engine.submit("5550001", "chFacebook", "opA2").unwrap();
        f.engine.submit("5550001", "chFacebook", "opA2").unwrap();

        let history = visible_duplicates_of(f.store.as_ref(), &f.user("opA1"), &id).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|d| d.duplicate_operator_id == "opA2"));

        assert!(visible_duplicates_of(f.store.as_ref(), &f.user("opA2"), &id).is_err());
        assert!(visible_duplicates_of(f.store.as_ref(), &f.user("adminB"), &id).is_err());
        assert_eq!(
            visible_duplicates_of(f.store.as_ref(), &f.user("super"), &id)
                .unwrap()
                .len(),
            2
        );
    }
}
