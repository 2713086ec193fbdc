//! Role-scoped visibility.
//!
//! `Scope::of` is the one place a role tag is turned into predicates. Every
//! listing and statistic goes through the filters produced here; stores may
//! translate a filter into SQL but must return exactly the set `matches`
//! accepts.

use std::collections::BTreeSet;

use crate::error::StoreError;
use crate::store::LeadStore;
use crate::types::{Channel, Customer, DuplicateRecord, Role, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelFilter {
    /// Every active channel.
    Active,
    /// Active channels owned by one admin.
    ActiveOwnedBy(String),
    /// Fail-closed: nothing is visible.
    Nothing,
}

impl ChannelFilter {
    pub fn matches(&self, channel: &Channel) -> bool {
        match self {
            ChannelFilter::Active => channel.is_active,
            ChannelFilter::ActiveOwnedBy(admin_id) => {
                channel.is_active && &channel.owner_admin == admin_id
            }
            ChannelFilter::Nothing => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerFilter {
    All,
    OwnerAdmin(String),
    OwnerOperator(String),
}

impl CustomerFilter {
    pub fn matches(&self, customer: &Customer) -> bool {
        match self {
            CustomerFilter::All => true,
            CustomerFilter::OwnerAdmin(id) => &customer.owner_admin_id == id,
            CustomerFilter::OwnerOperator(id) => &customer.owner_operator_id == id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateFilter {
    All,
    /// Duplicates whose first owner is any of these operators.
    FirstOwnerIn(BTreeSet<String>),
    FirstOwner(String),
}

impl DuplicateFilter {
    pub fn matches(&self, record: &DuplicateRecord) -> bool {
        match self {
            DuplicateFilter::All => true,
            DuplicateFilter::FirstOwnerIn(ids) => ids.contains(&record.first_owner_id),
            DuplicateFilter::FirstOwner(id) => &record.first_owner_id == id,
        }
    }
}

/// What a user may see, resolved from role + hierarchy pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Global,
    Admin {
        admin_id: String,
    },
    Operator {
        operator_id: String,
        admin_id: Option<String>,
    },
}

impl Scope {
    pub fn of(user: &User) -> Self {
        match user.role {
            Role::SuperAdmin => Scope::Global,
            Role::Admin => Scope::Admin {
                admin_id: user.id.clone(),
            },
            Role::Operator => Scope::Operator {
                operator_id: user.id.clone(),
                admin_id: user.parent_id.clone(),
            },
        }
    }

    pub fn channel_filter(&self) -> ChannelFilter {
        match self {
            Scope::Global => ChannelFilter::Active,
            Scope::Admin { admin_id } => ChannelFilter::ActiveOwnedBy(admin_id.clone()),
            Scope::Operator {
                admin_id: Some(admin_id),
                ..
            } => ChannelFilter::ActiveOwnedBy(admin_id.clone()),
            Scope::Operator { admin_id: None, .. } => ChannelFilter::Nothing,
        }
    }

    pub fn customer_filter(&self) -> CustomerFilter {
        match self {
            Scope::Global => CustomerFilter::All,
            Scope::Admin { admin_id } => CustomerFilter::OwnerAdmin(admin_id.clone()),
            Scope::Operator { operator_id, .. } => {
                CustomerFilter::OwnerOperator(operator_id.clone())
            }
        }
    }

    /// Admins see duplicates against any operator they own, active or not.
    pub fn duplicate_filter(&self, store: &dyn LeadStore) -> Result<DuplicateFilter, StoreError> {
        Ok(match self {
            Scope::Global => DuplicateFilter::All,
            Scope::Admin { admin_id } => {
                let operators = store
                    .users()?
                    .into_iter()
                    .filter(|u| u.role == Role::Operator)
                    .filter(|u| u.parent_id.as_deref() == Some(admin_id.as_str()))
                    .map(|u| u.id)
                    .collect();
                DuplicateFilter::FirstOwnerIn(operators)
            }
            Scope::Operator { operator_id, .. } => DuplicateFilter::FirstOwner(operator_id.clone()),
        })
    }

    pub fn admits_customer(&self, customer: &Customer) -> bool {
        self.customer_filter().matches(customer)
    }
}

pub fn visible_channels(store: &dyn LeadStore, user: &User) -> Result<Vec<Channel>, StoreError> {
    store.channels(&Scope::of(user).channel_filter())
}

pub fn visible_customers(store: &dyn LeadStore, user: &User) -> Result<Vec<Customer>, StoreError> {
    store.customers(&Scope::of(user).customer_filter())
}

pub fn scoped_duplicates(
    store: &dyn LeadStore,
    user: &User,
) -> Result<Vec<DuplicateRecord>, StoreError> {
    let filter = Scope::of(user).duplicate_filter(store)?;
    store.duplicates(&filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::test_fixtures::{channel, customer, duplicate, user};

    /// super → {adminA → opA1, opA2}, {adminB → opB1}
    fn hierarchy(store: &MemoryStore) {
        store.insert_user(&user("super", Role::SuperAdmin, None)).unwrap();
        store.insert_user(&user("adminA", Role::Admin, Some("super"))).unwrap();
        store.insert_user(&user("adminB", Role::Admin, Some("super"))).unwrap();
        store.insert_user(&user("opA1", Role::Operator, Some("adminA"))).unwrap();
        store.insert_user(&user("opA2", Role::Operator, Some("adminA"))).unwrap();
        store.insert_user(&user("opB1", Role::Operator, Some("adminB"))).unwrap();

        store.insert_channel(&channel("chA", "adminA", true)).unwrap();
        store.insert_channel(&channel("chA-off", "adminA", false)).unwrap();
        store.insert_channel(&channel("chB", "adminB", true)).unwrap();

        store.insert_customer(&customer("c1", "h1", "opA1", "adminA")).unwrap();
        store.insert_customer(&customer("c2", "h2", "opA2", "adminA")).unwrap();
        store.insert_customer(&customer("c3", "h1", "opB1", "adminB")).unwrap();

        store.insert_duplicate(&duplicate("d1", "c1", "opA1", "opA2")).unwrap();
        store.insert_duplicate(&duplicate("d2", "c3", "opB1", "opB1")).unwrap();
    }

    fn ids<T>(items: &[T], id: impl Fn(&T) -> &str) -> Vec<String> {
        let mut out: Vec<String> = items.iter().map(|i| id(i).to_string()).collect();
        out.sort();
        out
    }

    fn get(store: &MemoryStore, id: &str) -> User {
        store.user(id).unwrap().unwrap()
    }

    #[test]
    fn test_channels_per_role() {
        let store = MemoryStore::new();
        hierarchy(&store);

        let all = visible_channels(&store, &get(&store, "super")).unwrap();
        assert_eq!(ids(&all, |c| c.id.as_str()), vec!["chA", "chB"]);

        let admin = visible_channels(&store, &get(&store, "adminA")).unwrap();
        assert_eq!(ids(&admin, |c| c.id.as_str()), vec!["chA"]);

        let op = visible_channels(&store, &get(&store, "opB1")).unwrap();
        assert_eq!(ids(&op, |c| c.id.as_str()), vec!["chB"]);
    }

    #[test]
    fn test_orphan_operator_sees_no_channels() {
        let store = MemoryStore::new();
        hierarchy(&store);
        let orphan = user("orphan", Role::Operator, None);
        assert!(visible_channels(&store, &orphan).unwrap().is_empty());
    }

    #[test]
    fn test_customers_per_role() {
        let store = MemoryStore::new();
        hierarchy(&store);

        let all = visible_customers(&store, &get(&store, "super")).unwrap();
        assert_eq!(ids(&all, |c| c.id.as_str()), vec!["c1", "c2", "c3"]);

        let admin = visible_customers(&store, &get(&store, "adminA")).unwrap();
        assert_eq!(ids(&admin, |c| c.id.as_str()), vec!["c1", "c2"]);

        let op = visible_customers(&store, &get(&store, "opA2")).unwrap();
        assert_eq!(ids(&op, |c| c.id.as_str()), vec!["c2"]);
    }

    #[test]
    fn test_scope_containment_for_every_user() {
        let store = MemoryStore::new();
        hierarchy(&store);
        let everything = store.customers(&CustomerFilter::All).unwrap();

        for u in store.users().unwrap() {
            let visible = visible_customers(&store, &u).unwrap();
            assert!(visible.iter().all(|c| everything.contains(c)));
            let expected: Vec<&Customer> = everything
                .iter()
                .filter(|c| match u.role {
                    Role::SuperAdmin => true,
                    Role::Admin => c.owner_admin_id == u.id,
                    Role::Operator => c.owner_operator_id == u.id,
                })
                .collect();
            assert_eq!(visible.len(), expected.len(), "user {}", u.id);
        }
    }

    #[test]
    fn test_duplicates_per_role() {
        let store = MemoryStore::new();
        hierarchy(&store);

        let all = scoped_duplicates(&store, &get(&store, "super")).unwrap();
        assert_eq!(ids(&all, |d| d.id.as_str()), vec!["d1", "d2"]);

        let admin = scoped_duplicates(&store, &get(&store, "adminA")).unwrap();
        assert_eq!(ids(&admin, |d| d.id.as_str()), vec!["d1"]);

        // opA2 re-submitted but opA1 is the first owner.
        let resubmitter = scoped_duplicates(&store, &get(&store, "opA2")).unwrap();
        assert!(resubmitter.is_empty());
        let owner = scoped_duplicates(&store, &get(&store, "opA1")).unwrap();
        assert_eq!(ids(&owner, |d| d.id.as_str()), vec!["d1"]);
    }

    #[test]
    fn test_admits_customer() {
        let c = customer("c1", "h1", "opA1", "adminA");
        let op = user("opA1", Role::Operator, Some("adminA"));
        let other = user("opA2", Role::Operator, Some("adminA"));
        assert!(Scope::of(&op).admits_customer(&c));
        assert!(!Scope::of(&other).admits_customer(&c));
        assert!(Scope::of(&user("adminA", Role::Admin, Some("super"))).admits_customer(&c));
    }
}
