//! Phone submission and duplicate detection.
//!
//! A submission is normalized, fingerprinted, and looked up under the
//! submitting operator's admin. The first operator to register a phone under
//! an admin owns it; every later attempt under that admin is appended to the
//! duplicate ledger. Admins never see each other's phones, so the same number
//! may be owned once per admin.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::crypto::CryptoService;
use crate::error::{AuthorizationError, LeadError};
use crate::phone;
use crate::store::{CustomerInsert, LeadStore};
use crate::types::{Customer, DuplicateRecord, Role, SubmissionOutcome, User};

pub struct DedupEngine {
    store: Arc<dyn LeadStore>,
    crypto: Arc<CryptoService>,
}

impl DedupEngine {
    pub fn new(store: Arc<dyn LeadStore>, crypto: Arc<CryptoService>) -> Self {
        Self { store, crypto }
    }

    /// Submit a phone number on behalf of `operator_id`.
    pub fn submit(
        &self,
        phone_raw: &str,
        channel_id: &str,
        operator_id: &str,
    ) -> Result<SubmissionOutcome, LeadError> {
        self.submit_with_info(phone_raw, channel_id, operator_id, HashMap::new())
    }

    /// Like [`submit`](Self::submit), attaching free-form details to a newly
    /// created customer. The details are dropped on the duplicate path.
    pub fn submit_with_info(
        &self,
        phone_raw: &str,
        channel_id: &str,
        operator_id: &str,
        extra_info: HashMap<String, String>,
    ) -> Result<SubmissionOutcome, LeadError> {
        let (operator, admin_id) = self.submitting_operator(operator_id)?;

        let phone_normalized = phone::normalize(phone_raw)?;
        let phone_hash = self.crypto.fingerprint(&phone_normalized);

        if let Some(existing) = self.store.find_customer(&phone_hash, &admin_id)? {
            return self.record_duplicate(existing, &operator, channel_id);
        }

        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            phone_raw: phone_raw.to_string(),
            phone_encrypted: self.crypto.encrypt(&phone_normalized)?,
            phone_normalized,
            phone_hash,
            channel_id: channel_id.to_string(),
            owner_operator_id: operator.id.clone(),
            owner_admin_id: admin_id,
            created_at: Utc::now(),
            extra_info,
        };

        match self.store.insert_customer(&customer)? {
            CustomerInsert::Inserted => {
                log::info!(
                    "Customer {} created by operator {} on channel {}",
                    customer.id,
                    operator.id,
                    channel_id
                );
                Ok(SubmissionOutcome::Created {
                    customer_id: customer.id,
                })
            }
            // Lost a race with a concurrent submitter.
            CustomerInsert::Exists(existing) => {
                self.record_duplicate(existing, &operator, channel_id)
            }
        }
    }

    /// Submit on behalf of `operator_id` while acting as `actor`.
    ///
    /// Operators may only submit for themselves, admins for their own
    /// operators, and the super admin for anyone.
    pub fn submit_as(
        &self,
        actor: &User,
        phone_raw: &str,
        channel_id: &str,
        operator_id: &str,
    ) -> Result<SubmissionOutcome, LeadError> {
        let actor = self
            .store
            .user(&actor.id)?
            .ok_or_else(|| AuthorizationError::UnknownUser(actor.id.clone()))?;
        if !actor.is_active {
            return Err(AuthorizationError::Inactive(actor.id).into());
        }
        let allowed = match actor.role {
            Role::SuperAdmin => true,
            Role::Operator => actor.id == operator_id,
            Role::Admin => self.store.user(operator_id)?.is_some_and(|u| {
                u.is_operator() && u.parent_id.as_deref() == Some(actor.id.as_str())
            }),
        };
        if !allowed {
            return Err(AuthorizationError::Forbidden(format!(
                "{} may not submit for {}",
                actor.id, operator_id
            ))
            .into());
        }
        self.submit(phone_raw, channel_id, operator_id)
    }

    /// Every duplicate attempt against one customer, newest first.
    pub fn duplicates_of(&self, customer_id: &str) -> Result<Vec<DuplicateRecord>, LeadError> {
        Ok(self.store.duplicates_for_customer(customer_id)?)
    }

    /// Resolve an active operator and the admin it submits under.
    fn submitting_operator(&self, operator_id: &str) -> Result<(User, String), LeadError> {
        let operator = self
            .store
            .user(operator_id)?
            .ok_or_else(|| AuthorizationError::UnknownUser(operator_id.to_string()))?;
        if !operator.is_active {
            return Err(AuthorizationError::Inactive(operator.id).into());
        }
        if !operator.is_operator() {
            return Err(AuthorizationError::NotOperator(operator.id).into());
        }
        match operator.parent_id.clone() {
            Some(admin_id) => Ok((operator, admin_id)),
            None => Err(AuthorizationError::MissingAdmin(operator.id).into()),
        }
    }

    fn record_duplicate(
        &self,
        existing: Customer,
        operator: &User,
        channel_id: &str,
    ) -> Result<SubmissionOutcome, LeadError> {
        let record = DuplicateRecord {
            id: Uuid::new_v4().to_string(),
            customer_id: existing.id.clone(),
            first_owner_id: existing.owner_operator_id.clone(),
            duplicate_operator_id: operator.id.clone(),
            duplicate_channel_id: channel_id.to_string(),
            duplicate_at: Utc::now(),
        };
        self.store.insert_duplicate(&record)?;

        log::info!(
            "Duplicate {} against customer {} by operator {}",
            record.id,
            existing.id,
            operator.id
        );

        let existing_owner = self
            .store
            .user(&existing.owner_operator_id)?
            .map(|owner| owner.summary());
        let existing_channel_name = self
            .store
            .channel(&existing.channel_id)?
            .map(|channel| channel.name);

        Ok(SubmissionOutcome::Duplicate {
            duplicate_id: record.id,
            existing_owner,
            existing_created_at: existing.created_at,
            existing_channel_id: existing.channel_id,
            existing_channel_name,
        })
    }
}
