//! Row builders shared by unit tests.

use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};

use crate::crypto::hash_password;
use crate::types::{Channel, Customer, DuplicateRecord, Role, User};

/// Password every fixture user is created with.
pub const PASSWORD: &str = "secret123";

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Active user whose username equals its id.
pub fn user(id: &str, role: Role, parent: Option<&str>) -> User {
    let (password_salt, password_hash) = hash_password(PASSWORD);
    User {
        id: id.to_string(),
        username: id.to_string(),
        display_name: format!("{id} display"),
        role,
        parent_id: parent.map(str::to_string),
        is_active: true,
        password_salt,
        password_hash,
        created_at: now(),
    }
}

/// Channel named after its id, created by its owning admin.
pub fn channel(id: &str, owner_admin: &str, active: bool) -> Channel {
    Channel {
        id: id.to_string(),
        name: id.to_string(),
        created_by: owner_admin.to_string(),
        owner_admin: owner_admin.to_string(),
        is_active: active,
        created_at: now(),
    }
}

pub fn customer(id: &str, phone_hash: &str, operator: &str, admin: &str) -> Customer {
    Customer {
        id: id.to_string(),
        phone_raw: "555-0100".to_string(),
        phone_normalized: "5550100".to_string(),
        phone_hash: phone_hash.to_string(),
        phone_encrypted: "ciphertext".to_string(),
        channel_id: "ch".to_string(),
        owner_operator_id: operator.to_string(),
        owner_admin_id: admin.to_string(),
        created_at: now(),
        extra_info: HashMap::new(),
    }
}

pub fn duplicate(
    id: &str,
    customer_id: &str,
    first_owner: &str,
    duplicate_operator: &str,
) -> DuplicateRecord {
    DuplicateRecord {
        id: id.to_string(),
        customer_id: customer_id.to_string(),
        first_owner_id: first_owner.to_string(),
        duplicate_operator_id: duplicate_operator.to_string(),
        duplicate_channel_id: "ch".to_string(),
        duplicate_at: now(),
    }
}
