use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Configuration
// =============================================================================

/// Engine configuration, read from `~/.leadguard/config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// SQLite file. Defaults to `~/.leadguard/leadguard.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
    /// IANA zone that daily/weekly/monthly windows are evaluated in.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// Base64 AES-256 key for phone-at-rest encryption. When absent a
    /// per-process key is generated and earlier ciphertexts become unreadable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_key: Option<String>,
    /// Root account seeded on first start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapAccount {
    pub username: String,
    pub display_name: String,
    pub password: String,
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            time_zone: default_time_zone(),
            phone_key: None,
            bootstrap: None,
        }
    }
}

// =============================================================================
// Directory
// =============================================================================

/// Three-level hierarchy: superAdmin → admin → operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Operator => "operator",
        }
    }

    /// The role a user's `parent_id` must point at.
    pub fn parent_role(&self) -> Option<Role> {
        match self {
            Role::SuperAdmin => None,
            Role::Admin => Some(Role::SuperAdmin),
            Role::Operator => Some(Role::Admin),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "operator" => Ok(Role::Operator),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub parent_id: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing, default)]
    pub password_salt: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }

    pub fn summary(&self) -> OwnerSummary {
        OwnerSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Input for the directory's create operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub password: String,
}

/// Display identity of a user; what a duplicate outcome reveals about the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

// =============================================================================
// Channels, customers, duplicates
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub owner_admin: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    /// Original input; display only.
    pub phone_raw: String,
    pub phone_normalized: String,
    pub phone_hash: String,
    pub phone_encrypted: String,
    pub channel_id: String,
    pub owner_operator_id: String,
    pub owner_admin_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub extra_info: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRecord {
    pub id: String,
    pub customer_id: String,
    pub first_owner_id: String,
    pub duplicate_operator_id: String,
    pub duplicate_channel_id: String,
    pub duplicate_at: DateTime<Utc>,
}

/// Result of a phone submission. A duplicate is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SubmissionOutcome {
    #[serde(rename_all = "camelCase")]
    Created { customer_id: String },
    #[serde(rename_all = "camelCase")]
    Duplicate {
        duplicate_id: String,
        existing_owner: Option<OwnerSummary>,
        existing_created_at: DateTime<Utc>,
        existing_channel_id: String,
        /// `None` when the channel id no longer resolves.
        existing_channel_name: Option<String>,
    },
}

impl SubmissionOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, SubmissionOutcome::Duplicate { .. })
    }
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsRange {
    Daily,
    Weekly,
    Monthly,
}

impl StatsRange {
    pub const ALL: [StatsRange; 3] = [StatsRange::Daily, StatsRange::Weekly, StatsRange::Monthly];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_input: usize,
    pub duplicate_count: usize,
    pub valid_count: usize,
}
