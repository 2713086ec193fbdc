//! LeadGuard: phone-lead deduplication with role-scoped visibility.
//!
//! Operators submit phone numbers under their admin. The first submitter owns
//! the number within that admin's book; later submissions are recorded as
//! duplicates. Super admins, admins and operators each see their own slice of
//! customers, duplicates and statistics through [`scope::Scope`].

pub mod crypto;
pub mod db;
pub mod dedup;
pub mod directory;
pub mod error;
pub mod memory_store;
mod migrations;
pub mod phone;
pub mod scope;
pub mod services;
pub mod state;
pub mod stats;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_fixtures;

pub use error::LeadError;
pub use state::AppState;
