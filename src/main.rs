//! LeadGuard bootstrap.
//!
//! Loads config (`~/.leadguard/config.json`, or the path given as the first
//! argument), opens the database and applies pending migrations, seeds the
//! root account from `bootstrap`, then logs what the store holds.
//!
//! Usage: `leadguard [config.json]`

use std::path::PathBuf;
use std::process::ExitCode;

use leadguard_lib::error::LeadError;
use leadguard_lib::scope::{CustomerFilter, DuplicateFilter};
use leadguard_lib::state::{load_config, load_config_from, AppState};

fn run() -> Result<(), LeadError> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config_from(&PathBuf::from(path))?,
        None => load_config()?,
    };

    let state = AppState::from_config(config)?;
    match state.bootstrap()? {
        Some(root) => log::info!("Super admin: {} ({})", root.username, root.id),
        None => log::warn!("No bootstrap account configured; skipping root seeding"),
    }

    let store = state.store();
    let users = store.users()?;
    let customers = store.customers(&CustomerFilter::All)?;
    let duplicates = store.duplicates(&DuplicateFilter::All)?;
    log::info!(
        "Ready: {} users, {} customers, {} duplicate attempts (stats zone {})",
        users.len(),
        customers.len(),
        duplicates.len(),
        state.config.time_zone
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            log::error!("{}", e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}
