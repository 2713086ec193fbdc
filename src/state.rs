use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono_tz::Tz;

use crate::crypto::CryptoService;
use crate::db::LeadDb;
use crate::dedup::DedupEngine;
use crate::directory::Directory;
use crate::error::{ConfigError, CryptoError, LeadError};
use crate::scope;
use crate::services::customers::{self, CustomerQuery, CustomerView};
use crate::stats::StatsAggregator;
use crate::store::LeadStore;
use crate::types::{
    Channel, Config, Customer, DuplicateRecord, NewUser, StatsRange, StatsSummary,
    SubmissionOutcome, User,
};

/// Env var holding a base64 phone key; wins over `phoneKey` in config.json.
pub const PHONE_KEY_ENV: &str = "LEADGUARD_PHONE_KEY";

/// Everything the presentation layer talks to, wired around one store.
pub struct AppState {
    pub config: Config,
    store: Arc<dyn LeadStore>,
    crypto: Arc<CryptoService>,
    engine: DedupEngine,
    directory: Directory,
    stats: StatsAggregator,
}

impl AppState {
    /// Load `~/.leadguard/config.json` and open the configured database.
    pub fn new() -> Result<Self, LeadError> {
        Self::from_config(load_config()?)
    }

    pub fn from_config(config: Config) -> Result<Self, LeadError> {
        let db = match config.db_path.as_deref() {
            Some(path) => LeadDb::open_at(PathBuf::from(path))?,
            None => LeadDb::open()?,
        };
        Self::with_store(config, Arc::new(db))
    }

    /// Wire the components around an already-open store.
    pub fn with_store(config: Config, store: Arc<dyn LeadStore>) -> Result<Self, LeadError> {
        let tz = resolve_time_zone(&config.time_zone)?;
        let env_key = std::env::var(PHONE_KEY_ENV).ok();
        let crypto = Arc::new(crypto_for(&config, env_key.as_deref())?);

        Ok(Self {
            engine: DedupEngine::new(store.clone(), crypto.clone()),
            directory: Directory::new(store.clone()),
            stats: StatsAggregator::new(store.clone(), tz),
            store,
            crypto,
            config,
        })
    }

    pub fn store(&self) -> &dyn LeadStore {
        self.store.as_ref()
    }

    pub fn crypto(&self) -> &CryptoService {
        &self.crypto
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    // =========================================================================
    // Core operations
    // =========================================================================

    pub fn authenticate(&self, username: &str, password: &str) -> Result<User, LeadError> {
        self.directory.authenticate(username, password)
    }

    pub fn visible_channels(&self, user: &User) -> Result<Vec<Channel>, LeadError> {
        Ok(scope::visible_channels(self.store(), user)?)
    }

    pub fn visible_customers(&self, user: &User) -> Result<Vec<Customer>, LeadError> {
        Ok(scope::visible_customers(self.store(), user)?)
    }

    pub fn submit(
        &self,
        phone_raw: &str,
        channel_id: &str,
        operator_id: &str,
    ) -> Result<SubmissionOutcome, LeadError> {
        self.engine.submit(phone_raw, channel_id, operator_id)
    }

    pub fn submit_as(
        &self,
        actor: &User,
        phone_raw: &str,
        channel_id: &str,
        operator_id: &str,
    ) -> Result<SubmissionOutcome, LeadError> {
        self.engine.submit_as(actor, phone_raw, channel_id, operator_id)
    }

    pub fn duplicates_of(&self, customer_id: &str) -> Result<Vec<DuplicateRecord>, LeadError> {
        self.engine.duplicates_of(customer_id)
    }

    pub fn stats(&self, user: &User, range: StatsRange) -> Result<StatsSummary, LeadError> {
        self.stats.stats(user, range)
    }

    // =========================================================================
    // Customer views
    // =========================================================================

    pub fn list_customers(
        &self,
        user: &User,
        query: &CustomerQuery,
    ) -> Result<Vec<CustomerView>, LeadError> {
        customers::list_customers(self.store(), user, query)
    }

    pub fn reveal_phone(&self, user: &User, customer_id: &str) -> Result<String, LeadError> {
        customers::reveal_phone(self.store(), &self.crypto, user, customer_id)
    }

    pub fn visible_duplicates_of(
        &self,
        user: &User,
        customer_id: &str,
    ) -> Result<Vec<DuplicateRecord>, LeadError> {
        customers::visible_duplicates_of(self.store(), user, customer_id)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Seed the root account from `config.bootstrap`, if one is configured.
    pub fn bootstrap(&self) -> Result<Option<User>, LeadError> {
        match &self.config.bootstrap {
            Some(account) => self
                .directory
                .ensure_super_admin(&account.username, &account.display_name, &account.password)
                .map(Some),
            None => Ok(None),
        }
    }

    pub fn create_admin(&self, actor: &User, new_user: NewUser) -> Result<User, LeadError> {
        self.directory.create_admin(actor, new_user)
    }

    pub fn create_operator(
        &self,
        actor: &User,
        new_user: NewUser,
        owner_admin_id: Option<&str>,
    ) -> Result<User, LeadError> {
        self.directory.create_operator(actor, new_user, owner_admin_id)
    }

    pub fn create_channel(
        &self,
        actor: &User,
        name: &str,
        owner_admin_id: Option<&str>,
    ) -> Result<Channel, LeadError> {
        self.directory.create_channel(actor, name, owner_admin_id)
    }

    pub fn set_user_active(
        &self,
        actor: &User,
        user_id: &str,
        active: bool,
    ) -> Result<User, LeadError> {
        self.directory.set_user_active(actor, user_id, active)
    }

    pub fn set_channel_active(
        &self,
        actor: &User,
        channel_id: &str,
        active: bool,
    ) -> Result<Channel, LeadError> {
        self.directory.set_channel_active(actor, channel_id, active)
    }

    pub fn change_password(
        &self,
        actor: &User,
        user_id: &str,
        new_password: &str,
    ) -> Result<(), LeadError> {
        self.directory.change_password(actor, user_id, new_password)
    }

    pub fn list_admins(&self, actor: &User) -> Result<Vec<User>, LeadError> {
        self.directory.list_admins(actor)
    }

    pub fn list_operators(
        &self,
        actor: &User,
        admin_filter: Option<&str>,
    ) -> Result<Vec<User>, LeadError> {
        self.directory.list_operators(actor, admin_filter)
    }
}

/// Pick the phone key: explicit env value, then config, then a throwaway key.
fn crypto_for(config: &Config, env_key: Option<&str>) -> Result<CryptoService, CryptoError> {
    match env_key.or(config.phone_key.as_deref()) {
        Some(encoded) => CryptoService::from_base64_key(encoded.trim()),
        None => {
            log::warn!(
                "No phone key configured (set phoneKey or {}); using a per-process key. \
                 Stored phones will not be readable after restart.",
                PHONE_KEY_ENV
            );
            Ok(CryptoService::ephemeral())
        }
    }
}

pub fn resolve_time_zone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::TimeZone(name.to_string()))
}

/// Get the config file path (~/.leadguard/config.json)
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(".leadguard").join("config.json"))
}

/// Load config from `~/.leadguard/config.json`. A missing file yields defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_path()?;
    if !path.exists() {
        log::info!("No config at {}; using defaults", path.display());
        return Ok(Config::default());
    }
    load_config_from(&path)
}

/// Load and validate config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: Config = serde_json::from_str(&content)?;
    resolve_time_zone(&config.time_zone)?;
    Ok(config)
}
