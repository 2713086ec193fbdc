//! Users, roles, and channels: login plus the administrative surface.
//!
//! The hierarchy is three levels deep. The super admin creates admins, admins
//! create operators and channels, and every write checks that the acting user
//! sits above its target. Nothing here hard-deletes; deactivation flips
//! `is_active`.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::crypto::{hash_password, verify_password};
use crate::error::{AuthenticationFailure, AuthorizationError, LeadError, StoreError};
use crate::store::LeadStore;
use crate::types::{Channel, NewUser, Role, User};

pub const MIN_PASSWORD_LEN: usize = 6;

fn validate_password(password: &str) -> Result<(), LeadError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(LeadError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn forbidden(actor: &User, what: &str) -> LeadError {
    AuthorizationError::Forbidden(format!("{} ({}) may not {}", actor.id, actor.role, what)).into()
}

pub struct Directory {
    store: Arc<dyn LeadStore>,
}

impl Directory {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    /// Verify credentials for an active user.
    ///
    /// Unknown username, inactive account, and wrong password are
    /// indistinguishable to the caller.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User, LeadError> {
        let user = match self.store.user_by_username(username)? {
            Some(user) if user.is_active => user,
            _ => {
                log::warn!("Login rejected: no active account matched");
                return Err(AuthenticationFailure.into());
            }
        };
        if !verify_password(password, &user.password_salt, &user.password_hash) {
            log::warn!("Login rejected for user {}", user.id);
            return Err(AuthenticationFailure.into());
        }
        log::info!("User {} authenticated as {}", user.id, user.role);
        Ok(user)
    }

    /// Seed the root account if no super admin exists yet. Returns the
    /// existing super admin otherwise, leaving its password untouched.
    pub fn ensure_super_admin(
        &self,
        username: &str,
        display_name: &str,
        password: &str,
    ) -> Result<User, LeadError> {
        if let Some(existing) = self
            .store
            .users()?
            .into_iter()
            .find(|u| u.role == Role::SuperAdmin)
        {
            return Ok(existing);
        }
        let root = self.insert_new_user(
            NewUser {
                username: username.to_string(),
                display_name: display_name.to_string(),
                password: password.to_string(),
            },
            Role::SuperAdmin,
            None,
        )?;
        log::info!("Seeded super admin {}", root.id);
        Ok(root)
    }

    pub fn create_admin(&self, actor: &User, new_user: NewUser) -> Result<User, LeadError> {
        let actor = self.current(actor)?;
        if actor.role != Role::SuperAdmin {
            return Err(forbidden(&actor, "create admins"));
        }
        let admin = self.insert_new_user(new_user, Role::Admin, Some(actor.id.clone()))?;
        log::info!("Admin {} created by {}", admin.id, actor.id);
        Ok(admin)
    }

    /// Admins create operators under themselves; the super admin must name
    /// the owning admin.
    pub fn create_operator(
        &self,
        actor: &User,
        new_user: NewUser,
        owner_admin_id: Option<&str>,
    ) -> Result<User, LeadError> {
        let actor = self.current(actor)?;
        let parent = self.owning_admin(&actor, owner_admin_id, "create operators")?;
        let operator = self.insert_new_user(new_user, Role::Operator, Some(parent))?;
        log::info!("Operator {} created by {}", operator.id, actor.id);
        Ok(operator)
    }

    /// Channel names are unique regardless of case.
    pub fn create_channel(
        &self,
        actor: &User,
        name: &str,
        owner_admin_id: Option<&str>,
    ) -> Result<Channel, LeadError> {
        let actor = self.current(actor)?;
        let owner_admin = self.owning_admin(&actor, owner_admin_id, "create channels")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(LeadError::InvalidInput("channel name is required".into()));
        }
        if self.store.channel_by_name(name)?.is_some() {
            return Err(StoreError::Conflict(format!("channel {name}")).into());
        }

        let channel = Channel {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_by: actor.id.clone(),
            owner_admin,
            is_active: true,
            created_at: Utc::now(),
        };
        self.store.insert_channel(&channel)?;
        log::info!("Channel {} created by {}", channel.id, actor.id);
        Ok(channel)
    }

    /// Soft-(de)activate an admin or operator. The super admin account itself
    /// cannot be deactivated.
    pub fn set_user_active(
        &self,
        actor: &User,
        user_id: &str,
        active: bool,
    ) -> Result<User, LeadError> {
        let actor = self.current(actor)?;
        let mut target = self.existing_user(user_id)?;
        let allowed = match (actor.role, target.role) {
            (_, Role::SuperAdmin) => false,
            (Role::SuperAdmin, _) => true,
            (Role::Admin, Role::Operator) => {
                target.parent_id.as_deref() == Some(actor.id.as_str())
            }
            _ => false,
        };
        if !allowed {
            return Err(forbidden(&actor, "change this account's status"));
        }
        target.is_active = active;
        self.store.update_user(&target)?;
        log::info!(
            "User {} {} by {}",
            target.id,
            if active { "activated" } else { "deactivated" },
            actor.id
        );
        Ok(target)
    }

    pub fn set_channel_active(
        &self,
        actor: &User,
        channel_id: &str,
        active: bool,
    ) -> Result<Channel, LeadError> {
        let actor = self.current(actor)?;
        let mut channel = self
            .store
            .channel(channel_id)?
            .ok_or_else(|| StoreError::NotFound(format!("channel {channel_id}")))?;
        let allowed = match actor.role {
            Role::SuperAdmin => true,
            Role::Admin => channel.owner_admin == actor.id,
            Role::Operator => false,
        };
        if !allowed {
            return Err(forbidden(&actor, "change this channel"));
        }
        channel.is_active = active;
        self.store.update_channel(&channel)?;
        log::info!(
            "Channel {} {} by {}",
            channel.id,
            if active { "activated" } else { "deactivated" },
            actor.id
        );
        Ok(channel)
    }

    /// Replace a password with a freshly salted hash.
    ///
    /// Operators may change only their own password, admins their own and
    /// their operators', the super admin anyone's. Inactive targets are
    /// reported as not found.
    pub fn change_password(
        &self,
        actor: &User,
        user_id: &str,
        new_password: &str,
    ) -> Result<(), LeadError> {
        validate_password(new_password)?;
        let actor = self.current(actor)?;
        let mut target = self
            .store
            .user(user_id)?
            .filter(|u| u.is_active)
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;

        let allowed = target.id == actor.id
            || match actor.role {
                Role::SuperAdmin => true,
                Role::Admin => {
                    target.role == Role::Operator
                        && target.parent_id.as_deref() == Some(actor.id.as_str())
                }
                Role::Operator => false,
            };
        if !allowed {
            return Err(forbidden(&actor, "change this password"));
        }

        let (salt, hash) = hash_password(new_password);
        target.password_salt = salt;
        target.password_hash = hash;
        self.store.update_user(&target)?;
        log::info!("Password changed for {} by {}", target.id, actor.id);
        Ok(())
    }

    /// All admins, newest first. Super admin only.
    pub fn list_admins(&self, actor: &User) -> Result<Vec<User>, LeadError> {
        let actor = self.current(actor)?;
        if actor.role != Role::SuperAdmin {
            return Err(forbidden(&actor, "list admins"));
        }
        Ok(self
            .store
            .users()?
            .into_iter()
            .filter(|u| u.role == Role::Admin)
            .collect())
    }

    /// Operators visible to `actor`, newest first.
    ///
    /// Admins always get their own operators. The super admin gets every
    /// operator, or one admin's when `admin_filter` is set.
    pub fn list_operators(
        &self,
        actor: &User,
        admin_filter: Option<&str>,
    ) -> Result<Vec<User>, LeadError> {
        let actor = self.current(actor)?;
        let parent = match actor.role {
            Role::SuperAdmin => admin_filter.map(str::to_string),
            Role::Admin => Some(actor.id.clone()),
            Role::Operator => return Err(forbidden(&actor, "list operators")),
        };
        Ok(self
            .store
            .users()?
            .into_iter()
            .filter(|u| u.role == Role::Operator)
            .filter(|u| parent.is_none() || u.parent_id == parent)
            .collect())
    }

    /// Re-read the acting user so a deactivation takes effect immediately.
    fn current(&self, actor: &User) -> Result<User, LeadError> {
        let fresh = self
            .store
            .user(&actor.id)?
            .ok_or_else(|| AuthorizationError::UnknownUser(actor.id.clone()))?;
        if !fresh.is_active {
            return Err(AuthorizationError::Inactive(fresh.id).into());
        }
        Ok(fresh)
    }

    fn existing_user(&self, user_id: &str) -> Result<User, LeadError> {
        Ok(self
            .store
            .user(user_id)?
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?)
    }

    /// The admin a new operator or channel belongs to.
    fn owning_admin(
        &self,
        actor: &User,
        requested: Option<&str>,
        what: &str,
    ) -> Result<String, LeadError> {
        match actor.role {
            Role::Admin => match requested {
                Some(id) if id != actor.id => Err(forbidden(actor, what)),
                _ => Ok(actor.id.clone()),
            },
            Role::SuperAdmin => {
                let id = requested
                    .ok_or_else(|| LeadError::InvalidInput("owning admin is required".into()))?;
                match self.store.user(id)? {
                    Some(admin) if admin.role == Role::Admin && admin.is_active => Ok(admin.id),
                    _ => Err(LeadError::InvalidInput(format!("{id} is not an active admin"))),
                }
            }
            Role::Operator => Err(forbidden(actor, what)),
        }
    }

    fn insert_new_user(
        &self,
        new_user: NewUser,
        role: Role,
        parent_id: Option<String>,
    ) -> Result<User, LeadError> {
        let username = new_user.username.trim();
        let display_name = new_user.display_name.trim();
        if username.is_empty() || display_name.is_empty() {
            return Err(LeadError::InvalidInput(
                "username and display name are required".into(),
            ));
        }
        validate_password(&new_user.password)?;

        let parent_role = match parent_id.as_deref() {
            Some(id) => self.store.user(id)?.map(|parent| parent.role),
            None => None,
        };
        if parent_role != role.parent_role() {
            return Err(LeadError::InvalidInput(format!(
                "a {role} must sit under a {}",
                role.parent_role().map_or("nobody", |r| r.as_str())
            )));
        }

        let (password_salt, password_hash) = hash_password(&new_user.password);
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            role,
            parent_id,
            is_active: true,
            password_salt,
            password_hash,
            created_at: Utc::now(),
        };
        self.store.insert_user(&user)?;
        Ok(user)
    }
}
