use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::tools::IdError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "manage users")]
    ManageUsers,
    #[serde(rename = "manage worlds")]
    ManageWorlds,
    #[serde(rename = "manage nodenets")]
    ManageNodenets,
    #[serde(rename = "manage server")]
    ManageServer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Administrator,
    Full,
    Restricted,
    Guest,
}

impl Role {
    pub fn permissions(self) -> BTreeSet<Permission> {
        use Permission::*;
        match self {
            Role::Administrator => [ManageUsers, ManageWorlds, ManageNodenets, ManageServer].into(),
            Role::Full => [ManageWorlds, ManageNodenets].into(),
            Role::Restricted => [ManageNodenets].into(),
            Role::Guest => BTreeSet::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("invalid user id: {0}")]
    InvalidId(#[from] IdError),
    #[error("unknown user or wrong password")]
    InvalidCredentials,
}

struct User {
    role: Role,
    salt: String,
    password_hash: String,
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Accounts and the sessions logged in to them.
///
/// Requests without a valid session act as a guest without permissions.
#[derive(Default)]
pub struct UserManager {
    users: BTreeMap<String, User>,
    sessions: HashMap<String, String>,
}

impl UserManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Create an account. The very first account is always an administrator.
    pub fn create_user(&mut self, user_id: &str, password: &str, role: Role) -> Result<String, UserError> {
        let existing: Vec<String> = self.users.keys().map(|k| k.to_lowercase()).collect();
        let user_id = shared::check_for_url_proof_id(user_id, existing.as_slice(), 1, 21)?;
        let role = if self.users.is_empty() {
            Role::Administrator
        } else {
            role
        };
        let salt = shared::generate_uid();
        let password_hash = hash_password(&salt, password);
        info!(user = %user_id, ?role, "user created");
        self.users.insert(
            user_id.clone(),
            User {
                role,
                salt,
                password_hash,
            },
        );
        Ok(user_id)
    }

    /// Log in and return a fresh session token. A user holds at most one
    /// session, so logging in again ends the previous one.
    pub fn start_session(&mut self, user_id: &str, password: &str) -> Result<String, UserError> {
        let user = self.users.get(user_id).ok_or(UserError::InvalidCredentials)?;
        if hash_password(&user.salt, password) != user.password_hash {
            return Err(UserError::InvalidCredentials);
        }
        let token = shared::generate_uid();
        self.sessions.retain(|_, owner| owner != user_id);
        self.sessions.insert(token.clone(), user_id.to_string());
        info!(user = %user_id, "session started");
        Ok(token)
    }

    /// End a session. Returns whether the token was known.
    pub fn end_session(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn get_user_id_for_session_token(&self, token: Option<&str>) -> Option<String> {
        token.and_then(|t| self.sessions.get(t)).cloned()
    }

    pub fn get_permissions_for_session_token(&self, token: Option<&str>) -> BTreeSet<Permission> {
        self.get_user_id_for_session_token(token)
            .and_then(|id| self.users.get(&id))
            .map(|u| u.role.permissions())
            .unwrap_or_default()
    }

    pub fn role_of(&self, user_id: &str) -> Option<Role> {
        self.users.get(user_id).map(|u| u.role)
    }
}
