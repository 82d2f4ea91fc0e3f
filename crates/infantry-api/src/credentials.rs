//! Credential Engine: password lifecycle, tokens, role and activation state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use infantry_crypto::password::{self, PasswordDigest};
use infantry_crypto::token::generate_token;
use infantry_db::Database;
use infantry_db::models::CredentialRow;
use infantry_types::api::NewCredential;
use infantry_types::models::{Credential, FLAG_CHANGE_REQUIRED, Role};

use crate::codec::{corrupt, decode_id, decode_time, encode_time, from_json, non_blank, to_json};
use crate::error::EngineError;

/// A credential as held in memory between load and save, secrets included.
pub struct StoredCredential {
    pub credential: Credential,
    password_hash: String,
    salt: String,
    version: i64,
}

impl StoredCredential {
    fn new(user_id: Uuid, username: &str, digest: PasswordDigest, role: Role) -> Self {
        Self {
            credential: Credential {
                id: Uuid::nil(),
                user_id,
                username: fold_username(username),
                active: true,
                role,
                tokens: vec![generate_token()],
                flags: BTreeMap::new(),
                modified_at: Utc::now(),
            },
            password_hash: digest.hash,
            salt: digest.salt,
            version: 0,
        }
    }

    fn from_row(row: CredentialRow) -> Result<Self, EngineError> {
        let user_id = row
            .user_id
            .as_deref()
            .ok_or_else(|| corrupt(format!("credential {} has no user", row.id)))
            .and_then(decode_id)?;
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| corrupt(e.to_string()))?;

        Ok(Self {
            credential: Credential {
                id: decode_id(&row.id)?,
                user_id,
                username: row.username,
                active: row.active,
                role,
                tokens: from_json(&row.tokens)?,
                flags: from_json(&row.flags)?,
                modified_at: decode_time(&row.modified_at)?,
            },
            password_hash: row.password_hash,
            salt: row.salt,
            version: row.version,
        })
    }

    fn to_row(&self) -> Result<CredentialRow, EngineError> {
        let c = &self.credential;
        Ok(CredentialRow {
            id: c.id.to_string(),
            user_id: Some(c.user_id.to_string()),
            username: c.username.clone(),
            password_hash: self.password_hash.clone(),
            salt: self.salt.clone(),
            active: c.active,
            role: c.role.as_str().to_string(),
            tokens: to_json(&c.tokens)?,
            flags: to_json(&c.flags)?,
            version: self.version,
            modified_at: encode_time(c.modified_at),
        })
    }

    /// Constant-time check of `candidate` against the stored hash. Does not
    /// look at `active`; callers that log users in must gate on it.
    pub fn authenticate(&self, candidate: &str) -> bool {
        password::verify_password(&self.password_hash, candidate)
    }

    // Hash and salt are only ever replaced together, here.
    fn set_password(&mut self, plaintext: &str) -> Result<(), EngineError> {
        let digest = hash(plaintext)?;
        self.password_hash = digest.hash;
        self.salt = digest.salt;
        Ok(())
    }

    fn change_username(&mut self, username: &str) -> Result<(), EngineError> {
        let username = non_blank(Some(username)).ok_or(EngineError::EmptyField("username"))?;
        self.credential.username = fold_username(username);
        Ok(())
    }

    fn change_password(&mut self, plaintext: &str, require_change: bool) -> Result<(), EngineError> {
        if plaintext.trim().is_empty() {
            return Err(EngineError::EmptyField("password"));
        }
        self.set_password(plaintext)?;
        if require_change {
            self.credential
                .flags
                .insert(FLAG_CHANGE_REQUIRED.to_string(), true);
        } else {
            self.credential.flags.remove(FLAG_CHANGE_REQUIRED);
        }
        Ok(())
    }

    fn change_role(&mut self, role: Role) {
        self.credential.role = role;
    }

    fn toggle_active(&mut self) {
        self.credential.active = !self.credential.active;
    }

    /// Drop every copy of `revoke` (if given) and append a fresh token.
    fn rotate_token(&mut self, revoke: Option<&str>) {
        if let Some(revoke) = revoke {
            self.credential.tokens.retain(|t| t != revoke);
        }
        self.credential.tokens.push(generate_token());
    }
}

/// Usernames are unique ignoring case, so they are stored folded.
pub fn fold_username(username: &str) -> String {
    username.trim().to_lowercase()
}

fn hash(plaintext: &str) -> Result<PasswordDigest, EngineError> {
    password::hash_password(plaintext).map_err(|e| EngineError::Hashing(e.to_string()))
}

/// Engine over the credentials collection. Cheap to clone; all clones share
/// one store handle.
#[derive(Clone)]
pub struct Credentials {
    db: Arc<Database>,
}

impl Credentials {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn setup(&self, req: NewCredential) -> Result<Credential, EngineError> {
        let user_id = req.user_id.ok_or(EngineError::MissingField("user_id"))?;
        let username =
            non_blank(req.username.as_deref()).ok_or(EngineError::MissingField("username"))?;
        let password = req
            .password
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(EngineError::MissingField("password"))?;

        let stored = StoredCredential::new(
            user_id,
            username,
            hash(password)?,
            req.role.unwrap_or_default(),
        );

        let row = self.db.insert_credential(stored.to_row()?).map_err(|e| {
            warn!("Credential setup for user {} rejected: {}", user_id, e);
            EngineError::from(e)
        })?;

        let created = StoredCredential::from_row(row)?.credential;
        info!(
            "Credential {} created for user {} (role {})",
            created.id, user_id, created.role
        );
        Ok(created)
    }

    pub fn get(&self, user_id: Uuid) -> Result<Credential, EngineError> {
        Ok(self.load(user_id)?.credential)
    }

    pub fn authenticate(&self, user_id: Uuid, candidate: &str) -> Result<bool, EngineError> {
        Ok(self.load(user_id)?.authenticate(candidate))
    }

    /// Username/password login. Unlike `authenticate`, this refuses inactive
    /// credentials, and reports unknown usernames the same as bad passwords.
    pub fn login(&self, username: &str, candidate: &str) -> Result<Credential, EngineError> {
        let found = self
            .db
            .get_credential_by_username(&fold_username(username))?
            .map(StoredCredential::from_row)
            .transpose()?;

        // Both rejections cost one Argon2 verification.
        let stored = match found {
            Some(stored) if stored.authenticate(candidate) => stored,
            Some(stored) => {
                warn!("Login rejected for user {}: bad password", stored.credential.user_id);
                return Err(EngineError::Unauthorized);
            }
            None => {
                password::verify_stored(None, candidate);
                warn!("Login rejected: unknown username");
                return Err(EngineError::Unauthorized);
            }
        };
        if !stored.credential.active {
            warn!("Login rejected for user {}: inactive", stored.credential.user_id);
            return Err(EngineError::Inactive);
        }

        Ok(stored.credential)
    }

    pub fn is_username_available(&self, username: &str) -> Result<bool, EngineError> {
        let username =
            non_blank(Some(username)).ok_or(EngineError::EmptyField("username"))?;
        Ok(self.db.count_credentials_by_username(&fold_username(username))? == 0)
    }

    pub fn change_username(&self, user_id: Uuid, username: &str) -> Result<Credential, EngineError> {
        self.modify(user_id, |c| c.change_username(username))
    }

    pub fn change_password(
        &self,
        user_id: Uuid,
        plaintext: &str,
        require_change: bool,
    ) -> Result<Credential, EngineError> {
        self.modify(user_id, |c| c.change_password(plaintext, require_change))
    }

    pub fn change_role(&self, user_id: Uuid, role: Role) -> Result<Credential, EngineError> {
        let updated = self.modify(user_id, |c| {
            c.change_role(role);
            Ok(())
        })?;
        info!("User {} role changed to {}", user_id, role);
        Ok(updated)
    }

    /// `change_role` for untyped input; unknown role names are rejected.
    pub fn change_role_named(&self, user_id: Uuid, role: &str) -> Result<Credential, EngineError> {
        let role = role.parse::<Role>().map_err(|e| EngineError::InvalidField {
            field: "role",
            reason: e.to_string(),
        })?;
        self.change_role(user_id, role)
    }

    pub fn toggle_active(&self, user_id: Uuid) -> Result<Credential, EngineError> {
        let updated = self.modify(user_id, |c| {
            c.toggle_active();
            Ok(())
        })?;
        info!("User {} active set to {}", user_id, updated.active);
        Ok(updated)
    }

    pub fn rotate_token(&self, user_id: Uuid, revoke: Option<&str>) -> Result<Credential, EngineError> {
        self.modify(user_id, |c| {
            c.rotate_token(revoke);
            Ok(())
        })
    }

    fn load(&self, user_id: Uuid) -> Result<StoredCredential, EngineError> {
        let row = self
            .db
            .get_credential_by_user(&user_id.to_string())?
            .ok_or(EngineError::NotFound("credential"))?;
        StoredCredential::from_row(row)
    }

    /// Lookup by user, mutate in memory, persist once.
    fn modify<F>(&self, user_id: Uuid, f: F) -> Result<Credential, EngineError>
    where
        F: FnOnce(&mut StoredCredential) -> Result<(), EngineError>,
    {
        let mut stored = self.load(user_id)?;
        f(&mut stored)?;
        stored.credential.modified_at = Utc::now();

        let row = self.db.update_credential(&stored.to_row()?).map_err(|e| {
            warn!("Credential update for user {} rejected: {}", user_id, e);
            EngineError::from(e)
        })?;
        debug!("Credential for user {} saved (version {})", user_id, row.version);

        Ok(stored.credential)
    }
}
