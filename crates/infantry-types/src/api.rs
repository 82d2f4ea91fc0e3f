use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Credential, Gender, Options, PhotoSize, Role};

// -- Credentials --

/// Fields are optional so that absent input surfaces as a typed
/// `MissingField` error instead of a deserialization failure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCredential {
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeUsernameRequest {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub password: Option<String>,
    #[serde(default)]
    pub require_change: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeRoleRequest {
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotateTokenRequest {
    /// Token to revoke before issuing the new one.
    pub revoke: Option<String>,
}

/// What the HTTP surface shows of a credential. Live tokens are never
/// listed; only the one just issued is returned, by the calls that issue one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub active: bool,
    pub role: Role,
    pub flags: BTreeMap<String, bool>,
    pub token_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub modified_at: DateTime<Utc>,
}

impl CredentialResponse {
    pub fn public(credential: Credential) -> Self {
        Self {
            id: credential.id,
            user_id: credential.user_id,
            username: credential.username,
            active: credential.active,
            role: credential.role,
            flags: credential.flags,
            token_count: credential.tokens.len(),
            token: None,
            modified_at: credential.modified_at,
        }
    }

    /// Include the most recently issued token.
    pub fn issuing(credential: Credential) -> Self {
        let token = credential.tokens.last().cloned();
        Self {
            token,
            ..Self::public(credential)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub username: String,
    pub available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// -- Profiles --

/// Partial profile. Every present field overwrites the stored one; absent
/// fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilePatch {
    /// Split on the first space into first and last name.
    pub full_name: Option<String>,
    pub info: Option<InfoPatch>,
    pub photo: Option<PhotoPatch>,
    pub options: Option<Options>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfoPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<Gender>,
    pub birth_year: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhotoPatch {
    pub original_url: Option<String>,
    pub sizes: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddPhotoRequest {
    pub original_url: Option<String>,
    pub sizes: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsRequest {
    pub options: Option<Options>,
}
