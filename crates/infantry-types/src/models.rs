use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Flag set on a credential whose owner must pick a new password at next login.
pub const FLAG_CHANGE_REQUIRED: &str = "change_required";

/// Named user settings, e.g. `auto_follow`.
pub type Options = BTreeMap<String, serde_json::Value>;

// -- Roles --

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Guest,
    #[default]
    Normal,
    Super,
    Admin,
    Partner,
    PartnerAdmin,
    Celebrity,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Guest,
        Role::Normal,
        Role::Super,
        Role::Admin,
        Role::Partner,
        Role::PartnerAdmin,
        Role::Celebrity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Normal => "normal",
            Role::Super => "super",
            Role::Admin => "admin",
            Role::Partner => "partner",
            Role::PartnerAdmin => "partner-admin",
            Role::Celebrity => "celebrity",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

// -- Credentials --

/// Authentication record for a user. Password hash and salt never leave the
/// store through this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub active: bool,
    pub role: Role,
    pub tokens: Vec<String>,
    pub flags: BTreeMap<String, bool>,
    pub modified_at: DateTime<Utc>,
}

impl Credential {
    pub fn change_required(&self) -> bool {
        self.flags.get(FLAG_CHANGE_REQUIRED).copied().unwrap_or(false)
    }
}

// -- Users --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Derived from first and last name on every save.
    #[serde(default)]
    pub search: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
    pub email: String,
    pub gender: Option<Gender>,
    pub birth_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub original_url: Option<String>,
    #[serde(default)]
    pub sizes: Vec<PhotoSize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub info: UserInfo,
    pub photo: Photo,
    pub options: Options,
    pub modified_at: DateTime<Utc>,
}

impl User {
    /// "First Last", skipping whichever half is unset.
    pub fn full_name(&self) -> String {
        [&self.info.first_name, &self.info.last_name]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// "First L." style display name.
    pub fn abbreviated_name(&self) -> String {
        let mut abbr = self.info.first_name.clone().unwrap_or_default();
        if let Some(initial) = self.info.last_name.as_deref().and_then(|l| l.chars().next()) {
            if !abbr.is_empty() {
                abbr.push(' ');
            }
            abbr.push(initial);
            abbr.push('.');
        }
        abbr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: Option<&str>, last: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            info: UserInfo {
                first_name: first.map(String::from),
                last_name: last.map(String::from),
                email: "a@example.com".into(),
                ..Default::default()
            },
            photo: Photo::default(),
            options: Options::new(),
            modified_at: Utc::now(),
        }
    }

    #[test]
    fn role_names_parse_back() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!("partner-admin".parse::<Role>().unwrap(), Role::PartnerAdmin);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::Normal);
    }

    #[test]
    fn role_serializes_kebab_case() {
        let json = serde_json::to_string(&Role::PartnerAdmin).unwrap();
        assert_eq!(json, "\"partner-admin\"");
    }

    #[test]
    fn display_names() {
        let u = user(Some("Ada"), Some("Lovelace"));
        assert_eq!(u.full_name(), "Ada Lovelace");
        assert_eq!(u.abbreviated_name(), "Ada L.");

        let u = user(Some("Ada"), None);
        assert_eq!(u.full_name(), "Ada");
        assert_eq!(u.abbreviated_name(), "Ada");
    }
}
