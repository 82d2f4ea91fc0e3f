//! User Profile Manager: shallow-merge updates of info, photo and options.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use infantry_db::Database;
use infantry_db::models::UserRow;
use infantry_types::api::{InfoPatch, PhotoPatch, ProfilePatch};
use infantry_types::models::{Options, Photo, PhotoSize, User, UserInfo};

use crate::codec::{decode_id, decode_time, encode_time, from_json, non_blank, to_json};
use crate::error::EngineError;

pub const MIN_BIRTH_YEAR: i32 = 1900;

struct StoredUser {
    user: User,
    version: i64,
}

impl StoredUser {
    fn from_row(row: UserRow) -> Result<Self, EngineError> {
        Ok(Self {
            user: User {
                id: decode_id(&row.id)?,
                info: from_json(&row.info)?,
                photo: from_json(&row.photo)?,
                options: from_json(&row.options)?,
                modified_at: decode_time(&row.modified_at)?,
            },
            version: row.version,
        })
    }

    fn to_row(&self) -> Result<UserRow, EngineError> {
        let u = &self.user;
        Ok(UserRow {
            id: u.id.to_string(),
            email: u.info.email.clone(),
            info: to_json(&u.info)?,
            photo: to_json(&u.photo)?,
            options: to_json(&u.options)?,
            version: self.version,
            modified_at: encode_time(u.modified_at),
        })
    }

    /// Runs before every write: derived fields and the timestamp.
    fn prepare_save(&mut self) {
        self.user.info.search = search_terms(&self.user.info);
        self.user.modified_at = Utc::now();
    }
}

/// The non-empty subset of first and last name.
pub fn search_terms(info: &UserInfo) -> Vec<String> {
    [&info.first_name, &info.last_name]
        .into_iter()
        .flatten()
        .filter(|name| !name.trim().is_empty())
        .cloned()
        .collect()
}

/// Merge every present field of `patch` into `user`.
fn apply_patch(user: &mut User, patch: ProfilePatch) -> Result<(), EngineError> {
    if let Some(full_name) = non_blank(patch.full_name.as_deref()) {
        let (first, last) = match full_name.split_once(' ') {
            Some((first, last)) => (first, Some(last.trim())),
            None => (full_name, None),
        };
        user.info.first_name = Some(first.to_string());
        user.info.last_name = last.filter(|l| !l.is_empty()).map(String::from);
    }
    if let Some(info) = patch.info {
        merge_info(&mut user.info, info)?;
    }
    if let Some(photo) = patch.photo {
        merge_photo(&mut user.photo, photo)?;
    }
    if let Some(options) = patch.options {
        user.options.extend(options);
    }
    Ok(())
}

fn merge_info(info: &mut UserInfo, patch: InfoPatch) -> Result<(), EngineError> {
    if let Some(v) = patch.first_name {
        info.first_name = Some(required_text(v, "first_name")?);
    }
    if let Some(v) = patch.last_name {
        info.last_name = Some(required_text(v, "last_name")?);
    }
    if let Some(v) = patch.city {
        info.city = Some(required_text(v, "city")?);
    }
    if let Some(v) = patch.state {
        info.state = Some(required_text(v, "state")?);
    }
    if let Some(v) = patch.phone {
        info.phone = Some(required_text(v, "phone")?);
    }
    if let Some(v) = patch.email {
        info.email = required_text(v, "email")?.to_lowercase();
    }
    if let Some(v) = patch.gender {
        info.gender = Some(v);
    }
    if let Some(year) = patch.birth_year {
        info.birth_year = Some(validate_birth_year(year)?);
    }
    Ok(())
}

fn merge_photo(photo: &mut Photo, patch: PhotoPatch) -> Result<(), EngineError> {
    if let Some(url) = patch.original_url {
        photo.original_url = Some(required_text(url, "original_url")?);
    }
    if let Some(sizes) = patch.sizes {
        photo.sizes = sizes;
    }
    Ok(())
}

fn required_text(value: String, field: &'static str) -> Result<String, EngineError> {
    non_blank(Some(value.as_str()))
        .map(String::from)
        .ok_or(EngineError::EmptyField(field))
}

pub fn validate_birth_year(year: i32) -> Result<i32, EngineError> {
    let current = Utc::now().year();
    if (MIN_BIRTH_YEAR..=current).contains(&year) {
        Ok(year)
    } else {
        Err(EngineError::InvalidField {
            field: "birth_year",
            reason: format!("{} is outside {}..={}", year, MIN_BIRTH_YEAR, current),
        })
    }
}

/// Engine over the users collection.
#[derive(Clone)]
pub struct Profiles {
    db: Arc<Database>,
}

impl Profiles {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn setup(&self, patch: ProfilePatch) -> Result<User, EngineError> {
        let email = patch
            .info
            .as_ref()
            .and_then(|info| non_blank(info.email.as_deref()))
            .ok_or(EngineError::MissingField("email"))?
            .to_lowercase();

        let mut stored = StoredUser {
            user: User {
                id: Uuid::nil(),
                info: UserInfo {
                    email,
                    ..UserInfo::default()
                },
                photo: Photo::default(),
                options: Options::new(),
                modified_at: Utc::now(),
            },
            version: 0,
        };
        apply_patch(&mut stored.user, patch)?;
        stored.prepare_save();

        let row = self.db.insert_user(stored.to_row()?).map_err(|e| {
            warn!("User setup rejected: {}", e);
            EngineError::from(e)
        })?;

        let created = StoredUser::from_row(row)?.user;
        info!("User {} created", created.id);
        Ok(created)
    }

    pub fn get(&self, id: Uuid) -> Result<User, EngineError> {
        Ok(self.load(id)?.user)
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, EngineError> {
        let Some(email) = non_blank(Some(email)) else {
            return Ok(None);
        };
        self.db
            .get_user_by_email(&email.to_lowercase())?
            .map(|row| StoredUser::from_row(row).map(|s| s.user))
            .transpose()
    }

    /// Merge `patch` into the stored profile. `None` is a successful no-op
    /// that returns the profile untouched.
    pub fn update(&self, id: Uuid, patch: Option<ProfilePatch>) -> Result<User, EngineError> {
        match patch {
            Some(patch) => self.modify(id, |user| apply_patch(user, patch)),
            None => {
                debug!("Empty update for user {}, nothing to do", id);
                self.get(id)
            }
        }
    }

    /// Set the original photo URL; `sizes` replaces the size list only when given.
    pub fn add_photo(
        &self,
        id: Uuid,
        original_url: &str,
        sizes: Option<Vec<PhotoSize>>,
    ) -> Result<User, EngineError> {
        let original_url =
            non_blank(Some(original_url)).ok_or(EngineError::MissingField("original_url"))?;

        self.modify(id, |user| {
            user.photo.original_url = Some(original_url.to_string());
            if let Some(sizes) = sizes {
                user.photo.sizes = sizes;
            }
            Ok(())
        })
    }

    pub fn add_options(&self, id: Uuid, options: Option<Options>) -> Result<User, EngineError> {
        let options = options.ok_or(EngineError::MissingField("options"))?;
        self.modify(id, |user| {
            user.options.extend(options);
            Ok(())
        })
    }

    /// Unset every option named in `options`; the values are ignored.
    pub fn remove_options(&self, id: Uuid, options: Option<Options>) -> Result<User, EngineError> {
        let options = options.ok_or(EngineError::MissingField("options"))?;
        self.modify(id, |user| {
            for key in options.keys() {
                user.options.remove(key);
            }
            Ok(())
        })
    }

    fn load(&self, id: Uuid) -> Result<StoredUser, EngineError> {
        let row = self
            .db
            .get_user_by_id(&id.to_string())?
            .ok_or(EngineError::NotFound("user"))?;
        StoredUser::from_row(row)
    }

    fn modify<F>(&self, id: Uuid, f: F) -> Result<User, EngineError>
    where
        F: FnOnce(&mut User) -> Result<(), EngineError>,
    {
        let mut stored = self.load(id)?;
        f(&mut stored.user)?;
        stored.prepare_save();

        let row = self.db.update_user(&stored.to_row()?).map_err(|e| {
            warn!("Update of user {} rejected: {}", id, e);
            EngineError::from(e)
        })?;
        debug!("User {} saved (version {})", id, row.version);

        Ok(stored.user)
    }
}
