use crate::models::{CredentialRow, UserRow};
use crate::{Database, StoreError};
use rusqlite::{Connection, Row};
use uuid::Uuid;

const CREDENTIAL_COLUMNS: &str = "id, user_id, username, password_hash, salt, active, role, \
                                  tokens, flags, version, modified_at";

const USER_COLUMNS: &str = "id, email, info, photo, options, version, modified_at";

impl Database {
    // -- Credentials --

    /// Insert a new credential. The store assigns `id` and starts `version` at 1.
    pub fn insert_credential(&self, mut row: CredentialRow) -> Result<CredentialRow, StoreError> {
        row.id = Uuid::new_v4().to_string();
        row.version = 1;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO credentials (id, user_id, username, password_hash, salt, active, role,
                                          tokens, flags, version, modified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    row.id,
                    row.user_id,
                    row.username,
                    row.password_hash,
                    row.salt,
                    row.active,
                    row.role,
                    row.tokens,
                    row.flags,
                    row.version,
                    row.modified_at,
                ],
            )?;
            Ok(())
        })?;

        Ok(row)
    }

    pub fn get_credential_by_user(&self, user_id: &str) -> Result<Option<CredentialRow>, StoreError> {
        self.with_conn(|conn| query_credential(conn, "user_id", user_id))
    }

    /// Case-insensitive lookup.
    pub fn get_credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRow>, StoreError> {
        self.with_conn(|conn| query_credential(conn, "username", username))
    }

    /// Case-insensitive count of credentials holding `username`.
    pub fn count_credentials_by_username(&self, username: &str) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM credentials WHERE username = ?1",
                [username],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Write every mutable column back, guarded by `version`. Returns the row
    /// with its new version, or `Conflict` when another writer got there first.
    pub fn update_credential(&self, row: &CredentialRow) -> Result<CredentialRow, StoreError> {
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE credentials
                 SET user_id = ?3, username = ?4, password_hash = ?5, salt = ?6, active = ?7,
                     role = ?8, tokens = ?9, flags = ?10, modified_at = ?11,
                     version = version + 1
                 WHERE id = ?1 AND version = ?2",
                rusqlite::params![
                    row.id,
                    row.version,
                    row.user_id,
                    row.username,
                    row.password_hash,
                    row.salt,
                    row.active,
                    row.role,
                    row.tokens,
                    row.flags,
                    row.modified_at,
                ],
            )?)
        })?;

        if changed == 0 {
            return Err(StoreError::Conflict(format!(
                "credential {} was modified concurrently",
                row.id
            )));
        }

        Ok(CredentialRow {
            version: row.version + 1,
            ..row.clone()
        })
    }

    // -- Users --

    /// Insert a new user. The store assigns `id` and starts `version` at 1.
    pub fn insert_user(&self, mut row: UserRow) -> Result<UserRow, StoreError> {
        row.id = Uuid::new_v4().to_string();
        row.version = 1;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, info, photo, options, version, modified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    row.id,
                    row.email,
                    row.info,
                    row.photo,
                    row.options,
                    row.version,
                    row.modified_at,
                ],
            )?;
            Ok(())
        })?;

        Ok(row)
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Case-insensitive lookup.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn update_user(&self, row: &UserRow) -> Result<UserRow, StoreError> {
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE users
                 SET email = ?3, info = ?4, photo = ?5, options = ?6,
                     modified_at = ?7, version = version + 1
                 WHERE id = ?1 AND version = ?2",
                rusqlite::params![
                    row.id,
                    row.version,
                    row.email,
                    row.info,
                    row.photo,
                    row.options,
                    row.modified_at,
                ],
            )?)
        })?;

        if changed == 0 {
            return Err(StoreError::Conflict(format!(
                "user {} was modified concurrently",
                row.id
            )));
        }

        Ok(UserRow {
            version: row.version + 1,
            ..row.clone()
        })
    }
}

// `key` is always one of the fixed column names above, never caller input.
fn query_credential(
    conn: &Connection,
    key: &str,
    value: &str,
) -> Result<Option<CredentialRow>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM credentials WHERE {} = ?1",
        CREDENTIAL_COLUMNS, key
    ))?;

    stmt.query_row([value], credential_from_row).optional()
}

fn query_user(conn: &Connection, key: &str, value: &str) -> Result<Option<UserRow>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, key))?;

    stmt.query_row([value], user_from_row).optional()
}

fn credential_from_row(row: &Row<'_>) -> rusqlite::Result<CredentialRow> {
    Ok(CredentialRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        salt: row.get(4)?,
        active: row.get(5)?,
        role: row.get(6)?,
        tokens: row.get(7)?,
        flags: row.get(8)?,
        version: row.get(9)?,
        modified_at: row.get(10)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        info: row.get(2)?,
        photo: row.get(3)?,
        options: row.get(4)?,
        version: row.get(5)?,
        modified_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, StoreError>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, StoreError> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(user_id: &str, username: &str) -> CredentialRow {
        CredentialRow {
            id: String::new(),
            user_id: Some(user_id.to_string()),
            username: username.to_string(),
            password_hash: "hash".into(),
            salt: "salt".into(),
            active: true,
            role: "normal".into(),
            tokens: "[]".into(),
            flags: "{}".into(),
            version: 0,
            modified_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    fn user(email: &str) -> UserRow {
        UserRow {
            id: String::new(),
            email: email.to_string(),
            info: "{}".into(),
            photo: "{}".into(),
            options: "{}".into(),
            version: 0,
            modified_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn insert_assigns_id_and_version() {
        let db = Database::open_in_memory().unwrap();
        let row = db.insert_credential(credential("u1", "alice")).unwrap();
        assert!(Uuid::parse_str(&row.id).is_ok());
        assert_eq!(row.version, 1);

        let found = db.get_credential_by_user("u1").unwrap().unwrap();
        assert_eq!(found, row);
    }

    #[test]
    fn username_is_unique_ignoring_case() {
        let db = Database::open_in_memory().unwrap();
        db.insert_credential(credential("u1", "alice")).unwrap();

        let err = db.insert_credential(credential("u2", "ALICE")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert_eq!(db.count_credentials_by_username("Alice").unwrap(), 1);
        assert!(db.get_credential_by_username("aLiCe").unwrap().is_some());
    }

    #[test]
    fn user_ref_is_unique() {
        let db = Database::open_in_memory().unwrap();
        db.insert_credential(credential("u1", "alice")).unwrap();

        let err = db.insert_credential(credential("u1", "bob")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn unknown_role_is_rejected_by_schema() {
        let db = Database::open_in_memory().unwrap();
        let mut row = credential("u1", "alice");
        row.role = "root".into();
        assert!(matches!(db.insert_credential(row), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn stale_update_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        let row = db.insert_credential(credential("u1", "alice")).unwrap();

        let mut first = row.clone();
        first.active = false;
        let first = db.update_credential(&first).unwrap();
        assert_eq!(first.version, 2);

        let mut second = row;
        second.username = "bob".into();
        assert!(matches!(db.update_credential(&second), Err(StoreError::Conflict(_))));

        let stored = db.get_credential_by_user("u1").unwrap().unwrap();
        assert_eq!(stored.username, "alice");
        assert!(!stored.active);
    }

    #[test]
    fn users_round_trip_and_email_is_unique() {
        let db = Database::open_in_memory().unwrap();
        let row = db.insert_user(user("a@example.com")).unwrap();

        assert_eq!(db.get_user_by_id(&row.id).unwrap().unwrap(), row);
        assert!(db.get_user_by_email("A@Example.com").unwrap().is_some());
        assert!(db.get_user_by_id("missing").unwrap().is_none());

        let err = db.insert_user(user("A@EXAMPLE.COM")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let mut updated = row.clone();
        updated.info = r#"{"first_name":"Ada"}"#.into();
        let updated = db.update_user(&updated).unwrap();
        assert_eq!(updated.version, 2);
        assert!(matches!(db.update_user(&row), Err(StoreError::Conflict(_))));
    }
}
