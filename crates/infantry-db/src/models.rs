//! Rows as stored. Nested documents (tokens, flags, info, photo, options)
//! stay JSON text here; decoding into infantry-types models happens above
//! this crate.

#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRow {
    pub id: String,
    pub user_id: Option<String>,
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub active: bool,
    pub role: String,
    pub tokens: String,
    pub flags: String,
    pub version: i64,
    pub modified_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub info: String,
    pub photo: String,
    pub options: String,
    pub version: i64,
    pub modified_at: String,
}
