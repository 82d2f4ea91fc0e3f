//! Pluggable users and credentials for axum applications.
//!
//! The engines ([`Credentials`], [`Profiles`]) are plain synchronous
//! functions over the store and can be driven by any transport. [`Infantry`]
//! wires them into a host [`Router`].

mod codec;
pub mod credentials;
pub mod creds;
pub mod error;
pub mod extract;
pub mod profiles;
pub mod users;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use axum::{
    Router,
    routing::{get, post, put},
};
use serde::de::DeserializeOwned;
use tracing::{error, info};

use infantry_db::Database;

pub use credentials::Credentials;
pub use error::EngineError;
pub use profiles::Profiles;

/// Engines built once per store and shared by every request.
#[derive(Clone)]
pub struct Models {
    pub credentials: Credentials,
    pub profiles: Profiles,
}

impl Models {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            credentials: Credentials::new(db.clone()),
            profiles: Profiles::new(db),
        }
    }
}

pub type AppState = Arc<Models>;

#[derive(Debug, Clone)]
pub struct InfantryConfig {
    pub db_path: PathBuf,
}

/// Entry point for a host application.
pub struct Infantry {
    config: InfantryConfig,
}

impl Infantry {
    pub fn new(config: InfantryConfig) -> Result<Self> {
        if config.db_path.as_os_str().is_empty() {
            bail!("Invalid config: db_path is required");
        }
        Ok(Self { config })
    }

    /// Open the store and build the engines.
    pub fn open(&self) -> Result<Models> {
        let db = Database::open(&self.config.db_path)?;
        Ok(Models::new(Arc::new(db)))
    }

    /// Open the store and merge the user and credential routes into `app`.
    pub fn mount(&self, app: Router) -> Result<Router> {
        let models = self.open()?;
        info!("Mounted user routes backed by {}", self.config.db_path.display());
        Ok(app.merge(routes(Arc::new(models))))
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/users", post(users::create))
        .route("/users/{id}", get(users::get).patch(users::update))
        .route("/users/{id}/photo", put(users::add_photo))
        .route(
            "/users/{id}/options",
            post(users::add_options).delete(users::remove_options),
        )
        .route("/creds", post(creds::create))
        .route("/creds/login", post(creds::login))
        .route("/creds/available/{username}", get(creds::availability))
        .route("/creds/{user_id}", get(creds::get))
        .route("/creds/{user_id}/username", put(creds::change_username))
        .route("/creds/{user_id}/password", put(creds::change_password))
        .route("/creds/{user_id}/role", put(creds::change_role))
        .route("/creds/{user_id}/active", post(creds::toggle_active))
        .route("/creds/{user_id}/tokens", post(creds::rotate_token))
        .with_state(state)
}

/// Run blocking store work off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, EngineError>
where
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        EngineError::Task(e.to_string())
    })?
}

/// Decode an optional JSON body; an empty body is `None`.
pub(crate) fn optional_json<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>, EngineError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| EngineError::InvalidField {
            field: "body",
            reason: e.to_string(),
        })
}
