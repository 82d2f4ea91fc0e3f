use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

use infantry_api::InfantryConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Read `INFANTRY_*` variables, falling back to local defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("INFANTRY_DB_PATH").unwrap_or_else(|| "infantry.db".into());
        let host = lookup("INFANTRY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("INFANTRY_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("INFANTRY_PORT is not a port number: {}", raw))?,
            None => 3000,
        };

        Ok(Self {
            db_path: db_path.into(),
            host,
            port,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn infantry(&self) -> InfantryConfig {
        InfantryConfig {
            db_path: self.db_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("infantry.db"));
        assert_eq!(cfg.addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("INFANTRY_DB_PATH", "/var/lib/infantry/users.db"),
            ("INFANTRY_HOST", "127.0.0.1"),
            ("INFANTRY_PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(cfg.infantry().db_path, PathBuf::from("/var/lib/infantry/users.db"));
        assert_eq!(cfg.addr().unwrap().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(config(&[("INFANTRY_PORT", "http")]).is_err());
    }
}
