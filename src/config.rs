use crate::error::{Error, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "fwcmdb")]
pub struct Opt {
    /// Path to a TOML configuration file
    #[structopt(short = "c", long = "config", parse(from_os_str))]
    pub config: Option<PathBuf>,

    /// Address to serve the API on, overrides the config file
    #[structopt(short = "l", long = "listen")]
    pub listen: Option<String>,

    /// Keep entries in process memory instead of Postgres
    #[structopt(long = "in-memory")]
    pub in_memory: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: String,
    /// Prefix every route is mounted under, e.g. `/api`.
    pub base_path: String,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: String,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            listen: "0.0.0.0:8000".to_string(),
            base_path: String::new(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> DatabaseConfig {
        DatabaseConfig {
            host: "nsx-fw-cmdb-db".to_string(),
            port: 5432,
            name: "cmdb".to_string(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl Config {
    /// Builds the effective configuration: defaults, then the optional
    /// config file, then `DB_*` environment variables, then CLI flags.
    pub fn load(opt: &Opt) -> Result<Config> {
        let mut config = match &opt.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env(|key| env::var(key).ok())?;
        if let Some(listen) = &opt.listen {
            config.listen = listen.clone();
        }
        if !opt.in_memory && config.database.username.is_empty() {
            return Err(Error::Config(
                "database username not set (DB_USERNAME or [database] username)".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {}", path.display(), e)))?;
        Config::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Config> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db = &mut self.database;
        if let Some(v) = lookup("DB_USERNAME") {
            db.username = v;
        }
        if let Some(v) = lookup("DB_PASSWORD") {
            db.password = v;
        }
        if let Some(v) = lookup("DB_HOST") {
            db.host = v;
        }
        if let Some(v) = lookup("DB_NAME") {
            db.name = v;
        }
        if let Some(v) = lookup("DB_PORT") {
            db.port = v
                .parse()
                .map_err(|_| Error::Config(format!("DB_PORT must be a port number, got {:?}", v)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let config = Config::from_toml(
            r#"
            base_path = "/api"

            [database]
            username = "cmdb"
            "#,
        )
        .unwrap();
        assert_eq!(config.listen, "0.0.0.0:8000");
        assert_eq!(config.base_path, "/api");
        assert_eq!(config.database.host, "nsx-fw-cmdb-db");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.name, "cmdb");
        assert_eq!(config.database.username, "cmdb");
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        assert!(matches!(
            Config::from_toml("listen = ").unwrap_err(),
            Error::Config(_)
        ));
    }

    #[test]
    fn env_overrides_file() {
        let vars: HashMap<&str, &str> = [
            ("DB_USERNAME", "svc"),
            ("DB_PASSWORD", "hunter2"),
            ("DB_HOST", "localhost"),
            ("DB_PORT", "6543"),
        ]
        .iter()
        .cloned()
        .collect();
        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.database.username, "svc");
        assert_eq!(config.database.password, "hunter2");
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.name, "cmdb");
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env(|key| match key {
                "DB_PORT" => Some("postgres".to_string()),
                _ => None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
    }
}
