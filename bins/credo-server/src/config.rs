//! Server configuration: built-in defaults, then an optional TOML file, then
//! `CREDO_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "CREDO";

/// Environment variable naming the optional config file.
pub const CONFIG_PATH_VAR: &str = "CREDO_CONFIG";

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Address to bind the HTTP server.
    pub bind_addr: String,
    /// Model bundle loaded once at startup.
    pub model_path: PathBuf,
    /// Level for the workspace crates when neither `CREDO_LOG` nor `RUST_LOG` is set.
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
    /// Answer scoring requests with the rule-based scorer when no model is loaded.
    pub fallback_when_unloaded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".into(),
            model_path: PathBuf::from("Dataset/credit_score.json"),
            log_level: "info".into(),
            log_format: "text".into(),
            fallback_when_unloaded: false,
        }
    }
}

impl ServerConfig {
    /// Load from an optional file and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::build(file, Environment::with_prefix(ENV_PREFIX))
    }

    fn build(file: Option<&Path>, env: Environment) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("bind_addr", defaults.bind_addr)?
            .set_default("model_path", defaults.model_path.to_string_lossy().into_owned())?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_format", defaults.log_format)?
            .set_default("fallback_when_unloaded", defaults.fallback_when_unloaded)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(env.try_parsing(true))
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn defaults_without_sources() {
        let cfg = ServerConfig::build(None, env(&[])).unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = ServerConfig::build(
            None,
            env(&[
                ("CREDO_BIND_ADDR", "0.0.0.0:8080"),
                ("CREDO_FALLBACK_WHEN_UNLOADED", "true"),
                ("CREDO_LOG_FORMAT", "json"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert!(cfg.fallback_when_unloaded);
        assert_eq!(cfg.log_format, "json");
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn file_then_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credo.toml");
        std::fs::write(&path, "model_path = \"/srv/model.json\"\nlog_level = \"debug\"\n").unwrap();

        let cfg = ServerConfig::build(Some(&path), env(&[("CREDO_LOG_LEVEL", "warn")])).unwrap();
        assert_eq!(cfg.model_path, PathBuf::from("/srv/model.json"));
        assert_eq!(cfg.log_level, "warn");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::build(Some(&dir.path().join("absent.toml")), env(&[])).is_err());
    }
}
