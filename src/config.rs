//! `config.toml` loading and CLI overrides.
//!
//! ```toml
//! host = "https://example.cloud.databricks.com"
//! token_env = "DATABRICKS_TOKEN"
//! local_folder = "~/dashboards"
//! remote_folder = "/Users/me/.sqldash/dashboards"
//! name_prefix = "[SQLDASH]"
//! warehouse_id = "abc123"
//! principal = "users"
//! ```
//!
//! Every key is optional in the file; commands fail with the key's name when
//! they need a value that is neither configured nor passed on the command line.

use anyhow::{Context, Result, anyhow};
use dashkit::reconciler::DEFAULT_PRINCIPAL;
use dashkit::{LoaderOptions, Settings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Overrides;
use crate::paths;

/// Environment variable holding the token unless `token_env` says otherwise
pub const DEFAULT_TOKEN_ENV: &str = "DATABRICKS_TOKEN";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqldashConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default)]
    pub local_folder: Option<String>,
    #[serde(default)]
    pub remote_folder: Option<String>,
    #[serde(default)]
    pub name_prefix: Option<String>,
    #[serde(default)]
    pub warehouse_id: Option<String>,
    #[serde(default)]
    pub principal: Option<String>,
}

impl SqldashConfig {
    /// Load `config.toml` from the config directory; a missing file is empty config
    pub fn load() -> Result<Self> {
        let path = paths::config_file()?;
        if !path.exists() {
            log::debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply command-line values on top of the file
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(host) = &overrides.host {
            self.host = Some(host.clone());
        }
        if let Some(folder) = &overrides.remote_folder {
            self.remote_folder = Some(folder.clone());
        }
        if let Some(warehouse) = &overrides.warehouse_id {
            self.warehouse_id = Some(warehouse.clone());
        }
    }

    pub fn host(&self) -> Result<&str> {
        require(self.host.as_ref(), "host")
    }

    pub fn remote_folder(&self) -> Result<&str> {
        require(self.remote_folder.as_ref(), "remote_folder")
    }

    /// Local definitions folder: explicit flag, else the expanded config value
    pub fn local_folder(&self, flag: Option<&Path>) -> Result<PathBuf> {
        match flag {
            Some(path) => Ok(path.to_path_buf()),
            None => Ok(paths::expand(require(self.local_folder.as_ref(), "local_folder")?)),
        }
    }

    pub fn token_env(&self) -> &str {
        self.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV)
    }

    pub fn principal(&self) -> &str {
        self.principal.as_deref().unwrap_or(DEFAULT_PRINCIPAL)
    }

    /// Bearer token, read from the environment
    pub fn token(&self) -> Result<String> {
        let var = self.token_env();
        std::env::var(var)
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("Missing access token: set the {var} environment variable"))
    }

    /// Settings for a reconciliation run
    pub fn settings(&self) -> Result<Settings> {
        Ok(Settings::new(self.host()?, self.remote_folder()?)
            .with_warehouse(self.warehouse_id.clone())
            .with_principal(self.principal()))
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions::new(self.name_prefix.clone().unwrap_or_default())
    }
}

fn require<'a>(value: Option<&'a String>, key: &str) -> Result<&'a str> {
    value
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            anyhow!(
                "Missing required config value `{key}` (set it in {} or pass --{})",
                paths::CONFIG_FILE,
                key.replace('_', "-")
            )
        })
}

/// Show only whether a secret is present
pub fn redact(secret: Option<&str>) -> String {
    match secret {
        Some(s) if !s.is_empty() => "********".to_string(),
        _ => "(not set)".to_string(),
    }
}
