//! Configuration loading and path resolution.
//!
//! Supports CERTMAN_HOME env var override for testing.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cert::CertificateRecord;

/// Paths for certman's own files.
#[derive(Debug, Clone)]
pub struct CertmanPaths {
    pub config_file: PathBuf,
}

impl CertmanPaths {
    /// Build paths from base directory (e.g. ProjectDirs config dir or CERTMAN_HOME).
    pub fn from_base(base: PathBuf) -> Self {
        Self {
            config_file: base.join("config.toml"),
        }
    }

    /// Paths for testing: use a temp dir as base.
    pub fn for_test(base: impl AsRef<Path>) -> Self {
        Self::from_base(base.as_ref().to_path_buf())
    }

    /// Get default paths (respects CERTMAN_HOME).
    pub fn default_paths() -> Self {
        let base = if let Ok(home) = std::env::var("CERTMAN_HOME") {
            PathBuf::from(home)
        } else if let Some(dirs) = directories::ProjectDirs::from("com", "certman", "certman") {
            dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from(".certman")
        };
        Self::from_base(base)
    }
}

fn default_location() -> String {
    "user".to_string()
}

/// config.toml structure.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Store used when `--location` is not given. Validated when used.
    #[serde(default = "default_location")]
    pub default_location: String,
    /// Default for `install --exportable`.
    #[serde(default)]
    pub exportable: bool,
    /// PowerShell executable override.
    #[serde(default)]
    pub powershell: Option<String>,
    /// Named certificates: `path` plus `passphrase` or `passphrase_env`.
    /// Kept as raw tables so type errors surface as certificate errors.
    #[serde(default)]
    pub certificates: BTreeMap<String, toml::Table>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_location: default_location(),
            exportable: false,
            powershell: None,
            certificates: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load config from paths (with shared lock when file exists).
    pub fn load(paths: &CertmanPaths) -> Result<Config> {
        if paths.config_file.is_file() {
            let mut file = fs::OpenOptions::new().read(true).open(&paths.config_file)?;
            fs2::FileExt::lock_shared(&file)?;
            use std::io::Read;
            let mut s = String::new();
            file.read_to_string(&mut s)?;
            let cfg: Config = toml::from_str(&s)
                .with_context(|| format!("parse {}", paths.config_file.display()))?;
            Ok(cfg)
        } else {
            Ok(Config::default())
        }
    }

    /// Build the record for a named profile.
    pub fn profile(&self, name: &str) -> Result<CertificateRecord> {
        let table = self
            .certificates
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("no certificate profile named '{name}'"))?;
        Ok(CertificateRecord::from_toml(table)?)
    }
}
