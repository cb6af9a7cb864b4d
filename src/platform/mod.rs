//! Certificate store gateways.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;

pub mod powershell;

use crate::command::{InstallRequest, RemoveRequest};
use crate::location::StoreAddress;

pub use powershell::PowerShellGateway;

/// Env var selecting [`FileStoreGateway`] with the given backing file.
pub const STORE_FILE_ENV: &str = "CERTMAN_STORE_FILE";

/// Whether the gateway buffers diagnostics or streams them to the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Capture,
    Stream,
}

impl OutputMode {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            OutputMode::Stream
        } else {
            OutputMode::Capture
        }
    }
}

/// Outcome of one store command. `output` is empty in stream mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayOutput {
    pub success: bool,
    pub output: String,
}

/// Executes store operations against a real or simulated certificate store.
pub trait StoreGateway: Send + Sync {
    /// Import the pfx container into `request.store`.
    fn install(&self, request: &InstallRequest, mode: OutputMode) -> Result<GatewayOutput>;
    /// Delete every entry whose subject matches `CN=<pattern>`.
    fn remove(&self, request: &RemoveRequest, mode: OutputMode) -> Result<GatewayOutput>;
    /// Subjects of all entries in the store.
    fn list(&self, store: &StoreAddress) -> Result<Vec<String>>;
}

/// Get the gateway for this machine.
/// If CERTMAN_STORE_FILE is set (e.g. in tests), uses FileStoreGateway with that path.
pub fn default_gateway(program: Option<&str>) -> Box<dyn StoreGateway> {
    if let Ok(path) = std::env::var(STORE_FILE_ENV) {
        return Box::new(FileStoreGateway::new(path));
    }
    let program = program.unwrap_or(PowerShellGateway::default_program());
    Box::new(PowerShellGateway::new(program))
}

/// Entry kept by [`FileStoreGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Subject in store notation: most specific first, `", "` separated.
    pub subject: String,
    pub not_before: String,
    pub not_after: String,
    #[serde(default)]
    pub exportable: bool,
}

type StoreFile = BTreeMap<String, Vec<StoredEntry>>;

/// Gateway that keeps stores in a JSON file (for tests and dry runs).
///
/// Installs decode the container the way the OS importer would, so a wrong
/// passphrase fails the command. Removal uses the same case-insensitive
/// regex match PowerShell's `-match` does.
#[derive(Debug, Clone)]
pub struct FileStoreGateway {
    path: PathBuf,
}

impl FileStoreGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read-modify-write under an exclusive lock.
    fn update<T>(&self, f: impl FnOnce(&mut StoreFile) -> Result<T>) -> Result<T> {
        if let Some(p) = self.path.parent() {
            fs::create_dir_all(p)?;
        }
        let mut file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .with_context(|| format!("open store file: {}", self.path.display()))?;
        fs2::FileExt::lock_exclusive(&file)?;

        let mut s = String::new();
        file.read_to_string(&mut s)?;
        let mut stores: StoreFile = if s.trim().is_empty() {
            StoreFile::new()
        } else {
            serde_json::from_str(&s)
                .with_context(|| format!("parse store file: {}", self.path.display()))?
        };

        let result = f(&mut stores)?;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serde_json::to_string_pretty(&stores)?.as_bytes())?;
        Ok(result)
    }

    fn read(&self) -> Result<StoreFile> {
        if !self.path.is_file() {
            return Ok(StoreFile::new());
        }
        let mut file = fs::File::open(&self.path)?;
        fs2::FileExt::lock_shared(&file)?;
        let mut s = String::new();
        file.read_to_string(&mut s)?;
        if s.trim().is_empty() {
            return Ok(StoreFile::new());
        }
        serde_json::from_str(&s).with_context(|| format!("parse store file: {}", self.path.display()))
    }
}

fn emit(mode: OutputMode, success: bool, text: String) -> GatewayOutput {
    match mode {
        OutputMode::Capture => GatewayOutput {
            success,
            output: text,
        },
        OutputMode::Stream => {
            println!("{text}");
            GatewayOutput {
                success,
                output: String::new(),
            }
        }
    }
}

impl StoreGateway for FileStoreGateway {
    fn install(&self, request: &InstallRequest, mode: OutputMode) -> Result<GatewayOutput> {
        let bytes = zeroize::Zeroizing::new(
            fs::read(&request.container)
                .with_context(|| format!("read pfx: {}", request.container.display()))?,
        );
        let decoded = match crate::pkcs12::decode(&bytes, request.passphrase.expose()) {
            Ok(d) => d,
            Err(e) => return Ok(emit(mode, false, format!("Import-PfxCertificate: {e}"))),
        };
        let entry = StoredEntry {
            subject: decoded
                .subject
                .iter()
                .rev()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            not_before: decoded.not_before.format(&Rfc3339)?,
            not_after: decoded.not_after.format(&Rfc3339)?,
            exportable: request.exportable,
        };
        let text = format!("Subject: {}", entry.subject);
        self.update(|stores| {
            let entries = stores.entry(request.store.to_string()).or_default();
            let duplicate = entries.iter().any(|e| {
                e.subject == entry.subject
                    && e.not_before == entry.not_before
                    && e.not_after == entry.not_after
            });
            if !duplicate {
                entries.push(entry);
            }
            Ok(())
        })?;
        Ok(emit(mode, true, text))
    }

    fn remove(&self, request: &RemoveRequest, mode: OutputMode) -> Result<GatewayOutput> {
        let re = regex::RegexBuilder::new(&request.subject_pattern())
            .case_insensitive(true)
            .build()
            .context("compile CN pattern")?;
        let removed = self.update(|stores| {
            let Some(entries) = stores.get_mut(request.store.as_str()) else {
                return Ok(0);
            };
            let before = entries.len();
            entries.retain(|e| !re.is_match(&e.subject));
            Ok(before - entries.len())
        })?;
        Ok(emit(mode, true, format!("Removed {removed} certificate(s)")))
    }

    fn list(&self, store: &StoreAddress) -> Result<Vec<String>> {
        let stores = self.read()?;
        Ok(stores
            .get(store.as_str())
            .map(|entries| entries.iter().map(|e| e.subject.clone()).collect())
            .unwrap_or_default())
    }
}
