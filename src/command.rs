//! Store operation requests and the PowerShell commands that carry them out.
//!
//! Requests are validated here and rendered into a [`StoreCommand`]: program,
//! argv and environment. Caller-supplied values (container path, passphrase,
//! CN pattern) travel in environment variables and are never spliced into
//! the script text.

use std::path::PathBuf;
use std::process::Command;

use crate::cert::CertificateRecord;
use crate::error::{Error, Result};
use crate::location::{StoreAddress, StoreLocation};
use crate::secret::Passphrase;

pub const ENV_PFX_PATH: &str = "CERTMAN_PFX_PATH";
pub const ENV_PFX_PASSPHRASE: &str = "CERTMAN_PFX_PASSPHRASE";
pub const ENV_CN_PATTERN: &str = "CERTMAN_CN_PATTERN";

#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub container: PathBuf,
    pub passphrase: Passphrase,
    pub store: StoreAddress,
    /// Mark the private key exportable.
    pub exportable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveRequest {
    /// Regular expression matched against `CN=...` in each entry's subject.
    pub common_name: String,
    pub store: StoreAddress,
}

impl RemoveRequest {
    /// The full pattern applied to entry subjects.
    pub fn subject_pattern(&self) -> String {
        format!("CN={}", self.common_name)
    }
}

#[derive(Debug, Clone)]
pub enum StoreOperation {
    Install(InstallRequest),
    Remove(RemoveRequest),
    List(StoreAddress),
}

/// Build an install request for a bound record.
pub fn build_install(
    record: &CertificateRecord,
    location: &str,
    exportable: bool,
) -> Result<InstallRequest> {
    let store = StoreLocation::resolve(location)?.address();
    let (container, passphrase) = match (record.source_path(), record.passphrase()) {
        (Some(path), Some(passphrase)) => (path.to_path_buf(), passphrase.clone()),
        _ => return Err(Error::UnboundCertificate),
    };
    tracing::debug!(container = %container.display(), %store, exportable, "built install request");
    Ok(InstallRequest {
        container,
        passphrase,
        store,
        exportable,
    })
}

/// Build a remove request.
///
/// The common name is a regular expression, matched as a substring: `test`
/// selects `CN=pycertmanager.test` and `CN=other.test` alike. Patterns using
/// .NET-only syntax such as lookaround or backreferences fail validation.
pub fn build_remove(common_name: &str, location: &str) -> Result<RemoveRequest> {
    let store = StoreLocation::resolve(location)?.address();
    if common_name.is_empty() {
        return Err(Error::InvalidCommonName {
            pattern: String::new(),
            reason: "empty pattern would match every certificate".to_string(),
        });
    }
    regex::Regex::new(&format!("CN={common_name}")).map_err(|e| Error::InvalidCommonName {
        pattern: common_name.to_string(),
        reason: e.to_string(),
    })?;
    Ok(RemoveRequest {
        common_name: common_name.to_string(),
        store,
    })
}

pub fn build_list(location: &str) -> Result<StoreAddress> {
    Ok(StoreLocation::resolve(location)?.address())
}

/// Environment value handed to the child process.
#[derive(Debug, Clone)]
pub enum EnvValue {
    Plain(String),
    Secret(Passphrase),
}

impl EnvValue {
    fn expose(&self) -> &str {
        match self {
            EnvValue::Plain(s) => s,
            EnvValue::Secret(p) => p.expose(),
        }
    }
}

/// A fully described process invocation. `Debug` never shows secrets.
#[derive(Debug, Clone)]
pub struct StoreCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(&'static str, EnvValue)>,
}

impl StoreCommand {
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (name, value) in &self.env {
            cmd.env(name, value.expose());
        }
        cmd
    }

    /// The `-Command` script.
    pub fn script(&self) -> &str {
        self.args.last().map(String::as_str).unwrap_or("")
    }
}

impl StoreOperation {
    /// Render as a PowerShell invocation of `program`.
    pub fn render(&self, program: &str) -> StoreCommand {
        let mut env = Vec::new();
        let script = match self {
            StoreOperation::Install(req) => {
                env.push((
                    ENV_PFX_PATH,
                    EnvValue::Plain(req.container.to_string_lossy().into_owned()),
                ));
                env.push((ENV_PFX_PASSPHRASE, EnvValue::Secret(req.passphrase.clone())));
                let mut s = format!(
                    "$password = ConvertTo-SecureString -String $env:{ENV_PFX_PASSPHRASE} -AsPlainText -Force; \
                     Import-PfxCertificate -FilePath $env:{ENV_PFX_PATH} -Password $password \
                     -CertStoreLocation '{}'",
                    req.store
                );
                if req.exportable {
                    s.push_str(" -Exportable");
                }
                s
            }
            StoreOperation::Remove(req) => {
                env.push((ENV_CN_PATTERN, EnvValue::Plain(req.common_name.clone())));
                format!(
                    "Get-ChildItem -Path '{}' | \
                     Where-Object {{ $_.Subject -match ('CN=' + $env:{ENV_CN_PATTERN}) }} | Remove-Item",
                    req.store
                )
            }
            StoreOperation::List(store) => {
                format!("Get-ChildItem -Path '{store}' | ForEach-Object {{ $_.Subject }}")
            }
        };
        StoreCommand {
            program: program.to_string(),
            args: vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                format!("$ErrorActionPreference = 'Stop'; {script}"),
            ],
            env,
        }
    }
}
