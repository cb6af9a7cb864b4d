//! CLI definitions and command routing.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;

use crate::cert::CertificateRecord;
use crate::config::{CertmanPaths, Config};
use crate::platform::default_gateway;
use crate::trust;

/// Env var read when `--password` is not given.
pub const PASSWORD_ENV: &str = "CERTMAN_PASSWORD";

#[derive(Parser)]
#[command(name = "certman")]
#[command(about = "Install and remove PKCS#12 certificates in the OS certificate store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show subject and validity of a pfx file
    Info {
        path: PathBuf,
        /// Container passphrase (falls back to CERTMAN_PASSWORD)
        #[arg(long)]
        password: Option<String>,
    },

    /// Import a pfx file into a certificate store
    Install {
        /// Pfx file; omit when using --profile
        #[arg(required_unless_present = "profile", conflicts_with = "profile")]
        path: Option<PathBuf>,
        /// Use a [certificates.<name>] entry from config.toml
        #[arg(long)]
        profile: Option<String>,
        /// Container passphrase (falls back to CERTMAN_PASSWORD)
        #[arg(long, conflicts_with = "profile")]
        password: Option<String>,
        /// Store location: user or machine
        #[arg(long)]
        location: Option<String>,
        /// Mark the private key as exportable
        #[arg(long, overrides_with = "no_exportable")]
        exportable: bool,
        /// Keep the private key non-exportable, even if config.toml sets exportable
        #[arg(long, overrides_with = "exportable")]
        no_exportable: bool,
        /// Stream store command output instead of capturing it
        #[arg(long)]
        verbose: bool,
    },

    /// Remove every certificate whose CN matches a pattern.
    ///
    /// The pattern is a case-insensitive regular expression matched anywhere
    /// in the subject after "CN=", so it can remove more than one certificate.
    /// Lookaround and backreferences are not accepted.
    Remove {
        common_name: String,
        /// Store location: user or machine
        #[arg(long)]
        location: Option<String>,
        /// Stream store command output instead of capturing it
        #[arg(long)]
        verbose: bool,
    },

    /// List certificate subjects in a store
    List {
        /// Store location: user or machine
        #[arg(long)]
        location: Option<String>,
    },
}

/// Run CLI and dispatch to handlers.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let paths = CertmanPaths::default_paths();
    let config = Config::load(&paths)?;

    match cli.command {
        Commands::Info { path, password } => cmd_info(path, password),
        Commands::Install {
            path,
            profile,
            password,
            location,
            exportable,
            no_exportable,
            verbose,
        } => {
            let record = match (path, profile) {
                (_, Some(name)) => config.profile(&name)?,
                (Some(path), None) => open_record(path, password)?,
                (None, None) => anyhow::bail!("a pfx path or --profile is required"),
            };
            let location = location.unwrap_or_else(|| config.default_location.clone());
            let exportable = match (exportable, no_exportable) {
                (true, _) => true,
                (_, true) => false,
                _ => config.exportable,
            };
            let gateway = default_gateway(config.powershell.as_deref());
            let out =
                trust::install_with_gateway(gateway.as_ref(), &record, &location, exportable, verbose)?;
            print_output(&out.output);
            println!(
                "Installed {} into {location}",
                record.common_name().unwrap_or("certificate")
            );
            Ok(())
        }
        Commands::Remove {
            common_name,
            location,
            verbose,
        } => {
            let location = location.unwrap_or_else(|| config.default_location.clone());
            let gateway = default_gateway(config.powershell.as_deref());
            let out = trust::remove_with_gateway(gateway.as_ref(), &common_name, &location, verbose)?;
            print_output(&out.output);
            println!("Removed certificates matching CN={common_name} from {location}");
            Ok(())
        }
        Commands::List { location } => {
            let location = location.unwrap_or_else(|| config.default_location.clone());
            let gateway = default_gateway(config.powershell.as_deref());
            for subject in trust::list_with_gateway(gateway.as_ref(), &location)? {
                println!("{subject}");
            }
            Ok(())
        }
    }
}

fn open_record(path: PathBuf, password: Option<String>) -> Result<CertificateRecord> {
    let password = password.or_else(|| std::env::var(PASSWORD_ENV).ok());
    let record = CertificateRecord::create(Some(&path), password.as_deref())
        .with_context(|| format!("open {}", path.display()))?;
    Ok(record)
}

fn cmd_info(path: PathBuf, password: Option<String>) -> Result<()> {
    let record = open_record(path, password)?;
    println!("Subject:\t{}", record.subject().join(", "));
    if let Some(issued) = record.issue_date() {
        println!("Issued:\t{}", issued.format(&Rfc3339)?);
    }
    if let Some(expires) = record.expiration_date() {
        println!("Expires:\t{}", expires.format(&Rfc3339)?);
    }
    Ok(())
}

fn print_output(output: &str) {
    let output = output.trim();
    if !output.is_empty() {
        println!("{output}");
    }
}
