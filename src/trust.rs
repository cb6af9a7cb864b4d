//! Certificate store install/remove (gateway abstraction).

use crate::cert::CertificateRecord;
use crate::command;
use crate::error::{Error, Result};
use crate::platform::{default_gateway, GatewayOutput, OutputMode, StoreGateway};

/// Install a bound record into the store named by `location`.
pub fn install(
    record: &CertificateRecord,
    location: &str,
    exportable: bool,
    verbose: bool,
) -> Result<GatewayOutput> {
    install_with_gateway(default_gateway(None).as_ref(), record, location, exportable, verbose)
}

/// Install using provided gateway.
pub fn install_with_gateway(
    gateway: &dyn StoreGateway,
    record: &CertificateRecord,
    location: &str,
    exportable: bool,
    verbose: bool,
) -> Result<GatewayOutput> {
    let request = command::build_install(record, location, exportable)?;
    tracing::info!(subject = ?record.subject(), store = %request.store, exportable, "installing certificate");
    let out = gateway.install(&request, OutputMode::from_verbose(verbose))?;
    checked(out)
}

/// Remove every entry in `location` whose subject matches `CN=<common_name>`.
///
/// `common_name` is a regular expression matched anywhere in the subject,
/// case-insensitively. All matches are removed, so `example` also removes
/// `CN=www.example.test` and `CN=example.org`.
///
/// The store matches with .NET regex semantics, but the pattern is checked
/// up front with the `regex` crate, so it must be valid in both dialects.
/// Lookaround (`a(?=b)`) and backreferences (`(\w)\1`) are rejected with
/// [`Error::InvalidCommonName`](crate::Error::InvalidCommonName).
pub fn remove(common_name: &str, location: &str, verbose: bool) -> Result<GatewayOutput> {
    remove_with_gateway(default_gateway(None).as_ref(), common_name, location, verbose)
}

/// Remove using provided gateway.
pub fn remove_with_gateway(
    gateway: &dyn StoreGateway,
    common_name: &str,
    location: &str,
    verbose: bool,
) -> Result<GatewayOutput> {
    let request = command::build_remove(common_name, location)?;
    tracing::info!(pattern = %request.subject_pattern(), store = %request.store, "removing certificates");
    let out = gateway.remove(&request, OutputMode::from_verbose(verbose))?;
    checked(out)
}

/// Subjects of the entries in `location`.
pub fn list(location: &str) -> Result<Vec<String>> {
    list_with_gateway(default_gateway(None).as_ref(), location)
}

/// List using provided gateway.
pub fn list_with_gateway(gateway: &dyn StoreGateway, location: &str) -> Result<Vec<String>> {
    let store = command::build_list(location)?;
    Ok(gateway.list(&store)?)
}

fn checked(out: GatewayOutput) -> Result<GatewayOutput> {
    if out.success {
        Ok(out)
    } else {
        tracing::warn!("certificate store command failed");
        Err(Error::StoreCommandFailed {
            output: out.output.trim().to_string(),
        })
    }
}
