//! Certificate records bound to a pfx file.

use std::fs;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::pkcs12::{self, DecodedCertificate};
use crate::platform::GatewayOutput;
use crate::secret::Passphrase;
use crate::trust;

/// A certificate that is either unbound (no file, no metadata) or bound to a
/// pfx file whose contents decoded successfully at construction.
#[derive(Debug, Clone, Default)]
pub struct CertificateRecord {
    binding: Option<Binding>,
}

#[derive(Debug, Clone)]
struct Binding {
    path: PathBuf,
    passphrase: Passphrase,
    decoded: DecodedCertificate,
}

/// Passphrase as received from a caller or a config table.
enum SecretInput {
    Absent,
    Value(Passphrase),
    WrongType,
}

impl CertificateRecord {
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Build a record. With both arguments absent the record is unbound;
    /// otherwise the file is read and decoded before this returns.
    pub fn create(path: Option<&Path>, passphrase: Option<&str>) -> Result<Self> {
        let secret = match passphrase {
            Some(p) => SecretInput::Value(Passphrase::new(p)),
            None => SecretInput::Absent,
        };
        Self::bind(path, secret)
    }

    /// Shorthand for a bound record.
    pub fn open(path: impl AsRef<Path>, passphrase: &str) -> Result<Self> {
        Self::create(Some(path.as_ref()), Some(passphrase))
    }

    /// Build a record from a loosely typed table such as a config profile.
    ///
    /// Keys: `path`, and either `passphrase` or `passphrase_env` (name of an
    /// environment variable holding it). Values of the wrong type map onto
    /// the same errors as bad values.
    pub fn from_toml(table: &toml::Table) -> Result<Self> {
        let path = match table.get("path") {
            None => None,
            Some(toml::Value::String(s)) => Some(PathBuf::from(s)),
            Some(_) => return Err(Error::path(None)),
        };
        let secret = match (table.get("passphrase"), table.get("passphrase_env")) {
            (Some(toml::Value::String(s)), _) => SecretInput::Value(Passphrase::new(s.as_str())),
            (Some(_), _) => SecretInput::WrongType,
            (None, Some(toml::Value::String(var))) => match std::env::var(var) {
                Ok(v) => SecretInput::Value(Passphrase::new(v)),
                Err(_) => SecretInput::Absent,
            },
            (None, Some(_)) => SecretInput::WrongType,
            (None, None) => SecretInput::Absent,
        };
        Self::bind(path.as_deref(), secret)
    }

    fn bind(path: Option<&Path>, secret: SecretInput) -> Result<Self> {
        let path = match (path, &secret) {
            (None, SecretInput::Absent) => return Ok(Self::unbound()),
            (None, _) => return Err(Error::path(None)),
            (Some(p), _) => p,
        };
        check_path_shape(path)?;

        let bytes = Zeroizing::new(fs::read(path).map_err(|e| Error::InvalidCertificatePath {
            path: Some(path.to_path_buf()),
            source: Some(e),
        })?);

        let passphrase = match secret {
            SecretInput::Value(p) if !p.is_empty() => p,
            _ => return Err(Error::password()),
        };
        let decoded = pkcs12::decode(&bytes, passphrase.expose())?;

        Ok(Self {
            binding: Some(Binding {
                path: path.to_path_buf(),
                passphrase,
                decoded,
            }),
        })
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Subject RDNs, most specific last. Empty when unbound.
    pub fn subject(&self) -> &[String] {
        self.binding
            .as_ref()
            .map(|b| b.decoded.subject.as_slice())
            .unwrap_or(&[])
    }

    /// Value of the most specific CN attribute.
    pub fn common_name(&self) -> Option<&str> {
        self.subject()
            .iter()
            .rev()
            .find_map(|rdn| rdn.split('+').find_map(|a| a.strip_prefix("CN=")))
    }

    /// `notAfter` of the certificate.
    pub fn expiration_date(&self) -> Option<OffsetDateTime> {
        self.binding.as_ref().map(|b| b.decoded.not_after)
    }

    /// `notBefore` of the certificate.
    pub fn issue_date(&self) -> Option<OffsetDateTime> {
        self.binding.as_ref().map(|b| b.decoded.not_before)
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.binding.as_ref().map(|b| b.path.as_path())
    }

    pub(crate) fn passphrase(&self) -> Option<&Passphrase> {
        self.binding.as_ref().map(|b| &b.passphrase)
    }

    /// Install into the store named by `location` (`user` or `machine`).
    pub fn install(&self, location: &str, exportable: bool, verbose: bool) -> Result<GatewayOutput> {
        trust::install(self, location, exportable, verbose)
    }

    /// Remove by CN pattern. Does not look at this record; see [`trust::remove`].
    pub fn remove(&self, common_name: &str, location: &str, verbose: bool) -> Result<GatewayOutput> {
        trust::remove(common_name, location, verbose)
    }
}

fn check_path_shape(path: &Path) -> Result<()> {
    let s = path.to_string_lossy();
    if s.trim().is_empty() || s.contains('\0') {
        return Err(Error::path(Some(path.to_path_buf())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_has_no_metadata() {
        let r = CertificateRecord::create(None, None).unwrap();
        assert!(!r.is_bound());
        assert!(r.subject().is_empty());
        assert!(r.common_name().is_none());
        assert!(r.expiration_date().is_none());
        assert!(r.issue_date().is_none());
        assert!(r.source_path().is_none());
    }

    #[test]
    fn passphrase_without_path_is_path_error() {
        let err = CertificateRecord::create(None, Some("123456")).unwrap_err();
        assert!(matches!(err, Error::InvalidCertificatePath { path: None, .. }));
    }

    #[test]
    fn blank_paths_are_rejected() {
        for p in ["", "   ", "bad\0path"] {
            let err = CertificateRecord::create(Some(Path::new(p)), Some("x")).unwrap_err();
            assert!(matches!(err, Error::InvalidCertificatePath { .. }), "{p:?}");
        }
    }

    #[test]
    fn toml_wrong_types() {
        let t: toml::Table = toml::from_str("path = true\npassphrase = \"x\"").unwrap();
        assert!(matches!(
            CertificateRecord::from_toml(&t).unwrap_err(),
            Error::InvalidCertificatePath { .. }
        ));

        let t: toml::Table = toml::from_str("path = 42").unwrap();
        assert!(matches!(
            CertificateRecord::from_toml(&t).unwrap_err(),
            Error::InvalidCertificatePath { .. }
        ));

        let t: toml::Table = toml::from_str("").unwrap();
        assert!(!CertificateRecord::from_toml(&t).unwrap().is_bound());
    }
}
