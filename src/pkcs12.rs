//! PKCS#12 container decoding.
//!
//! Opens a PFX byte buffer with a passphrase and pulls the subject and
//! validity window out of the leaf certificate. No I/O happens here.

use p12_keystore::{KeyStore, KeyStoreEntry};
use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::der_parser::ber::parse_ber;
use x509_parser::prelude::FromDer;
use x509_parser::time::ASN1Time;
use x509_parser::x509::{AttributeTypeAndValue, X509Name};

/// PFX `version` field; the only one RFC 7292 defines.
const PFX_VERSION: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed PKCS#12 container: {0}")]
    MalformedContainer(String),

    #[error("passphrase does not open the PKCS#12 container")]
    InvalidPassphrase,

    /// The container opened but has no private key with a certificate chain.
    #[error("PKCS#12 container holds no private key chain")]
    NoPrivateKey,
}

fn malformed(msg: impl Into<String>) -> DecodeError {
    DecodeError::MalformedContainer(msg.into())
}

/// Identity and validity of the leaf certificate in a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCertificate {
    /// RDNs in encoded order, most specific last (`["O=Acme", "CN=host"]`).
    pub subject: Vec<String>,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

/// Decode a PKCS#12 container.
///
/// The outer PFX structure is checked before the keystore is opened, so a
/// corrupt or foreign file reports `MalformedContainer` while a structurally
/// sound container that refuses the passphrase reports `InvalidPassphrase`.
pub fn decode(bytes: &[u8], passphrase: &str) -> Result<DecodedCertificate, DecodeError> {
    check_pfx_structure(bytes)?;

    let keystore = KeyStore::from_pkcs12(bytes, passphrase).map_err(|e| {
        tracing::debug!(error = %e, "keystore did not open");
        DecodeError::InvalidPassphrase
    })?;

    let leaf = leaf_der(&keystore).ok_or(DecodeError::NoPrivateKey)?;
    let decoded = parse_leaf(&leaf)?;
    tracing::debug!(subject = ?decoded.subject, "decoded pfx leaf certificate");
    Ok(decoded)
}

/// PFX ::= SEQUENCE { version INTEGER, authSafe ContentInfo, macData OPTIONAL }
fn check_pfx_structure(bytes: &[u8]) -> Result<(), DecodeError> {
    if bytes.is_empty() {
        return Err(malformed("empty input"));
    }
    let (_, pfx) = parse_ber(bytes).map_err(|e| malformed(format!("not a BER structure: {e}")))?;
    let items = pfx
        .as_sequence()
        .map_err(|_| malformed("top-level object is not a SEQUENCE"))?;

    match items.first().map(|v| v.as_u32()) {
        Some(Ok(PFX_VERSION)) => {}
        Some(Ok(v)) => return Err(malformed(format!("unsupported PFX version {v}"))),
        _ => return Err(malformed("missing PFX version")),
    }
    match items.get(1) {
        Some(auth_safe) if auth_safe.as_sequence().is_ok() => Ok(()),
        _ => Err(malformed("missing authSafe content")),
    }
}

/// First certificate of the key chain whose alias sorts first.
///
/// The keystore indexes entries by friendly name, so container order is not
/// visible here and bags sharing a name collapse into one entry. Bare
/// certificate entries are never a leaf: they only survive when they carry
/// the Java trusted-certificate attribute, and other key-less bags are
/// dropped while the keystore is read.
fn leaf_der(keystore: &KeyStore) -> Option<Vec<u8>> {
    keystore.entries().find_map(|(_alias, entry)| match entry {
        KeyStoreEntry::PrivateKeyChain(chain) => {
            chain.chain().first().map(|cert| cert.as_der().to_vec())
        }
        KeyStoreEntry::Certificate(_) => None,
    })
}

fn parse_leaf(der: &[u8]) -> Result<DecodedCertificate, DecodeError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| malformed(format!("leaf is not an X.509 certificate: {e}")))?;
    let validity = cert.validity();
    Ok(DecodedCertificate {
        subject: subject_components(cert.subject()),
        not_before: to_utc(&validity.not_before)?,
        not_after: to_utc(&validity.not_after)?,
    })
}

fn to_utc(t: &ASN1Time) -> Result<OffsetDateTime, DecodeError> {
    OffsetDateTime::from_unix_timestamp(t.timestamp())
        .map_err(|e| malformed(format!("validity timestamp out of range: {e}")))
}

fn subject_components(name: &X509Name<'_>) -> Vec<String> {
    name.iter_rdn()
        .map(|rdn| {
            rdn.iter()
                .map(format_attribute)
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect()
}

fn format_attribute(attr: &AttributeTypeAndValue<'_>) -> String {
    let oid = attr.attr_type().to_id_string();
    let key = rfc4514_key(&oid).map(str::to_string).unwrap_or(oid);
    match attr.as_str() {
        Ok(value) => format!("{key}={}", escape_value(value)),
        Err(_) => format!("{key}=#{}", hex(attr.attr_value().data)),
    }
}

/// Attribute keys RFC 4514 section 3 assigns short names to.
fn rfc4514_key(oid: &str) -> Option<&'static str> {
    let key = match oid {
        "2.5.4.3" => "CN",
        "2.5.4.7" => "L",
        "2.5.4.8" => "ST",
        "2.5.4.10" => "O",
        "2.5.4.11" => "OU",
        "2.5.4.6" => "C",
        "2.5.4.9" => "STREET",
        "0.9.2342.19200300.100.1.25" => "DC",
        "0.9.2342.19200300.100.1.1" => "UID",
        _ => return None,
    };
    Some(key)
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            '"' | '+' | ',' | ';' | '<' | '>' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            '\0' => out.push_str("\\00"),
            _ => out.push(c),
        }
    }
    out
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape_value("Acme, Inc."), "Acme\\, Inc.");
        assert_eq!(escape_value("#tag"), "\\#tag");
        assert_eq!(escape_value(" padded "), "\\ padded\\ ");
        assert_eq!(escape_value("a+b"), "a\\+b");
        assert_eq!(escape_value("plain.example"), "plain.example");
    }

    #[test]
    fn known_and_unknown_keys() {
        assert_eq!(rfc4514_key("2.5.4.3"), Some("CN"));
        assert_eq!(rfc4514_key("1.2.840.113549.1.9.1"), None);
    }

    #[test]
    fn garbage_is_malformed() {
        let err = decode(b"this is not a pfx file", "secret").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedContainer(_)));
    }

    #[test]
    fn empty_is_malformed() {
        assert!(matches!(
            decode(&[], "secret").unwrap_err(),
            DecodeError::MalformedContainer(_)
        ));
    }

    #[test]
    fn wrong_version_is_malformed() {
        // SEQUENCE { INTEGER 2, SEQUENCE {} }
        let bytes = [0x30, 0x05, 0x02, 0x01, 0x02, 0x30, 0x00];
        let err = decode(&bytes, "secret").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedContainer(ref m) if m.contains("version")));
    }

    #[test]
    fn truncated_is_malformed() {
        let bytes = [0x30, 0x82, 0x04, 0x00, 0x02, 0x01, 0x03];
        assert!(matches!(
            decode(&bytes, "secret").unwrap_err(),
            DecodeError::MalformedContainer(_)
        ));
    }
}
