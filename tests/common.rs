//! Shared test helpers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use p12_keystore::{KeyStore, KeyStoreEntry, PrivateKeyChain};
use rcgen::{CertificateParams, DistinguishedName, DnType, DnValue, KeyPair};
use tempfile::TempDir;
use time::OffsetDateTime;

pub const PASSWORD: &str = "123456";

/// 2024-01-01T00:00:00Z
pub const NOT_BEFORE: i64 = 1_704_067_200;
/// 2029-01-01T00:00:00Z
pub const NOT_AFTER: i64 = 1_861_920_000;

/// Create a temp directory for use as CERTMAN_HOME / fixture dir.
pub fn temp_home() -> TempDir {
    tempfile::Builder::new()
        .prefix("certman_test_")
        .tempdir()
        .expect("temp dir")
}

pub fn ts(secs: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(secs).unwrap()
}

/// Write a self-signed pfx with the given subject (encoded order) and validity.
pub fn write_pfx_with(
    dir: &Path,
    file: &str,
    passphrase: &str,
    subject: &[(DnType, &str)],
    not_before: i64,
    not_after: i64,
) -> PathBuf {
    let chain = key_chain(subject, not_before, not_after, 0x42);
    write_keystore(dir, file, passphrase, &[("cert", chain)])
}

/// Self-signed key chain; `key_id` fills the 20-byte local key id.
pub fn key_chain(
    subject: &[(DnType, &str)],
    not_before: i64,
    not_after: i64,
    key_id: u8,
) -> PrivateKeyChain {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name = DistinguishedName::new();
    for (ty, value) in subject {
        params
            .distinguished_name
            .push(ty.clone(), DnValue::Utf8String(value.to_string()));
    }
    params.not_before = ts(not_before);
    params.not_after = ts(not_after);
    let cert = params.self_signed(&key).unwrap();

    let p12_cert = p12_keystore::Certificate::from_der(cert.der().as_ref()).unwrap();
    let local_key_id = vec![key_id; 20];
    PrivateKeyChain::new(key.serialize_der(), &local_key_id, vec![p12_cert])
}

/// Write key chains under the given aliases, in slice order.
pub fn write_keystore(
    dir: &Path,
    file: &str,
    passphrase: &str,
    chains: &[(&str, PrivateKeyChain)],
) -> PathBuf {
    let mut keystore = KeyStore::new();
    for (alias, chain) in chains {
        keystore.add_entry(alias, KeyStoreEntry::PrivateKeyChain(chain.clone()));
    }
    let data = keystore.writer(passphrase).write().unwrap();

    let path = dir.join(file);
    std::fs::write(&path, data).unwrap();
    path
}

/// The `CN=pycertmanager.test` fixture protected by [`PASSWORD`].
pub fn write_test_pfx(dir: &Path) -> PathBuf {
    write_pfx_with(
        dir,
        "pycertmanager_test_password_123456.pfx",
        PASSWORD,
        &[(DnType::CommonName, "pycertmanager.test")],
        NOT_BEFORE,
        NOT_AFTER,
    )
}

pub fn write_named_pfx(dir: &Path, cn: &str) -> PathBuf {
    write_pfx_with(
        dir,
        &format!("{cn}.pfx"),
        PASSWORD,
        &[(DnType::CommonName, cn)],
        NOT_BEFORE,
        NOT_AFTER,
    )
}

/// DER tag-length-value with definite length.
fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes: Vec<u8> = len.to_be_bytes().into_iter().skip_while(|b| *b == 0).collect();
        out.push(0x80 | bytes.len() as u8);
        out.extend(bytes);
    }
    out.extend_from_slice(content);
    out
}

fn seq(parts: &[&[u8]]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

/// 1.2.840.113549.1.7.1
const OID_DATA: &[u8] = &[0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01];
/// 1.2.840.113549.1.12.10.1.3
const OID_CERT_BAG: &[u8] = &[
    0x06, 0x0b, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x0c, 0x0a, 0x01, 0x03,
];
/// 1.2.840.113549.1.9.22.1
const OID_X509_CERT: &[u8] = &[0x06, 0x0a, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x09, 0x16, 0x01];

/// `ContentInfo { data, [0] OCTET STRING content }`
fn data_content_info(content: &[u8]) -> Vec<u8> {
    seq(&[OID_DATA, &tlv(0xa0, &tlv(0x04, content))[..]])
}

/// A pfx holding one certificate bag and no key, the shape
/// `openssl pkcs12 -export -nokeys` produces: no bag attributes, no
/// trusted-usage marker, no MAC and an unencrypted SafeContents.
pub fn write_cert_only_pfx(dir: &Path, cn: &str) -> PathBuf {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, DnValue::Utf8String(cn.to_string()));
    params.not_before = ts(NOT_BEFORE);
    params.not_after = ts(NOT_AFTER);
    let cert = params.self_signed(&key).unwrap();

    let cert_bag = seq(&[OID_X509_CERT, &tlv(0xa0, &tlv(0x04, cert.der().as_ref()))[..]]);
    let safe_bag = seq(&[OID_CERT_BAG, &tlv(0xa0, &cert_bag)[..]]);
    let safe_contents = seq(&[&safe_bag[..]]);
    let auth_safe = seq(&[&data_content_info(&safe_contents)[..]]);
    let version = [0x02, 0x01, 0x03];
    let pfx = seq(&[&version[..], &data_content_info(&auth_safe)[..]]);

    let path = dir.join(format!("{cn}.nokeys.pfx"));
    std::fs::write(&path, pfx).unwrap();
    path
}

/// A pfx written by the keystore with one trusted certificate entry and no key.
pub fn write_trusted_cert_pfx(dir: &Path, cn: &str) -> PathBuf {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, DnValue::Utf8String(cn.to_string()));
    let cert = params.self_signed(&key).unwrap();

    let p12_cert = p12_keystore::Certificate::from_der(cert.der().as_ref()).unwrap();
    let mut keystore = KeyStore::new();
    keystore.add_entry("trusted", KeyStoreEntry::Certificate(p12_cert));
    let data = keystore.writer(PASSWORD).write().unwrap();

    let path = dir.join(format!("{cn}.trusted.pfx"));
    std::fs::write(&path, data).unwrap();
    path
}
