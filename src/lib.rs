//! Certman - install and remove PKCS#12 certificates in the OS certificate store.

pub mod cert;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod location;
pub mod pkcs12;
pub mod platform;
pub mod secret;
pub mod trust;

pub use cert::CertificateRecord;
pub use error::{Error, Result};
pub use location::StoreLocation;
