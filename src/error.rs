//! Caller-visible error taxonomy.

use std::path::PathBuf;

use crate::pkcs12::DecodeError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Path absent when required, not path-shaped, or the file cannot be read.
    #[error("Invalid certificate. Make sure you are passing a valid pfx file path.")]
    InvalidCertificatePath {
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Passphrase absent, empty or wrong-typed, or the container did not open.
    #[error("Invalid password. Try again with the correct password.")]
    InvalidCertificatePassword {
        #[source]
        source: Option<DecodeError>,
    },

    /// The container opened but holds only certificates.
    #[error("The pfx file holds no private key. Export the certificate together with its key.")]
    MissingPrivateKey {
        #[source]
        source: DecodeError,
    },

    #[error("invalid store location {0:?}; expected \"user\" or \"machine\"")]
    InvalidStoreLocation(String),

    #[error("invalid common name pattern {pattern:?}: {reason}")]
    InvalidCommonName { pattern: String, reason: String },

    #[error("certificate is not bound to a pfx file; nothing to install")]
    UnboundCertificate,

    #[error("certificate store command failed: {output}")]
    StoreCommandFailed { output: String },

    #[error(transparent)]
    Gateway(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn path(path: Option<PathBuf>) -> Self {
        Error::InvalidCertificatePath { path, source: None }
    }

    pub(crate) fn password() -> Self {
        Error::InvalidCertificatePassword { source: None }
    }

    /// The decoder failure behind a container error, if any.
    ///
    /// Lets callers tell a corrupt container from a wrong passphrase.
    pub fn decode_error(&self) -> Option<&DecodeError> {
        match self {
            Error::InvalidCertificatePassword { source } => source.as_ref(),
            Error::MissingPrivateKey { source } => Some(source),
            _ => None,
        }
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::NoPrivateKey => Error::MissingPrivateKey { source: err },
            err => Error::InvalidCertificatePassword { source: Some(err) },
        }
    }
}
